//! In-memory campaign ledger
//!
//! Implements [`ChainApi`] for tests and the demo. It keeps balances, nonces,
//! the sudo key and campaign state, rejects extrinsics the way the runtime
//! would (status stream `[Invalid]`), and records every submission, delivered
//! status and subscription release.
//!
//! Effects of an accepted extrinsic are applied when its `InBlock` status is
//! delivered to the observer.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use num_bigint::BigUint;
use tracing::{debug, warn};

use crate::call::{CallArg, CampaignRef, TaskOperation};
use crate::chain::{ChainApi, ChainHandle};
use crate::error::CampaignError;
use crate::lifecycle::{ExtrinsicStatus, Subscription, SubscriptionId};
use crate::privilege::PreparedExtrinsic;
use crate::types::{
    Account, AccountState, BlockHash, CampaignIndex, ChainMetadata, ClaimableBalance,
    ExtrinsicHash, Nonce,
};

/// Forced outcome for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// `[Ready, Broadcast, Dropped]`
    Dropped,
    /// `[Invalid]`
    Invalid,
    /// `[Ready, Broadcast, InBlock(h), Usurped]`, without effects
    Usurped,
    /// Deliver exactly these statuses, without effects
    Statuses(Vec<ExtrinsicStatus>),
}

/// One call to `submit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub id: SubscriptionId,
    pub operation: TaskOperation,
    pub signer: String,
    pub privileged: bool,
    pub nonce: Nonce,
    pub extrinsic: ExtrinsicHash,
    /// Number of `Finalized` statuses delivered before this submission
    pub finalized_before: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Submitted(SubscriptionId),
    Delivered(SubscriptionId, ExtrinsicStatus),
    Released(SubscriptionId),
}

/// Campaign as stored by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignInfo {
    pub creator: String,
    pub remaining: u128,
    pub approved: bool,
}

#[derive(Debug, Clone)]
enum Effect {
    Create { creator: String, amount: u128 },
    Approve { campaign: CampaignIndex },
    Reward {
        campaign: CampaignIndex,
        recipients: Vec<String>,
        amount: u128,
    },
    Claim {
        campaign: CampaignIndex,
        user: String,
        amount: u128,
    },
}

#[derive(Debug, Default, Clone, Copy)]
struct AccountEntry {
    nonce: Nonce,
    free: u128,
}

#[derive(Debug)]
struct LedgerState {
    reachable: bool,
    next_session: u64,
    sessions: HashSet<u64>,
    metadata: ChainMetadata,
    sudo: Option<String>,
    accounts: HashMap<String, AccountEntry>,
    campaigns: Vec<CampaignInfo>,
    created: HashMap<(BlockHash, String), CampaignIndex>,
    claimable: HashMap<String, ClaimableBalance>,
    best_block: u32,
    scripts: HashMap<usize, ScriptedOutcome>,
    submissions: Vec<SubmissionRecord>,
    events: Vec<LedgerEvent>,
    finalized: usize,
}

impl LedgerState {
    fn check_session(&self, handle: &ChainHandle) -> Result<(), CampaignError> {
        if !self.reachable {
            return Err(CampaignError::Connection(format!(
                "{} is unreachable",
                handle.endpoint()
            )));
        }
        if !self.sessions.contains(&handle.session()) {
            return Err(CampaignError::Connection(format!(
                "unknown session {}",
                handle.session()
            )));
        }
        Ok(())
    }

    fn next_block(&mut self) -> (u32, BlockHash) {
        self.best_block += 1;
        let mut hash = [0u8; 32];
        hash[..4].copy_from_slice(&self.best_block.to_be_bytes());
        hash[31] = 0xbb;
        (self.best_block, BlockHash(hash))
    }

    /// Runtime validation: returns the effect to apply on inclusion
    fn validate(&self, prepared: &PreparedExtrinsic) -> Result<Effect, String> {
        let extrinsic = prepared.extrinsic();
        let signer = extrinsic.signer().address();
        let call = extrinsic.call();
        let account = self.accounts.get(signer).copied().unwrap_or_default();

        if prepared.nonce() != account.nonce {
            return Err(format!(
                "stale nonce {} (account nonce {})",
                prepared.nonce(),
                account.nonce
            ));
        }

        let operation = call.operation();
        if operation.requires_root() {
            if !extrinsic.is_privileged() {
                return Err(format!("{} requires root origin", operation.call_name()));
            }
            if self.sudo.as_deref() != Some(signer) {
                return Err(format!("{} is not the sudo key", signer));
            }
        } else if extrinsic.is_privileged() {
            return Err(format!("{} requires a signed origin", operation.call_name()));
        }

        match (operation, call.args()) {
            (TaskOperation::CreateCampaign, [CallArg::Balance(amount)]) => {
                if account.free < *amount {
                    return Err(format!("insufficient balance for {}", signer));
                }
                Ok(Effect::Create {
                    creator: signer.to_string(),
                    amount: *amount,
                })
            }
            (
                TaskOperation::ApproveCampaign,
                [CallArg::Campaign(CampaignRef::Index { index })],
            ) => {
                self.campaign(*index)?;
                Ok(Effect::Approve { campaign: *index })
            }
            (
                TaskOperation::Reward,
                [
                    CallArg::Campaign(CampaignRef::Index { index }),
                    CallArg::Accounts(recipients),
                    CallArg::Balance(amount),
                ],
            ) => {
                let campaign = self.campaign(*index)?;
                if !campaign.approved {
                    return Err(format!("campaign {} is not approved", index));
                }
                let total = amount
                    .checked_mul(recipients.len() as u128)
                    .ok_or_else(|| "reward overflow".to_string())?;
                if campaign.remaining < total {
                    return Err(format!("campaign {} has insufficient funds", index));
                }
                Ok(Effect::Reward {
                    campaign: *index,
                    recipients: recipients.clone(),
                    amount: *amount,
                })
            }
            (
                TaskOperation::Claim,
                [
                    CallArg::Campaign(CampaignRef::Index { index }),
                    CallArg::Balance(amount),
                    CallArg::Account(user),
                ],
            ) => {
                self.campaign(*index)?;
                let claimable = self.claimable.get(user).copied().unwrap_or_default();
                if claimable.amount < *amount {
                    return Err(format!("{} cannot claim {}", user, amount));
                }
                Ok(Effect::Claim {
                    campaign: *index,
                    user: user.clone(),
                    amount: *amount,
                })
            }
            (operation, _) => Err(format!("malformed {} call", operation.call_name())),
        }
    }

    fn campaign(&self, index: CampaignIndex) -> Result<&CampaignInfo, String> {
        self.campaigns
            .get(index as usize)
            .ok_or_else(|| format!("unknown campaign {}", index))
    }

    fn deliver(
        &mut self,
        id: SubscriptionId,
        signer: &str,
        status: &ExtrinsicStatus,
        effect: &mut Option<Effect>,
    ) {
        debug!(subscription = %id, %status, "delivering status");
        self.events.push(LedgerEvent::Delivered(id, *status));
        match status {
            ExtrinsicStatus::InBlock(block) => {
                if let Some(effect) = effect.take() {
                    self.apply(signer, *block, effect);
                }
            }
            ExtrinsicStatus::Finalized(_) => self.finalized += 1,
            _ => {}
        }
    }

    fn apply(&mut self, signer: &str, block: BlockHash, effect: Effect) {
        let best_block = self.best_block;
        self.accounts.entry(signer.to_string()).or_default().nonce += 1;
        match effect {
            Effect::Create { creator, amount } => {
                let account = self.accounts.entry(creator.clone()).or_default();
                account.free = account.free.saturating_sub(amount);
                let index = self.campaigns.len() as CampaignIndex;
                self.campaigns.push(CampaignInfo {
                    creator: creator.clone(),
                    remaining: amount,
                    approved: false,
                });
                self.created.insert((block, creator), index);
                debug!(index, "campaign created");
            }
            Effect::Approve { campaign } => {
                if let Some(info) = self.campaigns.get_mut(campaign as usize) {
                    info.approved = true;
                }
            }
            Effect::Reward {
                campaign,
                recipients,
                amount,
            } => {
                if let Some(info) = self.campaigns.get_mut(campaign as usize) {
                    info.remaining = info
                        .remaining
                        .saturating_sub(amount.saturating_mul(recipients.len() as u128));
                }
                for user in recipients {
                    let entry = self.claimable.entry(user).or_default();
                    entry.amount = entry.amount.saturating_add(amount);
                    entry.last_block = best_block;
                }
            }
            Effect::Claim {
                campaign,
                user,
                amount,
            } => {
                let entry = self.claimable.entry(user.clone()).or_default();
                entry.amount = entry.amount.saturating_sub(amount);
                let account = self.accounts.entry(user).or_default();
                account.free = account.free.saturating_add(amount);
                debug!(campaign, amount, "claim paid");
            }
        }
    }
}

fn lock(ledger: &Mutex<LedgerState>) -> MutexGuard<'_, LedgerState> {
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory [`ChainApi`] implementation
#[derive(Clone)]
pub struct MockChain {
    ledger: Arc<Mutex<LedgerState>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new(ChainMetadata {
            token_symbol: "UNIT".to_string(),
            decimals: 12,
        })
    }
}

impl MockChain {
    pub fn new(metadata: ChainMetadata) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(LedgerState {
                reachable: true,
                next_session: 1,
                sessions: HashSet::new(),
                metadata,
                sudo: None,
                accounts: HashMap::new(),
                campaigns: Vec::new(),
                created: HashMap::new(),
                claimable: HashMap::new(),
                best_block: 0,
                scripts: HashMap::new(),
                submissions: Vec::new(),
                events: Vec::new(),
                finalized: 0,
            })),
        }
    }

    /// Set the account that holds root capability
    pub fn with_sudo(self, account: &Account) -> Self {
        lock(&self.ledger).sudo = Some(account.address().to_string());
        self
    }

    pub fn fund(&self, address: &str, amount: u128) {
        let mut state = lock(&self.ledger);
        let account = state.accounts.entry(address.to_string()).or_default();
        account.free = account.free.saturating_add(amount);
    }

    /// Simulate the node going away
    pub fn set_reachable(&self, reachable: bool) {
        lock(&self.ledger).reachable = reachable;
    }

    /// Force the outcome of the `ordinal`-th submission (1-based)
    pub fn script(&self, ordinal: usize, outcome: ScriptedOutcome) {
        lock(&self.ledger).scripts.insert(ordinal, outcome);
    }

    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        lock(&self.ledger).submissions.clone()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        lock(&self.ledger).events.clone()
    }

    /// How many times a subscription was released
    pub fn release_count(&self, id: SubscriptionId) -> usize {
        lock(&self.ledger)
            .events
            .iter()
            .filter(|event| **event == LedgerEvent::Released(id))
            .count()
    }

    pub fn campaign(&self, index: CampaignIndex) -> Option<CampaignInfo> {
        lock(&self.ledger).campaigns.get(index as usize).cloned()
    }

    pub fn free_balance(&self, address: &str) -> u128 {
        lock(&self.ledger)
            .accounts
            .get(address)
            .map(|account| account.free)
            .unwrap_or_default()
    }

    /// Amount `address` can still claim
    pub fn claimable(&self, address: &str) -> u128 {
        lock(&self.ledger)
            .claimable
            .get(address)
            .map(|balance| balance.amount)
            .unwrap_or_default()
    }

    pub fn nonce(&self, address: &str) -> Nonce {
        lock(&self.ledger)
            .accounts
            .get(address)
            .map(|account| account.nonce)
            .unwrap_or_default()
    }
}

#[async_trait(?Send)]
impl ChainApi for MockChain {
    async fn connect(&self, endpoint: &str) -> Result<ChainHandle, CampaignError> {
        let mut state = lock(&self.ledger);
        let scheme_ok = ["ws://", "wss://", "http://", "https://"]
            .iter()
            .any(|scheme| endpoint.starts_with(*scheme));
        if !scheme_ok {
            return Err(CampaignError::Connection(format!(
                "unsupported endpoint '{}'",
                endpoint
            )));
        }
        if !state.reachable {
            return Err(CampaignError::Connection(format!(
                "{} is unreachable",
                endpoint
            )));
        }
        let session = state.next_session;
        state.next_session += 1;
        state.sessions.insert(session);
        debug!(endpoint, session, "connected");
        Ok(ChainHandle::new(endpoint, session))
    }

    async fn query_account_state(
        &self,
        handle: &ChainHandle,
        address: &str,
    ) -> Result<AccountState, CampaignError> {
        let state = lock(&self.ledger);
        state.check_session(handle)?;
        let account = state.accounts.get(address).copied().unwrap_or_default();
        Ok(AccountState {
            nonce: account.nonce,
            free_balance: BigUint::from(account.free),
        })
    }

    async fn query_metadata(&self, handle: &ChainHandle) -> Result<ChainMetadata, CampaignError> {
        let state = lock(&self.ledger);
        state.check_session(handle)?;
        Ok(state.metadata.clone())
    }

    async fn submit(
        &self,
        handle: &ChainHandle,
        extrinsic: PreparedExtrinsic,
    ) -> Result<Subscription, CampaignError> {
        let mut state = lock(&self.ledger);
        state.check_session(handle)?;

        let ordinal = state.submissions.len() + 1;
        let id = SubscriptionId(ordinal as u64);
        let signer = extrinsic.extrinsic().signer().address().to_string();
        let record = SubmissionRecord {
            id,
            operation: extrinsic.extrinsic().call().operation(),
            signer: signer.clone(),
            privileged: extrinsic.extrinsic().is_privileged(),
            nonce: extrinsic.nonce(),
            extrinsic: extrinsic.hash(),
            finalized_before: state.finalized,
        };
        debug!(
            subscription = %id,
            operation = ?record.operation,
            nonce = record.nonce,
            "submitted"
        );
        state.submissions.push(record);
        state.events.push(LedgerEvent::Submitted(id));

        let (statuses, effect) = match state.scripts.remove(&ordinal) {
            Some(ScriptedOutcome::Dropped) => (
                vec![
                    ExtrinsicStatus::Ready,
                    ExtrinsicStatus::Broadcast,
                    ExtrinsicStatus::Dropped,
                ],
                None,
            ),
            Some(ScriptedOutcome::Invalid) => (vec![ExtrinsicStatus::Invalid], None),
            Some(ScriptedOutcome::Usurped) => {
                let (_, block) = state.next_block();
                (
                    vec![
                        ExtrinsicStatus::Ready,
                        ExtrinsicStatus::Broadcast,
                        ExtrinsicStatus::InBlock(block),
                        ExtrinsicStatus::Usurped,
                    ],
                    None,
                )
            }
            Some(ScriptedOutcome::Statuses(statuses)) => (statuses, None),
            None => match state.validate(&extrinsic) {
                Ok(effect) => {
                    let (_, block) = state.next_block();
                    (
                        vec![
                            ExtrinsicStatus::Ready,
                            ExtrinsicStatus::Broadcast,
                            ExtrinsicStatus::InBlock(block),
                            ExtrinsicStatus::Finalized(block),
                        ],
                        Some(effect),
                    )
                }
                Err(reason) => {
                    warn!(subscription = %id, %reason, "extrinsic rejected");
                    (vec![ExtrinsicStatus::Invalid], None)
                }
            },
        };
        drop(state);

        let ledger = self.ledger.clone();
        let mut effect = effect;
        let statuses = stream::iter(statuses)
            .inspect(move |status| lock(&ledger).deliver(id, &signer, status, &mut effect))
            .boxed();

        let ledger = self.ledger.clone();
        Ok(Subscription::new(id, extrinsic.hash(), statuses, move |id| {
            lock(&ledger).events.push(LedgerEvent::Released(id));
        }))
    }

    async fn query_created_campaign(
        &self,
        handle: &ChainHandle,
        block: &BlockHash,
        creator: &str,
    ) -> Result<Option<CampaignIndex>, CampaignError> {
        let state = lock(&self.ledger);
        state.check_session(handle)?;
        Ok(state.created.get(&(*block, creator.to_string())).copied())
    }

    async fn query_claimable_balance(
        &self,
        handle: &ChainHandle,
        address: &str,
    ) -> Result<ClaimableBalance, CampaignError> {
        let state = lock(&self.ledger);
        state.check_session(handle)?;
        Ok(state.claimable.get(address).copied().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{Call, CallIndexTable};
    use crate::identity::{IdentityResolver, PhraseIdentityResolver};
    use crate::privilege::{elevate, Extrinsic};

    fn account(uri: &str) -> Account {
        PhraseIdentityResolver::default().derive_identity(uri).unwrap()
    }

    async fn run_to_end(mut sub: Subscription) -> Vec<ExtrinsicStatus> {
        let mut out = Vec::new();
        while let Some(status) = sub.next().await {
            out.push(status.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_endpoint() {
        let chain = MockChain::default();
        assert!(matches!(
            chain.connect("tcp://node").await,
            Err(CampaignError::Connection(_))
        ));
        chain.set_reachable(false);
        assert!(matches!(
            chain.connect("ws://127.0.0.1:9944").await,
            Err(CampaignError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_session_rejected() {
        let chain = MockChain::default();
        let handle = ChainHandle::new("ws://127.0.0.1:9944", 99);
        assert!(matches!(
            chain.query_metadata(&handle).await,
            Err(CampaignError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_create_applies_on_inclusion() {
        let user = account("//Alice");
        let chain = MockChain::default();
        chain.fund(user.address(), 1_000);
        let handle = chain.connect("ws://127.0.0.1:9944").await.unwrap();

        let prepared = Extrinsic::new(Call::create_campaign(600), user.clone())
            .prepare(0, &CallIndexTable::default())
            .unwrap();
        let sub = chain.submit(&handle, prepared).await.unwrap();
        let id = sub.id();
        assert_eq!(chain.nonce(user.address()), 0);

        let statuses = run_to_end(sub).await;
        assert_eq!(statuses.len(), 4);
        assert_eq!(chain.nonce(user.address()), 1);
        assert_eq!(chain.free_balance(user.address()), 400);
        assert_eq!(
            chain.campaign(0),
            Some(CampaignInfo {
                creator: user.address().to_string(),
                remaining: 600,
                approved: false,
            })
        );
        let block = statuses[3].block().unwrap();
        assert_eq!(
            chain
                .query_created_campaign(&handle, &block, user.address())
                .await
                .unwrap(),
            Some(0)
        );
        assert_eq!(chain.release_count(id), 1);
    }

    #[tokio::test]
    async fn test_root_call_without_sudo_key_is_invalid() {
        let user = account("//Alice");
        let root = account("//Bob");
        let chain = MockChain::default().with_sudo(&root);
        let handle = chain.connect("ws://127.0.0.1:9944").await.unwrap();
        let table = CallIndexTable::default();

        let unelevated = Extrinsic::new(Call::approve_campaign(0u32), user.clone())
            .prepare(0, &table)
            .unwrap();
        let sub = chain.submit(&handle, unelevated).await.unwrap();
        assert_eq!(run_to_end(sub).await, vec![ExtrinsicStatus::Invalid]);

        let approve = Extrinsic::new(Call::approve_campaign(0u32), user.clone());
        let wrong_authority = elevate(approve, user).prepare(0, &table).unwrap();
        let sub = chain.submit(&handle, wrong_authority).await.unwrap();
        assert_eq!(run_to_end(sub).await, vec![ExtrinsicStatus::Invalid]);
    }

    #[tokio::test]
    async fn test_stale_nonce_is_invalid() {
        let user = account("//Alice");
        let chain = MockChain::default();
        chain.fund(user.address(), 10);
        let handle = chain.connect("ws://127.0.0.1:9944").await.unwrap();
        let prepared = Extrinsic::new(Call::create_campaign(1), user)
            .prepare(3, &CallIndexTable::default())
            .unwrap();
        let sub = chain.submit(&handle, prepared).await.unwrap();
        assert_eq!(run_to_end(sub).await, vec![ExtrinsicStatus::Invalid]);
    }

    #[tokio::test]
    async fn test_scripted_usurped_has_no_effect() {
        let user = account("//Alice");
        let chain = MockChain::default();
        chain.fund(user.address(), 10);
        chain.script(1, ScriptedOutcome::Usurped);
        let handle = chain.connect("ws://127.0.0.1:9944").await.unwrap();
        let prepared = Extrinsic::new(Call::create_campaign(1), user.clone())
            .prepare(0, &CallIndexTable::default())
            .unwrap();
        let sub = chain.submit(&handle, prepared).await.unwrap();
        let statuses = run_to_end(sub).await;
        assert_eq!(statuses.last(), Some(&ExtrinsicStatus::Usurped));
        assert_eq!(chain.nonce(user.address()), 0);
        assert_eq!(chain.campaign(0), None);
    }
}

//! Multi-step campaign workflows
//!
//! [`Orchestrator::run_sequence`] submits steps in order. A blocking step is
//! driven to its terminal status before the next one is signed; a
//! non-blocking step only to `Broadcast`, and is settled after the last step.
//! Any failure of a blocking step aborts the run. Every subscription opened
//! by a run is released before `run_sequence` returns, on every path.
//! Errors from a run name the step they arose in, see [`CampaignError::step`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::address::validate_address;
use crate::amount::format_balance;
use crate::call::{Call, CallIndexTable, CampaignRef, TaskOperation};
use crate::chain::{ChainApi, ChainHandle};
use crate::config::ClientConfig;
use crate::error::CampaignError;
use crate::lifecycle::{observe, ExtrinsicStatus, Subscription};
use crate::nonce::NonceTracker;
use crate::privilege::{elevate, Extrinsic};
use crate::types::{Account, CampaignIndex, ChainMetadata, ClaimableBalance, ExtrinsicHash, Nonce};

/// One step of a workflow
#[derive(Debug, Clone)]
pub struct StepSpec {
    pub label: String,
    pub call: Call,
    pub signer: Account,
    /// Root authority to run the call under, if elevated
    pub elevate: Option<Account>,
    /// Wait for a terminal status before the next step
    pub blocking: bool,
}

impl StepSpec {
    /// Blocking, non-elevated step
    pub fn new(label: impl Into<String>, call: Call, signer: Account) -> Self {
        Self {
            label: label.into(),
            call,
            signer,
            elevate: None,
            blocking: true,
        }
    }

    pub fn elevated(mut self, authority: Account) -> Self {
        self.elevate = Some(authority);
        self
    }

    pub fn non_blocking(mut self) -> Self {
        self.blocking = false;
        self
    }
}

/// Terminal result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    /// 1-based step number
    pub step: usize,
    pub label: String,
    pub status: ExtrinsicStatus,
    pub nonce: Nonce,
    pub extrinsic: ExtrinsicHash,
    /// Campaign created by a finalized `createCampaign` step
    pub campaign_index: Option<CampaignIndex>,
}

/// Outcomes in step order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct WorkflowResult {
    pub outcomes: Vec<StepOutcome>,
}

impl WorkflowResult {
    pub fn statuses(&self) -> Vec<ExtrinsicStatus> {
        self.outcomes.iter().map(|outcome| outcome.status).collect()
    }

    pub fn campaign_index(&self, step: usize) -> Option<CampaignIndex> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.step == step)
            .and_then(|outcome| outcome.campaign_index)
    }
}

/// Requests cancellation of a running workflow before its next step
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Submitted step whose subscription is still open
struct InFlight {
    step: usize,
    label: String,
    operation: TaskOperation,
    signer: String,
    nonce: Nonce,
    extrinsic: ExtrinsicHash,
    subscription: Subscription,
    committed: bool,
}

impl InFlight {
    fn outcome(
        &self,
        status: ExtrinsicStatus,
        campaign_index: Option<CampaignIndex>,
    ) -> StepOutcome {
        StepOutcome {
            step: self.step,
            label: self.label.clone(),
            status,
            nonce: self.nonce,
            extrinsic: self.extrinsic,
            campaign_index,
        }
    }
}

type StatusHook<'a> = dyn FnMut(usize, &ExtrinsicStatus) + 'a;

/// Drives campaign workflows over one chain session
pub struct Orchestrator<C: ChainApi> {
    chain: C,
    handle: ChainHandle,
    metadata: ChainMetadata,
    call_indices: CallIndexTable,
    ss58_prefix: u16,
    nonces: NonceTracker,
    abort: AbortHandle,
}

impl<C: ChainApi> Orchestrator<C> {
    /// Open a session and read the token metadata for it
    pub async fn connect(chain: C, config: &ClientConfig) -> Result<Self, CampaignError> {
        config.validate()?;
        let handle = chain.connect(&config.endpoint).await?;
        let metadata = chain.query_metadata(&handle).await?;
        info!(
            endpoint = %config.endpoint,
            token = %metadata.token_symbol,
            decimals = metadata.decimals,
            "connected"
        );
        Ok(Self {
            chain,
            handle,
            metadata,
            call_indices: config.call_indices,
            ss58_prefix: config.ss58_prefix,
            nonces: NonceTracker::new(config.nonce_policy),
            abort: AbortHandle::default(),
        })
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn handle(&self) -> &ChainHandle {
        &self.handle
    }

    pub fn metadata(&self) -> &ChainMetadata {
        &self.metadata
    }

    pub fn ss58_prefix(&self) -> u16 {
        self.ss58_prefix
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Free balance rendered as `"<amount> <symbol>"`
    pub async fn account_balance(&self, address: &str) -> Result<String, CampaignError> {
        let state = self.chain.query_account_state(&self.handle, address).await?;
        format_balance(&state.free_balance, &self.metadata)
    }

    pub async fn claimable_balance(
        &self,
        address: &str,
    ) -> Result<ClaimableBalance, CampaignError> {
        self.chain.query_claimable_balance(&self.handle, address).await
    }

    pub async fn run_sequence(
        &mut self,
        steps: Vec<StepSpec>,
    ) -> Result<WorkflowResult, CampaignError> {
        self.run_sequence_with(steps, |_, _| {}).await
    }

    /// Like [`Orchestrator::run_sequence`], calling `on_status` with each
    /// delivered status before the next one is read
    pub async fn run_sequence_with<F>(
        &mut self,
        steps: Vec<StepSpec>,
        mut on_status: F,
    ) -> Result<WorkflowResult, CampaignError>
    where
        F: FnMut(usize, &ExtrinsicStatus),
    {
        validate_steps(&steps, self.ss58_prefix)?;

        let mut pending = Vec::new();
        let result = self.drive(steps, &mut pending, &mut on_status).await;
        for step in pending.drain(..) {
            self.abandon(step);
        }

        match &result {
            Ok(result) => info!(steps = result.outcomes.len(), "workflow complete"),
            Err(err) => warn!(error = %err, "workflow failed"),
        }
        result
    }

    async fn drive(
        &mut self,
        steps: Vec<StepSpec>,
        pending: &mut Vec<InFlight>,
        on_status: &mut StatusHook<'_>,
    ) -> Result<WorkflowResult, CampaignError> {
        let mut outcomes: Vec<Option<StepOutcome>> = vec![None; steps.len()];
        let mut created: HashMap<usize, CampaignIndex> = HashMap::new();

        for (i, spec) in steps.into_iter().enumerate() {
            let step = i + 1;
            if self.abort.is_aborted() {
                info!(next_step = step, "workflow cancelled");
                return Err(CampaignError::Cancelled { next_step: step });
            }

            let blocking = spec.blocking;
            let mut in_flight = self
                .submit_step(step, spec, &created)
                .await
                .map_err(|err| err.at_step(step))?;

            if blocking {
                let status = self
                    .settle(&mut in_flight, on_status)
                    .await
                    .map_err(|err| err.at_step(step))?;
                if status.is_failure() {
                    warn!(step, %status, "blocking step failed");
                    return Err(CampaignError::WorkflowAborted {
                        failed_step: step,
                        last_status: status,
                    });
                }
                let campaign_index = self
                    .discover_campaign(&in_flight, &status)
                    .await
                    .map_err(|err| err.at_step(step))?;
                if let Some(index) = campaign_index {
                    created.insert(step, index);
                }
                outcomes[i] = Some(in_flight.outcome(status, campaign_index));
            } else {
                let broadcast = self
                    .await_broadcast(&mut in_flight, on_status)
                    .await
                    .map_err(|err| err.at_step(step))?;
                match broadcast {
                    Some(status) => {
                        let campaign_index = self
                            .discover_campaign(&in_flight, &status)
                            .await
                            .map_err(|err| err.at_step(step))?;
                        outcomes[i] = Some(in_flight.outcome(status, campaign_index));
                    }
                    None => pending.push(in_flight),
                }
            }
        }

        while !pending.is_empty() {
            let mut in_flight = pending.remove(0);
            let step = in_flight.step;
            let status = self
                .settle(&mut in_flight, on_status)
                .await
                .map_err(|err| err.at_step(step))?;
            if status.is_failure() {
                warn!(step, %status, "non-blocking step failed");
            }
            let campaign_index = self
                .discover_campaign(&in_flight, &status)
                .await
                .map_err(|err| err.at_step(step))?;
            outcomes[in_flight.step - 1] = Some(in_flight.outcome(status, campaign_index));
        }

        Ok(WorkflowResult {
            outcomes: outcomes.into_iter().flatten().collect(),
        })
    }

    async fn submit_step(
        &mut self,
        step: usize,
        spec: StepSpec,
        created: &HashMap<usize, CampaignIndex>,
    ) -> Result<InFlight, CampaignError> {
        let call = spec.call.resolve(|source| created.get(&source).copied())?;
        let operation = call.operation();
        let mut extrinsic = Extrinsic::new(call, spec.signer);
        if let Some(authority) = spec.elevate {
            extrinsic = elevate(extrinsic, authority);
        }
        let signer = extrinsic.signer().address().to_string();
        let privileged = extrinsic.is_privileged();

        let state = self
            .chain
            .query_account_state(&self.handle, &signer)
            .await?;
        let nonce = self.nonces.reserve(&signer, state.nonce)?;

        let prepared = match extrinsic.prepare(nonce, &self.call_indices) {
            Ok(prepared) => prepared,
            Err(err) => {
                self.nonces.release(&signer, nonce);
                return Err(err);
            }
        };
        let extrinsic_hash = prepared.hash();

        info!(
            step,
            label = %spec.label,
            operation = operation.call_name(),
            %signer,
            nonce,
            privileged,
            "submitting step"
        );
        let subscription = match observe(&self.chain, &self.handle, prepared).await {
            Ok(subscription) => subscription,
            Err(err) => {
                self.nonces.release(&signer, nonce);
                return Err(err);
            }
        };

        Ok(InFlight {
            step,
            label: spec.label,
            operation,
            signer,
            nonce,
            extrinsic: extrinsic_hash,
            subscription,
            committed: false,
        })
    }

    /// Read statuses until a terminal one
    async fn settle(
        &mut self,
        in_flight: &mut InFlight,
        on_status: &mut StatusHook<'_>,
    ) -> Result<ExtrinsicStatus, CampaignError> {
        loop {
            let status = self.next_status(in_flight, on_status).await?;
            if status.is_terminal() {
                return Ok(status);
            }
        }
    }

    /// Read statuses until the step is broadcast; `Some` if it already ended
    async fn await_broadcast(
        &mut self,
        in_flight: &mut InFlight,
        on_status: &mut StatusHook<'_>,
    ) -> Result<Option<ExtrinsicStatus>, CampaignError> {
        loop {
            let status = self.next_status(in_flight, on_status).await?;
            if status.is_terminal() {
                return Ok(Some(status));
            }
            if matches!(status, ExtrinsicStatus::Broadcast | ExtrinsicStatus::InBlock(_)) {
                return Ok(None);
            }
        }
    }

    async fn next_status(
        &mut self,
        in_flight: &mut InFlight,
        on_status: &mut StatusHook<'_>,
    ) -> Result<ExtrinsicStatus, CampaignError> {
        let next = in_flight.subscription.next().await;
        let status = match next {
            Some(Ok(status)) => status,
            Some(Err(err)) => {
                self.fail_nonce(in_flight);
                return Err(err);
            }
            None => {
                self.fail_nonce(in_flight);
                return Err(CampaignError::StreamClosed {
                    extrinsic: in_flight.extrinsic.to_string(),
                });
            }
        };

        debug!(step = in_flight.step, %status, "step status");
        if status.is_included() && !in_flight.committed {
            in_flight.committed = self.nonces.commit(&in_flight.signer, in_flight.nonce);
        }
        if status.is_failure() {
            self.fail_nonce(in_flight);
        }
        on_status(in_flight.step, &status);
        Ok(status)
    }

    fn fail_nonce(&mut self, in_flight: &InFlight) {
        if !self.nonces.release(&in_flight.signer, in_flight.nonce) {
            self.nonces.invalidate(&in_flight.signer);
        }
    }

    /// Explicit post-finalization query for the index a `createCampaign` got
    async fn discover_campaign(
        &self,
        in_flight: &InFlight,
        status: &ExtrinsicStatus,
    ) -> Result<Option<CampaignIndex>, CampaignError> {
        let block = match (in_flight.operation, status) {
            (TaskOperation::CreateCampaign, ExtrinsicStatus::Finalized(block)) => block,
            _ => return Ok(None),
        };
        let index = self
            .chain
            .query_created_campaign(&self.handle, block, &in_flight.signer)
            .await?
            .ok_or(CampaignError::CampaignNotFound {
                step: in_flight.step,
            })?;
        info!(step = in_flight.step, index, "campaign index discovered");
        Ok(Some(index))
    }

    fn abandon(&mut self, mut in_flight: InFlight) {
        debug!(step = in_flight.step, "abandoning open step");
        in_flight.subscription.release();
        self.nonces.release(&in_flight.signer, in_flight.nonce);
    }
}

/// Signers must use the session's SS58 prefix, and `CreatedBy` references
/// must name an earlier, blocking `createCampaign` step
fn validate_steps(steps: &[StepSpec], ss58_prefix: u16) -> Result<(), CampaignError> {
    for (i, spec) in steps.iter().enumerate() {
        let step = i + 1;
        let signers = std::iter::once(&spec.signer).chain(spec.elevate.as_ref());
        for signer in signers {
            if !validate_address(signer.address(), Some(ss58_prefix)) {
                return Err(CampaignError::InvalidWorkflow(format!(
                    "step {} signer {} does not use ss58 prefix {}",
                    step, signer, ss58_prefix
                )));
            }
        }
        for campaign in spec.call.campaign_refs() {
            let source = match campaign {
                CampaignRef::CreatedBy { step } => *step,
                CampaignRef::Index { .. } => continue,
            };
            if source == 0 || source >= step {
                return Err(CampaignError::InvalidWorkflow(format!(
                    "step {} refers to step {}, which does not run before it",
                    step, source
                )));
            }
            let origin = &steps[source - 1];
            if origin.call.operation() != TaskOperation::CreateCampaign {
                return Err(CampaignError::InvalidWorkflow(format!(
                    "step {} refers to step {}, which does not create a campaign",
                    step, source
                )));
            }
            if !origin.blocking {
                return Err(CampaignError::InvalidWorkflow(format!(
                    "step {} refers to non-blocking step {}",
                    step, source
                )));
            }
        }
    }
    Ok(())
}

/// Create, approve and reward a campaign
///
/// Steps 2 and 3 use the index step 1 is found to have created.
pub fn campaign_reward_steps(
    creator: &Account,
    root: &Account,
    amount: u128,
    recipients: Vec<String>,
    reward: u128,
) -> Vec<StepSpec> {
    let campaign = CampaignRef::CreatedBy { step: 1 };
    vec![
        StepSpec::new("createCampaign", Call::create_campaign(amount), creator.clone()),
        StepSpec::new("approveCampaign", Call::approve_campaign(campaign), root.clone())
            .elevated(root.clone()),
        StepSpec::new(
            "reward",
            Call::reward(campaign, recipients, reward),
            root.clone(),
        )
        .elevated(root.clone()),
    ]
}

/// Elevated claim of `amount` for `user`
pub fn claim_step(
    root: &Account,
    campaign: impl Into<CampaignRef>,
    amount: u128,
    user: &str,
) -> StepSpec {
    StepSpec::new(
        "claim",
        Call::claim(campaign, amount, user.to_string()),
        root.clone(),
    )
    .elevated(root.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{IdentityResolver, PhraseIdentityResolver};

    fn account(uri: &str) -> Account {
        PhraseIdentityResolver::default().derive_identity(uri).unwrap()
    }

    #[test]
    fn test_reward_steps_shape() {
        let creator = account("//Alice");
        let root = account("//Sudo");
        let steps = campaign_reward_steps(
            &creator,
            &root,
            10_000_000_000,
            vec![creator.address().to_string()],
            10_000,
        );
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.blocking));
        assert!(steps[0].elevate.is_none());
        assert_eq!(steps[1].elevate.as_ref(), Some(&root));
        assert_eq!(steps[2].call.operation(), TaskOperation::Reward);
        assert!(validate_steps(&steps, 42).is_ok());
    }

    #[test]
    fn test_forward_reference_rejected() {
        let user = account("//Alice");
        let steps = vec![
            StepSpec::new(
                "approve",
                Call::approve_campaign(CampaignRef::CreatedBy { step: 2 }),
                user.clone(),
            ),
            StepSpec::new("create", Call::create_campaign(1), user),
        ];
        assert!(matches!(
            validate_steps(&steps, 42),
            Err(CampaignError::InvalidWorkflow(_))
        ));
    }

    #[test]
    fn test_reference_to_non_create_rejected() {
        let user = account("//Alice");
        let steps = vec![
            StepSpec::new("approve", Call::approve_campaign(0u32), user.clone()),
            StepSpec::new(
                "reward",
                Call::reward(CampaignRef::CreatedBy { step: 1 }, vec![], 1),
                user,
            ),
        ];
        assert!(matches!(
            validate_steps(&steps, 42),
            Err(CampaignError::InvalidWorkflow(_))
        ));
    }

    #[test]
    fn test_reference_to_non_blocking_create_rejected() {
        let user = account("//Alice");
        let steps = vec![
            StepSpec::new("create", Call::create_campaign(1), user.clone()).non_blocking(),
            StepSpec::new(
                "approve",
                Call::approve_campaign(CampaignRef::CreatedBy { step: 1 }),
                user,
            ),
        ];
        assert!(matches!(
            validate_steps(&steps, 42),
            Err(CampaignError::InvalidWorkflow(_))
        ));
    }

    #[test]
    fn test_signer_with_other_prefix_rejected() {
        let user = account("//Alice");
        let steps = vec![StepSpec::new("create", Call::create_campaign(1), user)];
        assert!(validate_steps(&steps, 42).is_ok());
        assert!(matches!(
            validate_steps(&steps, 0),
            Err(CampaignError::InvalidWorkflow(_))
        ));
    }

    #[test]
    fn test_abort_handle_is_shared() {
        let handle = AbortHandle::default();
        let clone = handle.clone();
        clone.abort();
        assert!(handle.is_aborted());
    }
}

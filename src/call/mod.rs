//! Campaign pallet calls and their SCALE encoding
//!
//! A [`Call`] names one `Task` pallet operation and its ordered arguments.
//! Encoding produces `[pallet][call][args...]` call data; privileged calls are
//! wrapped as `Sudo.sudo(call)`.

pub mod types;

use parity_scale_codec::Encode;
use serde::{Deserialize, Serialize};
use subxt_core::metadata::Metadata;

use crate::address::account_id_bytes;
use crate::error::CampaignError;
use crate::types::CampaignIndex;

/// Operations exposed by the campaign pallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskOperation {
    CreateCampaign,
    ApproveCampaign,
    Reward,
    Claim,
}

impl TaskOperation {
    /// Call name in runtime metadata
    pub fn call_name(self) -> &'static str {
        match self {
            TaskOperation::CreateCampaign => "create_campaign",
            TaskOperation::ApproveCampaign => "approve_campaign",
            TaskOperation::Reward => "payment",
            TaskOperation::Claim => "claim",
        }
    }

    /// Whether the ledger only accepts this call from the root origin
    pub fn requires_root(self) -> bool {
        !matches!(self, TaskOperation::CreateCampaign)
    }
}

/// Campaign argument: a known index, or the campaign created by an earlier step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CampaignRef {
    Index { index: CampaignIndex },
    /// 1-based step number of a blocking `createCampaign` step
    CreatedBy { step: usize },
}

impl From<CampaignIndex> for CampaignRef {
    fn from(index: CampaignIndex) -> Self {
        CampaignRef::Index { index }
    }
}

/// Typed call argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum CallArg {
    Balance(u128),
    Campaign(CampaignRef),
    Account(String),
    Accounts(Vec<String>),
}

impl CallArg {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), CampaignError> {
        match self {
            CallArg::Balance(amount) => amount.encode_to(out),
            CallArg::Campaign(CampaignRef::Index { index }) => index.encode_to(out),
            CallArg::Campaign(CampaignRef::CreatedBy { step }) => {
                return Err(CampaignError::UnresolvedCampaign { step: *step });
            }
            CallArg::Account(address) => account_id_bytes(address)?.encode_to(out),
            CallArg::Accounts(addresses) => {
                let ids = addresses
                    .iter()
                    .map(|a| account_id_bytes(a))
                    .collect::<Result<Vec<_>, _>>()?;
                ids.encode_to(out);
            }
        }
        Ok(())
    }
}

/// One campaign pallet call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    operation: TaskOperation,
    args: Vec<CallArg>,
}

impl Call {
    /// `create_campaign(value)`
    pub fn create_campaign(amount: u128) -> Self {
        Self {
            operation: TaskOperation::CreateCampaign,
            args: vec![CallArg::Balance(amount)],
        }
    }

    /// `approve_campaign(campaign_index)`
    pub fn approve_campaign(campaign: impl Into<CampaignRef>) -> Self {
        Self {
            operation: TaskOperation::ApproveCampaign,
            args: vec![CallArg::Campaign(campaign.into())],
        }
    }

    /// `payment(campaign_index, users, amount)`: credit `amount` to each recipient
    pub fn reward(campaign: impl Into<CampaignRef>, recipients: Vec<String>, amount: u128) -> Self {
        Self {
            operation: TaskOperation::Reward,
            args: vec![
                CallArg::Campaign(campaign.into()),
                CallArg::Accounts(recipients),
                CallArg::Balance(amount),
            ],
        }
    }

    /// `claim(campaign_index, amount, user)`
    pub fn claim(campaign: impl Into<CampaignRef>, amount: u128, user: String) -> Self {
        Self {
            operation: TaskOperation::Claim,
            args: vec![
                CallArg::Campaign(campaign.into()),
                CallArg::Balance(amount),
                CallArg::Account(user),
            ],
        }
    }

    pub fn operation(&self) -> TaskOperation {
        self.operation
    }

    pub fn args(&self) -> &[CallArg] {
        &self.args
    }

    /// Campaign references carried by this call
    pub fn campaign_refs(&self) -> impl Iterator<Item = &CampaignRef> {
        self.args.iter().filter_map(|arg| match arg {
            CallArg::Campaign(campaign) => Some(campaign),
            _ => None,
        })
    }

    /// Replace `CreatedBy` references with discovered indices
    pub fn resolve<F>(&self, lookup: F) -> Result<Call, CampaignError>
    where
        F: Fn(usize) -> Option<CampaignIndex>,
    {
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                CallArg::Campaign(CampaignRef::CreatedBy { step }) => lookup(*step)
                    .map(|index| CallArg::Campaign(CampaignRef::Index { index }))
                    .ok_or(CampaignError::UnresolvedCampaign { step: *step }),
                other => Ok(other.clone()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Call {
            operation: self.operation,
            args,
        })
    }
}

/// Pallet and call indices used for encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallIndexTable {
    pub task_pallet: u8,
    pub create_campaign: u8,
    pub approve_campaign: u8,
    pub payment: u8,
    pub claim: u8,
    pub sudo_pallet: u8,
    pub sudo_call: u8,
}

impl Default for CallIndexTable {
    fn default() -> Self {
        Self {
            task_pallet: 8,
            create_campaign: 0,
            approve_campaign: 1,
            payment: 2,
            claim: 3,
            sudo_pallet: 7,
            sudo_call: 0,
        }
    }
}

impl CallIndexTable {
    /// Resolve indices from runtime metadata (handles runtime upgrades)
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, CampaignError> {
        let (task_pallet, create_campaign) = get_call_index(metadata, "Task", "create_campaign")?;
        let (_, approve_campaign) = get_call_index(metadata, "Task", "approve_campaign")?;
        let (_, payment) = get_call_index(metadata, "Task", "payment")?;
        let (_, claim) = get_call_index(metadata, "Task", "claim")?;
        let (sudo_pallet, sudo_call) = get_call_index(metadata, "Sudo", "sudo")?;
        Ok(Self {
            task_pallet,
            create_campaign,
            approve_campaign,
            payment,
            claim,
            sudo_pallet,
            sudo_call,
        })
    }

    /// Resolve indices from SCALE-encoded runtime metadata (`state_getMetadata`)
    pub fn from_metadata_bytes(bytes: &[u8]) -> Result<Self, CampaignError> {
        let metadata = subxt_core::metadata::decode_from(bytes)
            .map_err(|e| CampaignError::Encoding(format!("Invalid metadata: {}", e)))?;
        Self::from_metadata(&metadata)
    }

    fn call_index(&self, operation: TaskOperation) -> (u8, u8) {
        let call = match operation {
            TaskOperation::CreateCampaign => self.create_campaign,
            TaskOperation::ApproveCampaign => self.approve_campaign,
            TaskOperation::Reward => self.payment,
            TaskOperation::Claim => self.claim,
        };
        (self.task_pallet, call)
    }
}

/// Encode a call to call data bytes
pub fn encode_call(call: &Call, table: &CallIndexTable) -> Result<Vec<u8>, CampaignError> {
    let (pallet_idx, call_idx) = table.call_index(call.operation);
    let mut result = vec![pallet_idx, call_idx];
    for arg in &call.args {
        arg.encode_to(&mut result)?;
    }
    Ok(result)
}

/// Wrap encoded call data in `Sudo.sudo(call)`
pub fn encode_sudo(inner: &[u8], table: &CallIndexTable) -> Vec<u8> {
    let mut result = Vec::with_capacity(inner.len() + 2);
    result.push(table.sudo_pallet);
    result.push(table.sudo_call);
    result.extend_from_slice(inner);
    result
}

/// Get pallet and call index from metadata
fn get_call_index(
    metadata: &Metadata,
    pallet: &str,
    method: &str,
) -> Result<(u8, u8), CampaignError> {
    let p = metadata
        .pallet_by_name(pallet)
        .ok_or_else(|| CampaignError::Encoding(format!("{} pallet not found", pallet)))?;
    let c = p
        .call_variant_by_name(method)
        .ok_or_else(|| CampaignError::Encoding(format!("{}.{} not found", pallet, method)))?;
    Ok((p.index(), c.index))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "5EGoFA95omzemRssELLDjVenNZ68aXyUeqtKQScXSEBvVJkr";
    const ALICE_PUBKEY: &str = "61b18c6dc02ddcabdeac56cb4f21a971cc41cc97640f6f85b073480008c53a0d";

    #[test]
    fn test_encode_create_campaign() {
        let data = encode_call(&Call::create_campaign(10_000_000_000), &CallIndexTable::default())
            .unwrap();
        assert_eq!(data[..2], [8, 0]);
        assert_eq!(data[2..], 10_000_000_000u128.to_le_bytes());
    }

    #[test]
    fn test_encode_reward() {
        let call = Call::reward(0u32, vec![ALICE.to_string()], 10_000);
        let data = encode_call(&call, &CallIndexTable::default()).unwrap();

        let mut expected = vec![8u8, 2];
        expected.extend_from_slice(&0u32.to_le_bytes());
        expected.push(4); // compact(1)
        expected.extend_from_slice(&hex::decode(ALICE_PUBKEY).unwrap());
        expected.extend_from_slice(&10_000u128.to_le_bytes());
        assert_eq!(data, expected);
    }

    #[test]
    fn test_sudo_wraps_inner_call() {
        let table = CallIndexTable::default();
        let inner = encode_call(&Call::approve_campaign(3u32), &table).unwrap();
        let wrapped = encode_sudo(&inner, &table);
        assert_eq!(wrapped[..2], [7, 0]);
        assert_eq!(wrapped[2..], inner[..]);
    }

    #[test]
    fn test_unresolved_reference_does_not_encode() {
        let call = Call::approve_campaign(CampaignRef::CreatedBy { step: 1 });
        assert_eq!(
            encode_call(&call, &CallIndexTable::default()),
            Err(CampaignError::UnresolvedCampaign { step: 1 })
        );
    }

    #[test]
    fn test_resolve_created_by() {
        let call = Call::reward(
            CampaignRef::CreatedBy { step: 1 },
            vec![ALICE.to_string()],
            5,
        );
        let resolved = call.resolve(|step| (step == 1).then_some(4)).unwrap();
        assert_eq!(
            resolved.campaign_refs().collect::<Vec<_>>(),
            vec![&CampaignRef::Index { index: 4 }]
        );
        assert_eq!(
            call.resolve(|_| None),
            Err(CampaignError::UnresolvedCampaign { step: 1 })
        );
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let call = Call::reward(0u32, vec!["not-an-address".to_string()], 5);
        assert!(matches!(
            encode_call(&call, &CallIndexTable::default()),
            Err(CampaignError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_garbage_metadata_rejected() {
        assert!(matches!(
            CallIndexTable::from_metadata_bytes(&[0xde, 0xad]),
            Err(CampaignError::Encoding(_))
        ));
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(TaskOperation::Reward.call_name(), "payment");
        assert!(TaskOperation::Claim.requires_root());
        assert!(!TaskOperation::CreateCampaign.requires_root());
    }
}

//! JSON call intents
//!
//! Matches the JS client shape: `{ "type": "createCampaign", "amount": "10000000000" }`.
//! Amounts are accepted as numbers or strings so u128 values survive JSON.

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::call::Call;
use crate::types::CampaignIndex;

/// Deserialize u128 from either a number or string
fn deserialize_u128<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    struct U128Visitor;

    impl<'de> de::Visitor<'de> for U128Visitor {
        type Value = u128;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a u128 as number or string")
        }

        fn visit_u64<E>(self, value: u64) -> Result<u128, E>
        where
            E: de::Error,
        {
            Ok(value as u128)
        }

        fn visit_i64<E>(self, value: i64) -> Result<u128, E>
        where
            E: de::Error,
        {
            if value >= 0 {
                Ok(value as u128)
            } else {
                Err(E::custom("negative values not allowed"))
            }
        }

        fn visit_str<E>(self, value: &str) -> Result<u128, E>
        where
            E: de::Error,
        {
            value.parse().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(U128Visitor)
}

/// Call intent - which campaign pallet call to encode
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CallIntent {
    /// Open a campaign funded with `amount`
    CreateCampaign {
        #[serde(deserialize_with = "deserialize_u128")]
        amount: u128,
    },
    /// Approve a campaign (root only)
    ApproveCampaign {
        #[serde(rename = "campaignIndex")]
        campaign_index: CampaignIndex,
    },
    /// Credit `amount` to each recipient (root only)
    Reward {
        #[serde(rename = "campaignIndex")]
        campaign_index: CampaignIndex,
        /// Recipient addresses (SS58)
        recipients: Vec<String>,
        #[serde(deserialize_with = "deserialize_u128")]
        amount: u128,
    },
    /// Pay out a claimable balance to `user` (root only)
    Claim {
        #[serde(rename = "campaignIndex")]
        campaign_index: CampaignIndex,
        #[serde(deserialize_with = "deserialize_u128")]
        amount: u128,
        /// Claiming user (SS58)
        user: String,
    },
}

impl From<CallIntent> for Call {
    fn from(intent: CallIntent) -> Self {
        match intent {
            CallIntent::CreateCampaign { amount } => Call::create_campaign(amount),
            CallIntent::ApproveCampaign { campaign_index } => {
                Call::approve_campaign(campaign_index)
            }
            CallIntent::Reward {
                campaign_index,
                recipients,
                amount,
            } => Call::reward(campaign_index, recipients, amount),
            CallIntent::Claim {
                campaign_index,
                amount,
                user,
            } => Call::claim(campaign_index, amount, user),
        }
    }
}

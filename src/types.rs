//! Shared types for campaign transactions

use core::fmt;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::address::{account_id_bytes, encode_ss58};
use crate::amount::checked_exponent;
use crate::error::CampaignError;

/// Campaign identifier assigned by the ledger
pub type CampaignIndex = u32;

/// Per-account transaction counter
pub type Nonce = u32;

/// Signing identity with a stable SS58 address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    address: String,
    #[serde(with = "hex_bytes")]
    public_key: [u8; 32],
}

impl Account {
    /// Build an account from a 32-byte public key
    pub fn from_public_key(public_key: [u8; 32], prefix: u16) -> Result<Self, CampaignError> {
        let address = encode_ss58(&public_key, prefix)?;
        Ok(Self {
            address,
            public_key,
        })
    }

    /// Build an account from an SS58 address
    pub fn from_address(address: &str) -> Result<Self, CampaignError> {
        let public_key = account_id_bytes(address)?;
        Ok(Self {
            address: address.to_string(),
            public_key,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Point-in-time account state, never cached across workflow steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub nonce: Nonce,
    pub free_balance: BigUint,
}

/// Token metadata, constant for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetadata {
    /// Token symbol (e.g., "UNIT")
    pub token_symbol: String,
    /// Decimal exponent of the native token
    pub decimals: u32,
}

impl ChainMetadata {
    /// Parse node `system_properties`
    ///
    /// `tokenSymbol` and `tokenDecimals` may be scalars or arrays; the first
    /// entry describes the native token.
    pub fn from_properties(properties: &serde_json::Value) -> Result<Self, CampaignError> {
        let symbol = first_entry(properties, "tokenSymbol")?;
        let token_symbol = symbol
            .as_str()
            .ok_or_else(|| CampaignError::Query("tokenSymbol is not a string".to_string()))?
            .to_string();

        let decimals = first_entry(properties, "tokenDecimals")?;
        let decimals = decimals
            .as_i64()
            .ok_or_else(|| CampaignError::Query("tokenDecimals is not an integer".to_string()))?;
        let decimals = checked_exponent(decimals)?;

        Ok(Self {
            token_symbol,
            decimals,
        })
    }
}

fn first_entry<'a>(
    properties: &'a serde_json::Value,
    key: &str,
) -> Result<&'a serde_json::Value, CampaignError> {
    let value = properties
        .get(key)
        .ok_or_else(|| CampaignError::Query(format!("{} missing from properties", key)))?;
    match value {
        serde_json::Value::Array(items) => items
            .first()
            .ok_or_else(|| CampaignError::Query(format!("{} is empty", key))),
        other => Ok(other),
    }
}

/// Balance a user can still claim, as reported by the campaign pallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimableBalance {
    /// Block in which the balance was last credited
    pub last_block: u32,
    /// Remaining claimable amount
    pub amount: u128,
}

/// 32-byte block hash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHash(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl From<[u8; 32]> for BlockHash {
    fn from(bytes: [u8; 32]) -> Self {
        BlockHash(bytes)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Blake2-256 hash identifying a prepared extrinsic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtrinsicHash(#[serde(with = "hex_bytes")] pub [u8; 32]);

impl fmt::Display for ExtrinsicHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|v: Vec<u8>| de::Error::custom(format!("expected 32 bytes, got {}", v.len())))
    }
}

//! Client configuration

use serde::{Deserialize, Serialize};

use crate::call::CallIndexTable;
use crate::error::CampaignError;

const ENDPOINT_SCHEMES: [&str; 4] = ["ws://", "wss://", "http://", "https://"];

/// How the next nonce for a signer is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoncePolicy {
    /// Re-read the chain nonce before every signing (never below the local counter)
    #[default]
    Requery,
    /// Use the local counter once a first nonce has been confirmed
    LocalIncrement,
}

/// Connection and encoding settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Node endpoint (e.g., "ws://127.0.0.1:9944")
    pub endpoint: String,
    /// SS58 prefix for derived addresses (default: 42)
    #[serde(default = "default_ss58_prefix")]
    pub ss58_prefix: u16,
    #[serde(default)]
    pub call_indices: CallIndexTable,
    #[serde(default)]
    pub nonce_policy: NoncePolicy,
}

fn default_ss58_prefix() -> u16 {
    42
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ss58_prefix: default_ss58_prefix(),
            call_indices: CallIndexTable::default(),
            nonce_policy: NoncePolicy::default(),
        }
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, CampaignError> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_ss58_prefix(mut self, prefix: u16) -> Self {
        self.ss58_prefix = prefix;
        self
    }

    pub fn with_nonce_policy(mut self, policy: NoncePolicy) -> Self {
        self.nonce_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), CampaignError> {
        let rest = ENDPOINT_SCHEMES
            .iter()
            .find_map(|scheme| self.endpoint.strip_prefix(*scheme))
            .ok_or_else(|| {
                CampaignError::InvalidConfig(format!(
                    "endpoint '{}' must use ws, wss, http or https",
                    self.endpoint
                ))
            })?;
        if rest.is_empty() {
            return Err(CampaignError::InvalidConfig(format!(
                "endpoint '{}' has no host",
                self.endpoint
            )));
        }
        if self.ss58_prefix > 16383 {
            return Err(CampaignError::InvalidConfig(format!(
                "ss58Prefix {} out of range",
                self.ss58_prefix
            )));
        }
        Ok(())
    }
}

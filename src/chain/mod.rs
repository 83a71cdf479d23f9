//! Chain access
//!
//! [`ChainApi`] is the node-facing seam: sessions, point-in-time state reads
//! and extrinsic submission. Every call takes the [`ChainHandle`] returned by
//! `connect`; implementations hold no implicit current session.

pub mod mock;

use async_trait::async_trait;

use crate::error::CampaignError;
use crate::lifecycle::Subscription;
use crate::privilege::PreparedExtrinsic;
use crate::types::{AccountState, BlockHash, CampaignIndex, ChainMetadata, ClaimableBalance};

pub use mock::MockChain;

/// Established node session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHandle {
    endpoint: String,
    session: u64,
}

impl ChainHandle {
    pub fn new(endpoint: impl Into<String>, session: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            session,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn session(&self) -> u64 {
        self.session
    }
}

/// Node interface. Implementations may be in-memory mocks or RPC clients.
#[async_trait(?Send)]
pub trait ChainApi {
    /// Open a session; fails with [`CampaignError::Connection`]
    async fn connect(&self, endpoint: &str) -> Result<ChainHandle, CampaignError>;

    async fn query_account_state(
        &self,
        handle: &ChainHandle,
        address: &str,
    ) -> Result<AccountState, CampaignError>;

    async fn query_metadata(&self, handle: &ChainHandle) -> Result<ChainMetadata, CampaignError>;

    /// Submit a signed extrinsic and subscribe to its status
    async fn submit(
        &self,
        handle: &ChainHandle,
        extrinsic: PreparedExtrinsic,
    ) -> Result<Subscription, CampaignError>;

    /// Campaign created by `creator` in `block`, if any
    async fn query_created_campaign(
        &self,
        handle: &ChainHandle,
        block: &BlockHash,
        creator: &str,
    ) -> Result<Option<CampaignIndex>, CampaignError>;

    /// Remaining balance `address` may claim (`Task.balanceUser`)
    async fn query_claimable_balance(
        &self,
        handle: &ChainHandle,
        address: &str,
    ) -> Result<ClaimableBalance, CampaignError>;
}

//! task-campaign-client: client-side orchestration of campaign extrinsics
//!
//! This crate provides:
//! - Fixed-point conversion between raw balances and decimal amounts
//! - Campaign call encoding, with `Sudo.sudo` elevation for root-only calls
//! - Extrinsic lifecycle tracking with exactly-once subscription release
//! - Multi-step workflows (create, approve, reward) with per-signer nonce
//!   serialization
//!
//! # Architecture
//!
//! The crate follows a two-layer architecture:
//! - **Core layer** (`src/*.rs`): Pure Rust logic, no WASM dependencies
//! - **WASM layer** (`src/wasm/*.rs`): Thin wrappers with `#[wasm_bindgen]`
//!
//! Node access goes through the [`ChainApi`] trait; [`MockChain`] is an
//! in-memory campaign ledger implementing it.

pub mod address;
pub mod amount;
pub mod call;
pub mod chain;
pub mod config;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod nonce;
pub mod privilege;
pub mod types;
pub mod wasm;
pub mod workflow;

// Re-export main types for convenience
pub use address::validate_address;
pub use amount::{format_balance, parse_amount, to_display, to_raw, DisplayAmount};
pub use call::{Call, CallIndexTable, CampaignRef, TaskOperation};
pub use chain::{ChainApi, ChainHandle, MockChain};
pub use config::{ClientConfig, NoncePolicy};
pub use error::CampaignError;
pub use identity::{IdentityResolver, PhraseIdentityResolver};
pub use lifecycle::{observe, ExtrinsicStatus, Subscription, SubscriptionId};
pub use privilege::{elevate, Extrinsic, PreparedExtrinsic};
pub use types::{Account, AccountState, CampaignIndex, ChainMetadata, ClaimableBalance};
pub use workflow::{
    campaign_reward_steps, claim_step, AbortHandle, Orchestrator, StepOutcome, StepSpec,
    WorkflowResult,
};

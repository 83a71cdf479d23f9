//! WASM bindings for task-campaign-client
//!
//! This module contains thin wrappers with #[wasm_bindgen] that delegate
//! to the core Rust implementations.

pub mod amount;
pub mod builder;
pub mod try_into_js_value;

// Re-export WASM types
pub use amount::AmountNamespace;
pub use builder::BuilderNamespace;

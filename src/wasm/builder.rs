//! WASM bindings for call encoding
//!
//! BuilderNamespace turns a JSON call intent into call data, optionally
//! wrapped in `Sudo.sudo` for root-only operations.

use crate::address::validate_address;
use crate::call::{encode_call, encode_sudo, types::CallIntent, Call, CallIndexTable};
use crate::js_obj;
use wasm_bindgen::prelude::*;

/// Namespace for building operations
#[wasm_bindgen]
pub struct BuilderNamespace;

#[wasm_bindgen]
impl BuilderNamespace {
    /// Encode a campaign call from an intent
    ///
    /// # Arguments
    /// * `intent` - What to do (JSON object with type field)
    /// * `elevated` - Wrap the call in `Sudo.sudo`
    /// * `call_indices` - Optional pallet/call index overrides
    ///
    /// # Example Intent (Reward)
    /// ```json
    /// { "type": "reward", "campaignIndex": 0, "recipients": ["5HMabVtS..."], "amount": "10000" }
    /// ```
    ///
    /// # Returns
    /// `{ callData: string, operation: string, requiresRoot: boolean }`, call data as 0x hex
    #[wasm_bindgen(js_name = encodeCall)]
    pub fn encode_call_wasm(
        intent: JsValue,
        elevated: bool,
        call_indices: JsValue,
    ) -> Result<JsValue, JsValue> {
        let intent: CallIntent = serde_wasm_bindgen::from_value(intent)
            .map_err(|e| JsValue::from_str(&format!("Invalid intent: {}", e)))?;

        let table: CallIndexTable = if call_indices.is_undefined() || call_indices.is_null() {
            CallIndexTable::default()
        } else {
            serde_wasm_bindgen::from_value(call_indices)
                .map_err(|e| JsValue::from_str(&format!("Invalid call indices: {}", e)))?
        };

        let call = Call::from(intent);
        let inner = encode_call(&call, &table)?;
        let data = if elevated {
            encode_sudo(&inner, &table)
        } else {
            inner
        };

        let operation = call.operation();
        Ok(js_obj!(
            "callData" => format!("0x{}", hex::encode(data)),
            "operation" => operation.call_name(),
            "requiresRoot" => operation.requires_root(),
        )?)
    }

    /// Read call indices from SCALE-encoded runtime metadata
    ///
    /// The result can be passed as `callIndices` to `encodeCall`.
    #[wasm_bindgen(js_name = callIndicesFromMetadata)]
    pub fn call_indices_from_metadata(metadata: &[u8]) -> Result<JsValue, JsValue> {
        let table = CallIndexTable::from_metadata_bytes(metadata)?;
        serde_wasm_bindgen::to_value(&table)
            .map_err(|e| JsValue::from_str(&format!("Failed to convert call indices: {}", e)))
    }

    /// Check an SS58 address
    #[wasm_bindgen(js_name = validateAddress)]
    pub fn validate_address_wasm(address: &str, prefix: Option<u16>) -> bool {
        validate_address(address, prefix)
    }
}

//! WASM bindings for fixed-point amounts

use crate::amount::{parse_amount, to_display, to_raw};
use crate::js_obj;
use crate::wasm::try_into_js_value::biguint_from_js;
use wasm_bindgen::prelude::*;

/// Namespace for amount conversion
#[wasm_bindgen]
pub struct AmountNamespace;

#[wasm_bindgen]
impl AmountNamespace {
    /// Split a raw balance at the decimal point
    ///
    /// # Returns
    /// `{ integer: bigint, fractional: bigint, exponent: number, display: string }`
    ///
    /// # Example
    /// `toDisplay(10000000000n, 6)` gives
    /// `{ integer: 10000n, fractional: 0n, exponent: 6, display: "10000.0" }`
    #[wasm_bindgen(js_name = toDisplay)]
    pub fn to_display_wasm(raw: js_sys::BigInt, exponent: i32) -> Result<JsValue, JsValue> {
        let raw = biguint_from_js(&raw)?;
        let display = to_display(&raw, exponent as i64)?;
        let text = display.to_string();
        Ok(js_obj!(
            "integer" => display.integer,
            "fractional" => display.fractional,
            "exponent" => display.exponent,
            "display" => text,
        )?)
    }

    /// Inverse of `toDisplay`
    #[wasm_bindgen(js_name = toRaw)]
    pub fn to_raw_wasm(
        integer: js_sys::BigInt,
        fractional: js_sys::BigInt,
        exponent: i32,
    ) -> Result<JsValue, JsValue> {
        let integer = biguint_from_js(&integer)?;
        let fractional = biguint_from_js(&fractional)?;
        let raw = to_raw(&integer, &fractional, exponent as i64)?;
        Ok(js_obj!("raw" => raw)?)
    }

    /// Parse a decimal string (e.g., "1.5") into a raw balance string
    #[wasm_bindgen(js_name = parseAmount)]
    pub fn parse_amount_wasm(text: &str, exponent: i32) -> Result<String, JsValue> {
        Ok(parse_amount(text, exponent as i64)?.to_string())
    }
}

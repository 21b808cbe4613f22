//! WebAssembly module for the Production Lot Engine
//!
//! Provides client-side previews for the planning UI:
//! - Alert severity for a requirement
//! - Lot and procurement transition checks
//! - Cost rollups and selection validation
//!
//! Quantities cross the boundary as decimal strings to avoid float rounding.

use std::str::FromStr;

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

fn parse_decimal(value: &str, field: &str) -> Result<Decimal, JsValue> {
    Decimal::from_str(value.trim())
        .map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", field, e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(json: &str, what: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("Invalid {} JSON: {}", what, e)))
}

/// Classify a requirement. A missing `available` means the stock lookup
/// failed; `thresholds_json` is an alert rule's thresholds, if any.
#[wasm_bindgen]
pub fn classify_alert_severity(
    required: &str,
    available: Option<String>,
    thresholds_json: Option<String>,
) -> Result<String, JsValue> {
    let required = parse_decimal(required, "required quantity")?;
    let availability = match available {
        Some(q) => Availability::Known(parse_decimal(&q, "available quantity")?),
        None => Availability::Unknown,
    };
    let thresholds: Option<AlertThresholds> = match thresholds_json {
        Some(json) => Some(parse_json(&json, "thresholds")?),
        None => None,
    };

    Ok(classify_severity(required, availability, thresholds.as_ref())
        .as_str()
        .to_string())
}

/// Whether a lot may move between two statuses in one step
#[wasm_bindgen]
pub fn is_lot_transition_allowed(from: &str, to: &str) -> bool {
    match (LotStatus::parse(from), LotStatus::parse(to)) {
        (Some(from), Some(to)) => from.can_transition_to(to),
        _ => false,
    }
}

/// Whether a recommendation may change status, given whether a purchase order is supplied
#[wasm_bindgen]
pub fn is_procurement_transition_allowed(from: &str, to: &str, purchase_order_supplied: bool) -> bool {
    match (ProcurementStatus::parse(from), ProcurementStatus::parse(to)) {
        (Some(from), Some(to)) => from.transition(to, purchase_order_supplied).is_ok(),
        _ => false,
    }
}

/// Roll up a lot draft; returns the totals and warnings as JSON
#[wasm_bindgen]
pub fn preview_material_cost(rollup_json: &str) -> Result<String, JsValue> {
    let input: RollupInput = parse_json(rollup_json, "rollup")?;
    let result = compute_rollup(&input);
    #[cfg(target_arch = "wasm32")]
    if !result.warnings.is_empty() {
        web_sys::console::warn_1(&JsValue::from_str(&format!(
            "rollup preview skipped {} input(s)",
            result.warnings.len()
        )));
    }
    serde_json::to_string(&result).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Check a selection set before submitting it; returns the first problem, if any
#[wasm_bindgen]
pub fn check_selection_set(template_json: &str, selections_json: &str) -> Result<Option<String>, JsValue> {
    let template: SubprocessTemplate = parse_json(template_json, "subprocess")?;
    let selections: Vec<ProposedSelection> = parse_json(selections_json, "selections")?;
    Ok(validate_selection_set(&template, &selections)
        .err()
        .map(|e| e.to_string()))
}

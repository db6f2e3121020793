//! WebAssembly module for the stone lot selector
//!
//! Exposes the I/O-free selection core to the browser view layer:
//! - Identifier extraction from relational field values
//! - Candidate merging and block grouping
//! - Host mutation building for both host kinds
//! - Filter validation and the fallback quant domain
//!
//! Every export takes and returns JSON. The `*_json` functions carry the
//! logic and are plain Rust so they can be tested natively.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

#[derive(Serialize)]
struct ExtractionView {
    ids: Vec<LotId>,
    diagnostic: Option<String>,
}

#[derive(Serialize)]
struct MoveLinePlan {
    patch: Option<Value>,
    diagnostics: Vec<Diagnostic>,
}

fn parse<T: serde::de::DeserializeOwned>(input: &str, what: &str) -> Result<T, String> {
    serde_json::from_str(input).map_err(|e| format!("Invalid {} JSON: {}", what, e))
}

fn render<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

fn to_js(result: Result<String, String>) -> Result<JsValue, JsValue> {
    let json = result.map_err(|e| JsValue::from_str(&e))?;
    js_sys::JSON::parse(&json)
}

fn candidates_by_lot(candidates: Vec<Candidate>) -> BTreeMap<LotId, Candidate> {
    candidates
        .into_iter()
        .filter_map(|c| c.lot_id.map(|lot| (lot, c)))
        .collect()
}

pub fn extract_lot_ids_json(raw_json: &str) -> Result<String, String> {
    let raw: Value = parse(raw_json, "field value")?;
    let extraction = extract_identifiers(&raw);
    render(&ExtractionView {
        ids: extraction.ids.into_iter().collect(),
        diagnostic: extraction.diagnostic.map(|d| d.to_string()),
    })
}

/// Extract lot ids from whatever shape the host field currently has
#[wasm_bindgen]
pub fn extract_lot_ids(raw_json: &str) -> Result<JsValue, JsValue> {
    let result = extract_lot_ids_json(raw_json);
    if let Ok(json) = &result {
        if json.contains("\"diagnostic\":\"") {
            web_sys::console::warn_1(&JsValue::from_str(json));
        }
    }
    to_js(result)
}

/// Merge server quants with pending lots; `assigned_json` holds candidates
/// rebuilt from the host record
pub fn merge_candidates_json(
    quants_json: &str,
    pending_json: &str,
    assigned_json: &str,
) -> Result<String, String> {
    let quants: Value = parse(quants_json, "quants")?;
    let pending: BTreeSet<LotId> = parse(pending_json, "pending lots")?;
    let assigned: Vec<Candidate> = parse(assigned_json, "assigned candidates")?;

    let server = Candidate::list_from_quants(&quants).map_err(|e| e.to_string())?;
    render(&merge(&server, &pending, &candidates_by_lot(assigned)))
}

#[wasm_bindgen]
pub fn merge_candidates(
    quants_json: &str,
    pending_json: &str,
    assigned_json: &str,
) -> Result<JsValue, JsValue> {
    to_js(merge_candidates_json(quants_json, pending_json, assigned_json))
}

pub fn group_candidates_json(candidates_json: &str, pending_json: &str) -> Result<String, String> {
    let candidates: Vec<Candidate> = parse(candidates_json, "candidates")?;
    let pending: BTreeSet<LotId> = parse(pending_json, "pending lots")?;
    render(&group_candidates(&candidates, &pending))
}

/// Group merged candidates by block, selected groups first
#[wasm_bindgen]
pub fn group_by_block(candidates_json: &str, pending_json: &str) -> Result<JsValue, JsValue> {
    to_js(group_candidates_json(candidates_json, pending_json))
}

/// Replace-all patch for a sale order line; `null` when nothing changed
pub fn replace_all_patch_json(
    field: &str,
    previous_json: &str,
    next_json: &str,
) -> Result<String, String> {
    let previous: BTreeSet<LotId> = parse(previous_json, "previous lots")?;
    let next: BTreeSet<LotId> = parse(next_json, "next lots")?;
    render(&build_command(&previous, &next).map(|command| command.patch(field)))
}

#[wasm_bindgen]
pub fn replace_all_patch(field: &str, previous_json: &str, next_json: &str) -> Result<JsValue, JsValue> {
    to_js(replace_all_patch_json(field, previous_json, next_json))
}

/// Create/delete batch for a stock move's move lines.
///
/// `lines_json` is the raw one2many value of the host field.
pub fn move_line_patch_json(
    field: &str,
    lines_json: &str,
    next_json: &str,
    candidates_json: &str,
    source: Option<i32>,
    destination: Option<i32>,
) -> Result<String, String> {
    let lines: Value = parse(lines_json, "move lines")?;
    let next: BTreeSet<LotId> = parse(next_json, "next lots")?;
    let candidates: Vec<Candidate> = parse(candidates_json, "candidates")?;
    let locations = HostLocations {
        source: source.map(i64::from),
        destination: destination.map(i64::from),
    };

    let plan = diff_commands(
        &child_lines(&lines),
        &next,
        &candidates_by_lot(candidates),
        &locations,
    );
    render(&MoveLinePlan {
        patch: (!plan.is_empty()).then(|| ChildMutation::batch_patch(field, &plan.mutations)),
        diagnostics: plan.diagnostics,
    })
}

#[wasm_bindgen]
pub fn move_line_patch(
    field: &str,
    lines_json: &str,
    next_json: &str,
    candidates_json: &str,
    source: Option<i32>,
    destination: Option<i32>,
) -> Result<JsValue, JsValue> {
    to_js(move_line_patch_json(
        field,
        lines_json,
        next_json,
        candidates_json,
        source,
        destination,
    ))
}

/// Validation message for the filter inputs; empty when every filter is usable
pub fn check_filters_json(filters_json: &str) -> Result<String, String> {
    let filters: FilterSet = parse(filters_json, "filters")?;
    Ok(validate_filters(&filters)
        .err()
        .map(|e| e.to_string())
        .unwrap_or_default())
}

#[wasm_bindgen]
pub fn check_filters(filters_json: &str) -> Result<String, JsValue> {
    check_filters_json(filters_json).map_err(|e| JsValue::from_str(&e))
}

pub fn quant_domain_json(product_id: i32, filters_json: &str) -> Result<String, String> {
    let filters: FilterSet = parse(filters_json, "filters")?;
    render(&build_quant_domain(i64::from(product_id), &filters))
}

/// Search domain used when the paginated inventory method is unavailable
#[wasm_bindgen]
pub fn quant_domain(product_id: i32, filters_json: &str) -> Result<JsValue, JsValue> {
    to_js(quant_domain_json(product_id, filters_json))
}

#[wasm_bindgen]
pub fn has_more_pages(loaded: u32, total: u32) -> bool {
    loaded < total
}

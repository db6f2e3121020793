//! Search domains for the full-fetch fallback
//!
//! When the paginated inventory method is missing, candidates are read with a
//! plain `search_read` on quants. The domain mirrors what the paginated method
//! applies server-side.

use std::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Value};

use super::candidate::Candidate;
use super::filters::{FilterKey, FilterSet};
use crate::types::RecordId;
use crate::validation::{parse_dimension, thickness_tolerance};

/// Quant fields read by the fallback query
pub const QUANT_FIELDS: &[&str] = &[
    "lot_id",
    "location_id",
    "quantity",
    "reserved_quantity",
    "x_bloque",
    "x_atado",
    "x_alto",
    "x_ancho",
    "x_grosor",
    "x_tipo",
    "x_color",
    "x_contenedor",
    "x_pedimento",
];

/// Lot fields read to enrich assigned entries
pub const LOT_FIELDS: &[&str] = &[
    "name",
    "x_bloque",
    "x_atado",
    "x_alto",
    "x_ancho",
    "x_grosor",
    "x_tipo",
    "x_color",
    "x_origen",
    "x_pedimento",
    "x_detalles_placa",
];

/// Build the quant search domain for a product and filter set.
///
/// Numeric filters that do not parse are left out, matching the paginated method.
pub fn build_quant_domain(product_id: RecordId, filters: &FilterSet) -> Value {
    let mut domain = vec![
        json!(["product_id", "=", product_id]),
        json!(["location_id.usage", "=", "internal"]),
        json!(["quantity", ">", 0]),
    ];

    for (key, value) in filters.active() {
        match key {
            FilterKey::LotName => domain.push(json!(["lot_id.name", "ilike", value])),
            FilterKey::Block => domain.push(json!(["x_bloque", "ilike", value])),
            FilterKey::Bundle => domain.push(json!(["x_atado", "ilike", value])),
            FilterKey::Container => domain.push(json!(["x_contenedor", "ilike", value])),
            FilterKey::CustomsRef => domain.push(json!(["x_pedimento", "ilike", value])),
            FilterKey::MinHeight => {
                if let Some(n) = parse_dimension(value).and_then(|d| d.to_f64()) {
                    domain.push(json!(["x_alto", ">=", n]));
                }
            }
            FilterKey::MinWidth => {
                if let Some(n) = parse_dimension(value).and_then(|d| d.to_f64()) {
                    domain.push(json!(["x_ancho", ">=", n]));
                }
            }
            FilterKey::Thickness => {
                if let Some(d) = parse_dimension(value) {
                    let low = (d - thickness_tolerance()).to_f64();
                    let high = (d + thickness_tolerance()).to_f64();
                    if let (Some(low), Some(high)) = (low, high) {
                        domain.push(json!(["x_grosor", ">=", low]));
                        domain.push(json!(["x_grosor", "<=", high]));
                    }
                }
            }
        }
    }

    Value::Array(domain)
}

/// Order fully fetched candidates by block (unknown blocks last), then lot id
pub fn sort_by_block_then_lot(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        let block = match (&a.attributes.block, &b.attributes.block) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        block.then_with(|| a.lot_id.cmp(&b.lot_id))
    });
}

//! Relational field shapes and identifier extraction
//!
//! Depending on the host framework version a relational field can arrive as a
//! bare id, an `[id, label]` pair, a list of ids, or a collection wrapper
//! exposing `currentIds`, `resIds` or `records`. Each shape has its own
//! recognizer; [`RelationalValue::recognize`] tries them in a fixed order and
//! the first match wins.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::diagnostic::Diagnostic;
use super::odoo::{field_decimal, field_id, record_field};
use crate::types::{LotId, RecordId};

/// A relational field value after shape recognition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationalValue {
    /// `null`, `undefined` or `false`
    Empty,
    /// A bare integer id
    Id(RecordId),
    /// A many2one `[id, label]` pair
    IdLabel(RecordId, String),
    /// A plain list of ids
    IdList(Vec<RecordId>),
    /// A collection wrapper exposing `currentIds`
    CurrentIds(Vec<RecordId>),
    /// A collection wrapper exposing `resIds`
    ResIds(Vec<RecordId>),
    /// A collection wrapper exposing child `records`
    Records(Vec<RecordId>),
    /// An object carrying `id` (and usually `display_name`)
    IdObject(RecordId, Option<String>),
    /// Nothing matched; holds a short description of the shape
    Unrecognized(String),
}

type Recognizer = fn(&Value) -> Option<RelationalValue>;

/// Recognizers in priority order
const RECOGNIZERS: &[Recognizer] = &[
    recognize_empty,
    recognize_id,
    recognize_id_label,
    recognize_id_list,
    recognize_current_ids,
    recognize_res_ids,
    recognize_records,
    recognize_id_object,
];

impl RelationalValue {
    pub fn recognize(raw: &Value) -> Self {
        RECOGNIZERS
            .iter()
            .find_map(|recognizer| recognizer(raw))
            .unwrap_or_else(|| RelationalValue::Unrecognized(describe_shape(raw)))
    }

    /// The single `(id, label)` this value points at, if it is a single relation
    pub fn as_many2one(&self) -> Option<(RecordId, String)> {
        match self {
            RelationalValue::Id(id) => Some((*id, String::new())),
            RelationalValue::IdLabel(id, label) => Some((*id, label.clone())),
            RelationalValue::IdObject(id, label) => Some((*id, label.clone().unwrap_or_default())),
            _ => None,
        }
    }
}

/// Result of extracting identifiers from a relational value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub ids: BTreeSet<RecordId>,
    pub diagnostic: Option<Diagnostic>,
}

/// Normalize an already recognized relational value into a set of ids
pub fn extract(value: &RelationalValue) -> Extraction {
    let ids = match value {
        RelationalValue::Empty => BTreeSet::new(),
        RelationalValue::Id(id) | RelationalValue::IdLabel(id, _) | RelationalValue::IdObject(id, _) => {
            BTreeSet::from([*id])
        }
        RelationalValue::IdList(ids)
        | RelationalValue::CurrentIds(ids)
        | RelationalValue::ResIds(ids)
        | RelationalValue::Records(ids) => ids.iter().copied().collect(),
        RelationalValue::Unrecognized(shape) => {
            return Extraction {
                ids: BTreeSet::new(),
                diagnostic: Some(Diagnostic::ExtractionAmbiguity {
                    shape: shape.clone(),
                }),
            }
        }
    };
    Extraction {
        ids,
        diagnostic: None,
    }
}

/// Recognize and extract in one step
pub fn extract_identifiers(raw: &Value) -> Extraction {
    extract(&RelationalValue::recognize(raw))
}

/// Read a many2one field (`[id, label]`, bare id or `{id, display_name}`)
pub fn many2one(raw: &Value) -> Option<(RecordId, String)> {
    RelationalValue::recognize(raw).as_many2one()
}

fn recognize_empty(raw: &Value) -> Option<RelationalValue> {
    match raw {
        Value::Null | Value::Bool(false) => Some(RelationalValue::Empty),
        _ => None,
    }
}

fn recognize_id(raw: &Value) -> Option<RelationalValue> {
    field_id(raw).map(RelationalValue::Id)
}

fn recognize_id_label(raw: &Value) -> Option<RelationalValue> {
    match raw.as_array()?.as_slice() {
        [id, Value::String(label)] => Some(RelationalValue::IdLabel(field_id(id)?, label.clone())),
        _ => None,
    }
}

fn recognize_id_list(raw: &Value) -> Option<RelationalValue> {
    id_list(raw).map(RelationalValue::IdList)
}

fn recognize_current_ids(raw: &Value) -> Option<RelationalValue> {
    lenient_id_list(raw.get("currentIds")?).map(RelationalValue::CurrentIds)
}

fn recognize_res_ids(raw: &Value) -> Option<RelationalValue> {
    lenient_id_list(raw.get("resIds")?).map(RelationalValue::ResIds)
}

fn recognize_records(raw: &Value) -> Option<RelationalValue> {
    let records = raw.get("records")?.as_array()?;
    let ids = records
        .iter()
        .filter_map(|record| {
            field_id(record_field(record, "resId"))
                .or_else(|| field_id(record_field(record_field(record, "data"), "id")))
        })
        .collect();
    Some(RelationalValue::Records(ids))
}

fn recognize_id_object(raw: &Value) -> Option<RelationalValue> {
    let id = field_id(raw.as_object()?.get("id")?)?;
    let label = raw
        .get("display_name")
        .or_else(|| raw.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(RelationalValue::IdObject(id, label))
}

/// Every element must be a positive integer
fn id_list(raw: &Value) -> Option<Vec<RecordId>> {
    raw.as_array()?.iter().map(field_id).collect()
}

/// Collection wrappers may mix in virtual ids for unsaved records; keep the real ones
fn lenient_id_list(raw: &Value) -> Option<Vec<RecordId>> {
    Some(raw.as_array()?.iter().filter_map(field_id).collect())
}

fn describe_shape(raw: &Value) -> String {
    match raw {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool({})", b),
        Value::Number(n) => format!("number({})", n),
        Value::String(_) => "string".to_string(),
        Value::Array(items) => format!("array[{}]", items.len()),
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object{{{}}}", keys.join(","))
        }
    }
}

/// Reference to a child record: saved records have an integer id, unsaved ones a virtual id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildRef {
    Saved(RecordId),
    Virtual(String),
}

/// A child line of the host record (e.g. a move line) as far as selection cares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildLine {
    pub record: ChildRef,
    pub lot: Option<(LotId, String)>,
    pub location: Option<(RecordId, String)>,
    pub quantity: Decimal,
}

impl ChildLine {
    pub fn lot_id(&self) -> Option<LotId> {
        self.lot.as_ref().map(|(id, _)| *id)
    }
}

/// Read child lines out of a `records` collection wrapper.
///
/// Records without any usable reference are dropped; anything that is not a
/// collection wrapper yields no lines.
pub fn child_lines(raw: &Value) -> Vec<ChildLine> {
    let Some(records) = raw.get("records").and_then(Value::as_array) else {
        return Vec::new();
    };

    records
        .iter()
        .filter_map(|record| {
            let data = record_field(record, "data");
            let reference = field_id(record_field(record, "resId"))
                .or_else(|| field_id(record_field(data, "id")))
                .map(ChildRef::Saved)
                .or_else(|| {
                    record
                        .get("virtualId")
                        .or_else(|| record.get("id"))
                        .and_then(Value::as_str)
                        .map(|v| ChildRef::Virtual(v.to_string()))
                })?;

            Some(ChildLine {
                record: reference,
                lot: many2one(record_field(data, "lot_id")),
                location: many2one(record_field(data, "location_id")),
                quantity: field_decimal(record_field(data, "quantity")).unwrap_or(Decimal::ZERO),
            })
        })
        .collect()
}

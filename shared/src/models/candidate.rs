//! Inventory candidates (quants) offered for selection

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::odoo::{field_decimal, field_id, field_str, record_field};
use super::relational::{many2one, ChildLine};
use crate::types::{LotId, RecordId};

/// Errors raised while reading server records
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("record is missing field `{0}`")]
    MissingField(&'static str),

    #[error("expected a list of records, got {0}")]
    NotAList(String),
}

/// Opaque candidate id: a quant id from the server, or a synthetic key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateId {
    Quant(RecordId),
    Synthetic(String),
}

/// Where a candidate's data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    /// Returned by the inventory query
    #[default]
    Server,
    /// Rebuilt from a committed child line of the host record
    Assigned,
    /// Synthesized from a bare lot id; carries no real stock data
    Placeholder,
}

/// Descriptive slab attributes used for filtering and display.
///
/// `None` is the "unknown" sentinel; the server sends `false` for these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoneAttributes {
    pub block: Option<String>,
    pub bundle: Option<String>,
    pub height: Option<Decimal>,
    pub width: Option<Decimal>,
    pub thickness: Option<Decimal>,
    pub kind: Option<String>,
    pub color: Option<String>,
    pub container: Option<String>,
    pub customs_ref: Option<String>,
    pub origin: Option<String>,
    pub details: Option<String>,
}

impl StoneAttributes {
    /// Read attributes from a quant or lot record
    pub fn from_record(record: &Value) -> Self {
        Self {
            block: field_str(record_field(record, "x_bloque")),
            bundle: field_str(record_field(record, "x_atado")),
            height: field_decimal(record_field(record, "x_alto")),
            width: field_decimal(record_field(record, "x_ancho")),
            thickness: field_decimal(record_field(record, "x_grosor")),
            kind: field_str(record_field(record, "x_tipo")),
            color: field_str(record_field(record, "x_color")),
            container: field_str(record_field(record, "x_contenedor")),
            customs_ref: field_str(record_field(record, "x_pedimento")),
            origin: field_str(record_field(record, "x_origen")),
            details: field_str(record_field(record, "x_detalles_placa")),
        }
    }

    /// Area of one slab face in the record's units, when both dimensions are known
    pub fn area(&self) -> Option<Decimal> {
        Some(self.height? * self.width?)
    }
}

/// One queryable inventory unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    /// Selection key; a candidate without a lot cannot be selected
    pub lot_id: Option<LotId>,
    pub lot_label: String,
    pub location_id: Option<RecordId>,
    pub location_label: String,
    pub quantity: Decimal,
    pub reserved_quantity: Decimal,
    #[serde(default)]
    pub attributes: StoneAttributes,
    #[serde(default)]
    pub origin: CandidateOrigin,
}

impl Candidate {
    /// Read a quant record as returned by the inventory query or `search_read`
    pub fn from_quant(record: &Value) -> Result<Self, ParseError> {
        let id = field_id(record_field(record, "id")).ok_or(ParseError::MissingField("id"))?;
        let lot = many2one(record_field(record, "lot_id"));
        let location = many2one(record_field(record, "location_id"));

        Ok(Self {
            id: CandidateId::Quant(id),
            lot_id: lot.as_ref().map(|(id, _)| *id),
            lot_label: lot.map(|(_, label)| label).unwrap_or_default(),
            location_id: location.as_ref().map(|(id, _)| *id),
            location_label: location.map(|(_, label)| label).unwrap_or_default(),
            quantity: field_decimal(record_field(record, "quantity")).unwrap_or(Decimal::ZERO),
            reserved_quantity: field_decimal(record_field(record, "reserved_quantity"))
                .unwrap_or(Decimal::ZERO),
            attributes: StoneAttributes::from_record(record),
            origin: CandidateOrigin::Server,
        })
    }

    /// Read a list of quant records
    pub fn list_from_quants(records: &Value) -> Result<Vec<Self>, ParseError> {
        let records = records
            .as_array()
            .ok_or_else(|| ParseError::NotAList(short_type(records)))?;
        records.iter().map(Self::from_quant).collect()
    }

    /// Minimal candidate for a lot we only know by id
    pub fn placeholder(lot_id: LotId, label: Option<String>) -> Self {
        Self {
            id: CandidateId::Synthetic(format!("assigned_{}", lot_id)),
            lot_id: Some(lot_id),
            lot_label: label.unwrap_or_else(|| format!("#{}", lot_id)),
            location_id: None,
            location_label: String::new(),
            quantity: Decimal::ZERO,
            reserved_quantity: Decimal::ZERO,
            attributes: StoneAttributes::default(),
            origin: CandidateOrigin::Placeholder,
        }
    }

    /// Virtual entry for a lot already linked through a child line
    pub fn from_child_line(line: &ChildLine) -> Option<Self> {
        let (lot_id, lot_label) = line.lot.clone()?;
        Some(Self {
            id: CandidateId::Synthetic(format!("assigned_{}", lot_id)),
            lot_id: Some(lot_id),
            lot_label,
            location_id: line.location.as_ref().map(|(id, _)| *id),
            location_label: line
                .location
                .as_ref()
                .map(|(_, label)| label.clone())
                .unwrap_or_default(),
            quantity: line.quantity,
            reserved_quantity: line.quantity,
            attributes: StoneAttributes::default(),
            origin: CandidateOrigin::Assigned,
        })
    }

    /// Fill label and attributes from a `stock.lot` record
    pub fn enrich_from_lot(&mut self, lot: &Value) {
        if let Some(name) = field_str(record_field(lot, "name")) {
            self.lot_label = name;
        }
        self.attributes = StoneAttributes::from_record(lot);
        if self.origin == CandidateOrigin::Placeholder {
            self.origin = CandidateOrigin::Assigned;
        }
    }

    /// Quantity not yet reserved by other operations
    pub fn available_quantity(&self) -> Decimal {
        (self.quantity - self.reserved_quantity).max(Decimal::ZERO)
    }

    pub fn is_placeholder(&self) -> bool {
        self.origin == CandidateOrigin::Placeholder
    }

    /// Whether only the host record's view of this lot is known, without its
    /// `stock.lot` label and attributes
    pub fn lacks_lot_data(&self) -> bool {
        self.origin != CandidateOrigin::Server && self.attributes == StoneAttributes::default()
    }
}

fn short_type(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

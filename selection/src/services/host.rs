//! Host record access
//!
//! The selector edits one record: a sale order line (lots in the `lot_ids`
//! many2many) or a stock move (lots carried by `move_line_ids` child lines).
//! [`HostRecord`] is the seam to whatever owns that record; [`RemoteHostRecord`]
//! is a headless implementation backed by the remote data service.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use shared::{
    child_lines, extract_identifiers, field_id, many2one, record_field, Candidate, ChildLine,
    Diagnostic, HostLocations, LotId, RecordId,
};
use tokio::sync::RwLock;

use crate::error::{SelectionError, SelectionResult};
use crate::external::RemoteDataService;

/// The record a selection session is attached to
#[async_trait]
pub trait HostRecord: Send + Sync {
    /// Current value of a field; `Value::Null` when the field is unknown
    async fn field(&self, name: &str) -> Value;

    /// Apply a field patch and let the server recompute dependent values
    async fn update(&self, patch: Value) -> SelectionResult<()>;
}

#[async_trait]
impl<T: HostRecord + ?Sized> HostRecord for Arc<T> {
    async fn field(&self, name: &str) -> Value {
        (**self).field(name).await
    }

    async fn update(&self, patch: Value) -> SelectionResult<()> {
        (**self).update(patch).await
    }
}

/// Which kind of record hosts the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// `sale.order.line`: lots in a many2many, replaced wholesale
    SaleOrderLine,
    /// `stock.move`: lots carried by move lines with quantity and locations
    StockMove,
}

impl HostKind {
    pub fn from_model(model: &str) -> Option<Self> {
        match model {
            "sale.order.line" => Some(HostKind::SaleOrderLine),
            "stock.move" => Some(HostKind::StockMove),
            _ => None,
        }
    }

    pub fn model(&self) -> &'static str {
        match self {
            HostKind::SaleOrderLine => "sale.order.line",
            HostKind::StockMove => "stock.move",
        }
    }

    /// Field holding the selected lots
    pub fn selection_field(&self) -> &'static str {
        match self {
            HostKind::SaleOrderLine => "lot_ids",
            HostKind::StockMove => "move_line_ids",
        }
    }

    fn read_fields(&self) -> &'static [&'static str] {
        match self {
            HostKind::SaleOrderLine => &["product_id", "lot_ids"],
            HostKind::StockMove => &[
                "product_id",
                "location_id",
                "location_dest_id",
                "move_line_ids",
            ],
        }
    }
}

/// What the selection needs to know about the host record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostSnapshot {
    pub product_id: Option<RecordId>,
    pub pending: BTreeSet<LotId>,
    pub assigned: BTreeMap<LotId, Candidate>,
    pub lines: Vec<ChildLine>,
    pub locations: HostLocations,
    pub diagnostics: Vec<Diagnostic>,
}

/// Read the committed selection state from a host record
pub async fn read_snapshot<H: HostRecord + ?Sized>(host: &H, kind: HostKind) -> HostSnapshot {
    let mut snapshot = HostSnapshot::default();

    let product = extract_identifiers(&host.field("product_id").await);
    snapshot.product_id = product.ids.iter().next().copied();
    snapshot.diagnostics.extend(product.diagnostic);

    let raw = host.field(kind.selection_field()).await;
    match kind {
        HostKind::SaleOrderLine => {
            let lots = extract_identifiers(&raw);
            snapshot.diagnostics.extend(lots.diagnostic);
            snapshot.assigned = lots
                .ids
                .iter()
                .map(|lot| (*lot, Candidate::placeholder(*lot, lot_label(&raw, *lot))))
                .collect();
            snapshot.pending = lots.ids;
        }
        HostKind::StockMove => {
            snapshot.lines = child_lines(&raw);
            for line in &snapshot.lines {
                if let Some(candidate) = Candidate::from_child_line(line) {
                    if let Some(lot) = candidate.lot_id {
                        snapshot.pending.insert(lot);
                        snapshot.assigned.insert(lot, candidate);
                    }
                }
            }
            snapshot.locations = HostLocations {
                source: many2one(&host.field("location_id").await).map(|(id, _)| id),
                destination: many2one(&host.field("location_dest_id").await).map(|(id, _)| id),
            };
        }
    }

    snapshot
}

/// Display name of a lot inside a many2many `records` wrapper, when present
fn lot_label(raw: &Value, lot: LotId) -> Option<String> {
    raw.get("records")?
        .as_array()?
        .iter()
        .map(|record| record_field(record, "data"))
        .find(|data| field_id(record_field(data, "id")) == Some(lot))
        .and_then(|data| {
            record_field(data, "display_name")
                .as_str()
                .or_else(|| record_field(data, "name").as_str())
        })
        .map(str::to_string)
}

/// Host record read from and written to the server directly
pub struct RemoteHostRecord<S> {
    service: S,
    kind: HostKind,
    id: RecordId,
    data: RwLock<Map<String, Value>>,
}

impl<S: RemoteDataService> RemoteHostRecord<S> {
    /// Read the record once and keep its fields
    pub async fn load(service: S, kind: HostKind, id: RecordId) -> SelectionResult<Self> {
        let host = Self {
            service,
            kind,
            id,
            data: RwLock::new(Map::new()),
        };
        host.reload().await?;
        Ok(host)
    }

    pub fn kind(&self) -> HostKind {
        self.kind
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Re-read the record from the server
    pub async fn reload(&self) -> SelectionResult<()> {
        let mut records = self
            .service
            .read(self.kind.model(), &[self.id], self.kind.read_fields())
            .await?;
        let Some(Value::Object(mut record)) = records.pop() else {
            return Err(SelectionError::Host(format!(
                "{} {} not found",
                self.kind.model(),
                self.id
            )));
        };

        if self.kind == HostKind::StockMove {
            let line_ids: Vec<RecordId> = record
                .get("move_line_ids")
                .and_then(Value::as_array)
                .map(|ids| ids.iter().filter_map(field_id).collect())
                .unwrap_or_default();
            let lines = self
                .service
                .read("stock.move.line", &line_ids, &["lot_id", "location_id", "quantity"])
                .await?;
            record.insert("move_line_ids".to_string(), records_wrapper(lines));
        }

        *self.data.write().await = record;
        Ok(())
    }
}

/// Wrap plain child records the way an editing host exposes them
fn records_wrapper(lines: Vec<Value>) -> Value {
    let records: Vec<Value> = lines
        .into_iter()
        .map(|line| json!({ "resId": record_field(&line, "id"), "data": line }))
        .collect();
    json!({ "records": records })
}

#[async_trait]
impl<S: RemoteDataService> HostRecord for RemoteHostRecord<S> {
    async fn field(&self, name: &str) -> Value {
        self.data.read().await.get(name).cloned().unwrap_or(Value::Null)
    }

    async fn update(&self, patch: Value) -> SelectionResult<()> {
        tracing::debug!("Writing {} {}: {}", self.kind.model(), self.id, patch);
        let written = self
            .service
            .call(self.kind.model(), "write", json!([[self.id], patch]), json!({}))
            .await
            .map_err(|err| SelectionError::Host(err.user_message()))?;

        if written == Value::Bool(false) {
            return Err(SelectionError::Host(format!(
                "{} {} rejected the update",
                self.kind.model(),
                self.id
            )));
        }
        self.reload().await
    }
}

//! Translation of selection changes into host record mutations
//!
//! Two host shapes exist. A sale order line keeps its lots in a many2many and
//! takes an idempotent replace-all command. A stock move keeps them as child
//! move lines carrying quantity and locations, so a selection change becomes a
//! batch of create/delete mutations against those lines.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};

use super::candidate::Candidate;
use super::diagnostic::Diagnostic;
use super::relational::{ChildLine, ChildRef};
use crate::types::{LotId, RecordId};

/// x2many command codes understood by the host record
const CMD_CREATE: i64 = 0;
const CMD_DELETE: i64 = 2;
const CMD_SET: i64 = 6;

/// Mutation of a many2many child collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "ids", rename_all = "snake_case")]
pub enum Command {
    /// Replace the collection with exactly these ids
    ReplaceAll(Vec<RecordId>),
}

impl Command {
    /// Wire form: a list of x2many commands
    pub fn to_value(&self) -> Value {
        match self {
            Command::ReplaceAll(ids) => json!([[CMD_SET, 0, ids]]),
        }
    }

    /// Field patch applying this command to `field`
    pub fn patch(&self, field: &str) -> Value {
        field_patch(field, self.to_value())
    }
}

/// Build the replace-all command for a selection change.
///
/// Returns `None` when the selection did not change, so nothing needs sending.
pub fn build_command(previous: &BTreeSet<LotId>, next: &BTreeSet<LotId>) -> Option<Command> {
    if previous == next {
        return None;
    }
    Some(Command::ReplaceAll(next.iter().copied().collect()))
}

/// Values for a new move line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveLineValues {
    pub lot_id: LotId,
    pub quantity: Decimal,
    pub location_id: Option<RecordId>,
    pub location_dest_id: Option<RecordId>,
}

/// Source and destination locations of the host record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostLocations {
    pub source: Option<RecordId>,
    pub destination: Option<RecordId>,
}

/// Mutation of a one2many child collection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum ChildMutation {
    Create(MoveLineValues),
    Delete(ChildRef),
}

impl ChildMutation {
    pub fn to_value(&self) -> Value {
        match self {
            ChildMutation::Create(values) => json!([
                CMD_CREATE,
                0,
                {
                    "lot_id": values.lot_id,
                    "quantity": values.quantity.to_f64().unwrap_or(0.0),
                    "location_id": values.location_id.map_or(Value::Bool(false), Value::from),
                    "location_dest_id": values.location_dest_id.map_or(Value::Bool(false), Value::from),
                }
            ]),
            ChildMutation::Delete(reference) => json!([CMD_DELETE, reference, 0]),
        }
    }

    /// Field patch applying a batch of mutations to `field` in one update
    pub fn batch_patch(field: &str, mutations: &[ChildMutation]) -> Value {
        let commands: Vec<Value> = mutations.iter().map(ChildMutation::to_value).collect();
        field_patch(field, Value::Array(commands))
    }
}

fn field_patch(field: &str, value: Value) -> Value {
    let mut patch = serde_json::Map::new();
    patch.insert(field.to_string(), value);
    Value::Object(patch)
}

/// Mutations for a selection change plus the lots that had to be skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandPlan {
    pub mutations: Vec<ChildMutation>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CommandPlan {
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Lots that were requested but could not be created
    pub fn skipped_lots(&self) -> Vec<LotId> {
        self.diagnostics
            .iter()
            .filter_map(|d| match d {
                Diagnostic::CommandBuild { lot_id, .. } => Some(*lot_id),
                _ => None,
            })
            .collect()
    }
}

/// Diff the current child lines against the desired lot set.
///
/// Every line whose lot left the selection is deleted; every newly selected lot
/// gets a create carrying the candidate's quantity and location, falling back
/// to the host's source location. A new lot without real candidate data is
/// skipped and reported rather than created with a made-up quantity.
pub fn diff_commands(
    previous: &[ChildLine],
    next: &BTreeSet<LotId>,
    candidates: &BTreeMap<LotId, Candidate>,
    locations: &HostLocations,
) -> CommandPlan {
    let mut plan = CommandPlan::default();

    let linked: BTreeSet<LotId> = previous.iter().filter_map(ChildLine::lot_id).collect();

    for line in previous {
        if let Some(lot_id) = line.lot_id() {
            if !next.contains(&lot_id) {
                plan.mutations.push(ChildMutation::Delete(line.record.clone()));
            }
        }
    }

    for lot_id in next.difference(&linked) {
        match candidates.get(lot_id) {
            Some(candidate) if !candidate.is_placeholder() => {
                plan.mutations.push(ChildMutation::Create(MoveLineValues {
                    lot_id: *lot_id,
                    quantity: candidate.quantity,
                    location_id: candidate.location_id.or(locations.source),
                    location_dest_id: locations.destination,
                }));
            }
            Some(_) => plan.diagnostics.push(Diagnostic::CommandBuild {
                lot_id: *lot_id,
                reason: "only a placeholder is known for this lot".to_string(),
            }),
            None => plan.diagnostics.push(Diagnostic::CommandBuild {
                lot_id: *lot_id,
                reason: "no matching candidate".to_string(),
            }),
        }
    }

    plan
}

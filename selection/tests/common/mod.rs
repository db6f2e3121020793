//! Test doubles for the remote data service and the host record

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use shared::{FilterSet, RecordId};
use stone_selection::config::SelectionConfig;
use stone_selection::external::RemoteDataService;
use stone_selection::services::{HostKind, HostRecord, InventoryQueryClient, SelectionSession};
use stone_selection::{SelectionError, SelectionResult};

pub const QUERY_METHOD: &str = "search_stone_inventory_for_so";

/// Quant record as the server sends it
pub fn quant(id: i64, lot: i64, block: Option<&str>, quantity: f64) -> Value {
    json!({
        "id": id,
        "lot_id": [lot, format!("LOT-{:03}", lot)],
        "location_id": [8, "WH/Stock"],
        "quantity": quantity,
        "reserved_quantity": 0.0,
        "x_bloque": block.map_or(Value::Bool(false), Value::from),
        "x_atado": false,
        "x_alto": 180.0,
        "x_ancho": 90.0,
        "x_grosor": 2.0,
    })
}

/// `count` quants with lots starting at `first_lot`
pub fn quants(first_lot: i64, count: i64) -> Vec<Value> {
    (first_lot..first_lot + count)
        .map(|lot| quant(lot * 10, lot, Some("B-01"), 2.5))
        .collect()
}

pub fn page(items: Vec<Value>, total: u64) -> Value {
    json!({ "items": items, "total": total })
}

/// Scripted answer of the paginated inventory method
pub struct Reply {
    delay: Duration,
    result: Result<Value, String>,
}

impl Reply {
    pub fn ok(value: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(value),
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(message.to_string()),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A remote call as the fake saw it
#[derive(Debug, Clone)]
pub struct Call {
    pub model: String,
    pub method: String,
    pub args: Value,
    pub kwargs: Value,
}

/// In-memory remote data service
#[derive(Default)]
pub struct FakeRemote {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
    /// Quants returned by `search_read`
    pub quants: Vec<Value>,
    /// `stock.lot` records returned by `read`
    pub lots: Vec<Value>,
    /// When set the paginated method reports itself missing
    pub without_paginated_method: bool,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        let fake = Self::new();
        fake.replies.lock().unwrap().extend(replies);
        fake
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls made to the paginated inventory method
    pub fn query_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == QUERY_METHOD)
            .collect()
    }

    fn record(&self, model: &str, method: &str, args: Value, kwargs: Value) {
        self.calls.lock().unwrap().push(Call {
            model: model.to_string(),
            method: method.to_string(),
            args,
            kwargs,
        });
    }
}

#[async_trait]
impl RemoteDataService for FakeRemote {
    async fn search_read(
        &self,
        model: &str,
        domain: Value,
        fields: &[&str],
    ) -> SelectionResult<Vec<Value>> {
        self.record(model, "search_read", domain, json!({ "fields": fields }));
        Ok(self.quants.clone())
    }

    async fn call(
        &self,
        model: &str,
        method: &str,
        args: Value,
        kwargs: Value,
    ) -> SelectionResult<Value> {
        self.record(model, method, args, kwargs);
        if self.without_paginated_method {
            return Err(SelectionError::NotImplemented(format!("{}.{}", model, method)));
        }

        let reply = self.replies.lock().unwrap().pop_front();
        let Some(reply) = reply else {
            return Ok(page(Vec::new(), 0));
        };
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result.map_err(SelectionError::Query)
    }

    async fn read(
        &self,
        model: &str,
        ids: &[RecordId],
        fields: &[&str],
    ) -> SelectionResult<Vec<Value>> {
        self.record(model, "read", json!(ids), json!({ "fields": fields }));
        Ok(self
            .lots
            .iter()
            .filter(|lot| lot["id"].as_i64().is_some_and(|id| ids.contains(&id)))
            .cloned()
            .collect())
    }
}

/// Host record that applies x2many commands to its own fields
#[derive(Default)]
pub struct FakeHost {
    fields: Mutex<Map<String, Value>>,
    patches: Mutex<Vec<Value>>,
    failure: Mutex<Option<String>>,
    next_virtual: Mutex<u32>,
}

impl FakeHost {
    pub fn sale_line(product: Option<i64>, lots: &[i64]) -> Self {
        let host = Self::default();
        host.set("product_id", product.map_or(json!(false), |id| json!([id, "Marble"])));
        host.set("lot_ids", json!(lots));
        host
    }

    /// Stock move whose move lines are `(line id, lot, quantity)`
    pub fn stock_move(product: i64, lines: &[(i64, i64, f64)]) -> Self {
        let host = Self::default();
        host.set("product_id", json!([product, "Marble"]));
        host.set("location_id", json!([8, "WH/Stock"]));
        host.set("location_dest_id", json!([5, "Partners/Customers"]));
        let records: Vec<Value> = lines
            .iter()
            .map(|(id, lot, quantity)| {
                json!({
                    "resId": id,
                    "data": {
                        "id": id,
                        "lot_id": [lot, format!("LOT-{:03}", lot)],
                        "location_id": [8, "WH/Stock"],
                        "quantity": quantity,
                    }
                })
            })
            .collect();
        host.set("move_line_ids", json!({ "records": records }));
        host
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.lock().unwrap().insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Value {
        self.fields
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn fail_updates(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn patches(&self) -> Vec<Value> {
        self.patches.lock().unwrap().clone()
    }

    fn apply(&self, field: &str, commands: &[Value]) {
        let mut fields = self.fields.lock().unwrap();
        for command in commands {
            let code = command[0].as_i64().unwrap();
            match code {
                6 => {
                    fields.insert(field.to_string(), command[2].clone());
                }
                0 => {
                    let mut next = self.next_virtual.lock().unwrap();
                    *next += 1;
                    let values = &command[2];
                    let lot = values["lot_id"].as_i64().unwrap();
                    let record = json!({
                        "virtualId": format!("virtual_{}", *next),
                        "data": {
                            "lot_id": [lot, format!("LOT-{:03}", lot)],
                            "location_id": [values["location_id"].clone(), "WH/Stock"],
                            "quantity": values["quantity"].clone(),
                        }
                    });
                    records_mut(&mut fields, field).push(record);
                }
                2 => {
                    let target = command[1].clone();
                    records_mut(&mut fields, field)
                        .retain(|r| r["resId"] != target && r["virtualId"] != target);
                }
                other => panic!("unexpected command {}", other),
            }
        }
    }
}

fn records_mut<'a>(fields: &'a mut Map<String, Value>, field: &str) -> &'a mut Vec<Value> {
    fields
        .entry(field.to_string())
        .or_insert_with(|| json!({ "records": [] }))["records"]
        .as_array_mut()
        .unwrap()
}

#[async_trait]
impl HostRecord for FakeHost {
    async fn field(&self, name: &str) -> Value {
        self.get(name)
    }

    async fn update(&self, patch: Value) -> SelectionResult<()> {
        self.patches.lock().unwrap().push(patch.clone());
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(SelectionError::Host(message));
        }
        for (field, commands) in patch.as_object().unwrap() {
            self.apply(field, commands.as_array().unwrap());
        }
        Ok(())
    }
}

pub type TestSession = SelectionSession<Arc<FakeRemote>, Arc<FakeHost>>;

pub fn config(page_size: u32) -> SelectionConfig {
    SelectionConfig {
        page_size,
        ..SelectionConfig::default()
    }
}

pub fn session(
    remote: &Arc<FakeRemote>,
    host: &Arc<FakeHost>,
    kind: HostKind,
    page_size: u32,
) -> TestSession {
    let config = config(page_size);
    let query = InventoryQueryClient::new(remote.clone(), &config);
    SelectionSession::new(query, host.clone(), kind, &config, FilterSet::new())
}

/// Let spawned tasks run to completion on the current-thread runtime
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

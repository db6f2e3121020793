//! Inventory query client
//!
//! Fetches one page of candidates for a product. The paginated server method
//! takes `{product_id, filters, current_lot_ids, page, page_size}` and answers
//! either `{items, total}` or a bare list. When the method does not exist the
//! client falls back to `search_read` on quants and slices locally, and keeps
//! doing so for the rest of its life.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{json, Map, Value};
use shared::{
    build_quant_domain, sort_by_block_then_lot, Candidate, FilterSet, LotId, Page, Pagination,
    RecordId, LOT_FIELDS, QUANT_FIELDS,
};

use crate::config::SelectionConfig;
use crate::error::{SelectionError, SelectionResult};
use crate::external::RemoteDataService;

/// Model read for lot enrichment
const LOT_MODEL: &str = "stock.lot";

/// Query client over a remote data service
pub struct InventoryQueryClient<S> {
    service: S,
    model: String,
    method: String,
    full_fetch: AtomicBool,
}

impl<S: RemoteDataService> InventoryQueryClient<S> {
    pub fn new(service: S, config: &SelectionConfig) -> Self {
        Self {
            service,
            model: config.query_model.clone(),
            method: config.query_method.clone(),
            full_fetch: AtomicBool::new(false),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Whether the paginated method was found missing
    pub fn uses_full_fetch(&self) -> bool {
        self.full_fetch.load(Ordering::Relaxed)
    }

    /// Fetch one page of candidates.
    ///
    /// `pending` is passed through so the server may include reserved rows for
    /// lots already chosen; nothing relies on it being honoured.
    pub async fn fetch_page(
        &self,
        product_id: RecordId,
        filters: &FilterSet,
        pending: &BTreeSet<LotId>,
        pagination: Pagination,
    ) -> SelectionResult<Page<Candidate>> {
        if !self.uses_full_fetch() {
            match self
                .fetch_paginated(product_id, filters, pending, pagination)
                .await
            {
                Err(err) if err.is_not_implemented() => {
                    tracing::warn!(
                        "{}.{} unavailable, falling back to full fetch",
                        self.model,
                        self.method
                    );
                    self.full_fetch.store(true, Ordering::Relaxed);
                }
                other => return other,
            }
        }

        self.fetch_all(product_id, filters, pagination).await
    }

    async fn fetch_paginated(
        &self,
        product_id: RecordId,
        filters: &FilterSet,
        pending: &BTreeSet<LotId>,
        pagination: Pagination,
    ) -> SelectionResult<Page<Candidate>> {
        let kwargs = query_kwargs(product_id, filters, pending, pagination);
        let response = self
            .service
            .call(&self.model, &self.method, json!([]), kwargs)
            .await?;

        parse_response(response, pagination)
    }

    async fn fetch_all(
        &self,
        product_id: RecordId,
        filters: &FilterSet,
        pagination: Pagination,
    ) -> SelectionResult<Page<Candidate>> {
        let domain = build_quant_domain(product_id, filters);
        let records = self
            .service
            .search_read(&self.model, domain, QUANT_FIELDS)
            .await?;

        let mut candidates = records
            .iter()
            .map(Candidate::from_quant)
            .collect::<Result<Vec<_>, _>>()?;
        sort_by_block_then_lot(&mut candidates);

        Ok(Page {
            items: pagination.slice(&candidates),
            total: candidates.len() as u64,
        })
    }

    /// Read `stock.lot` records for the given lots
    pub async fn read_lots(&self, lots: &[LotId]) -> SelectionResult<Vec<Value>> {
        self.service.read(LOT_MODEL, lots, LOT_FIELDS).await
    }
}

/// Keyword arguments of the paginated inventory method
pub fn query_kwargs(
    product_id: RecordId,
    filters: &FilterSet,
    pending: &BTreeSet<LotId>,
    pagination: Pagination,
) -> Value {
    let active: Map<String, Value> = filters
        .active()
        .map(|(key, value)| (key.as_str().to_string(), Value::String(value.to_string())))
        .collect();

    json!({
        "product_id": product_id,
        "filters": active,
        "current_lot_ids": pending.iter().collect::<Vec<_>>(),
        "page": pagination.page,
        "page_size": pagination.page_size,
    })
}

/// Decode the paginated method's answer.
///
/// A bare list is taken to be the complete result and is sliced to the
/// requested page.
fn parse_response(response: Value, pagination: Pagination) -> SelectionResult<Page<Candidate>> {
    match response {
        Value::Array(_) => {
            let candidates = Candidate::list_from_quants(&response)?;
            Ok(Page {
                items: pagination.slice(&candidates),
                total: candidates.len() as u64,
            })
        }
        Value::Object(mut body) => {
            let items = body.remove("items").unwrap_or(Value::Array(Vec::new()));
            let items = Candidate::list_from_quants(&items)?;
            let total = body
                .get("total")
                .and_then(Value::as_u64)
                .unwrap_or(items.len() as u64);
            Ok(Page { items, total })
        }
        Value::Null | Value::Bool(false) => Ok(Page::empty()),
        other => Err(SelectionError::Query(format!(
            "unexpected inventory response: {}",
            other
        ))),
    }
}

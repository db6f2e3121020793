//! Selection session: the widget controller
//!
//! A [`SelectionSession`] lives from attach to detach of one host record. It
//! drives the data flow filter input → debounce → query → reconcile → group,
//! and commits toggles to the host record straight away. Nothing here returns
//! an error to the caller; failures come back as outcome values and as the
//! list's load state.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use shared::{
    build_command, diff_commands, field_id, group_candidates, record_field, validate_filters,
    ApplyOutcome, Candidate, CandidateGroup, ChildLine, ChildMutation, Diagnostic, FetchTicket,
    FilterKey, FilterSet, HostLocations, LoadState, LotId, Page, RecordId, SelectionReconciler,
    ToggleOutcome,
};
use tokio::sync::Mutex;

use super::debounce::FilterDebouncer;
use super::host::{read_snapshot, HostKind, HostRecord};
use super::query::InventoryQueryClient;
use crate::config::SelectionConfig;
use crate::error::{SelectionError, SelectionResult};
use crate::external::RemoteDataService;

/// Result of a fetch attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// The page was applied to the visible list
    Loaded,
    /// A newer request superseded this one; its result was dropped
    Stale,
    /// The query failed; the list shows an error and keeps its items
    Failed(String),
    /// No request was issued
    Skipped,
}

/// Result of a toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// The host record accepted the change
    Committed { toggle: ToggleOutcome },
    /// The selection did not change (no lot, or nothing to send)
    Unchanged,
    /// The change could not be sent or was rejected; the toggle was undone
    Reverted {
        toggle: ToggleOutcome,
        message: String,
    },
}

/// Render-ready state of the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionView {
    pub groups: Vec<CandidateGroup>,
    pub selected_count: usize,
    pub selected_total_quantity: Decimal,
    pub loaded: u64,
    pub total: u64,
    pub has_more: bool,
    pub state: LoadState,
    pub filters: FilterSet,
}

struct SessionState {
    reconciler: SelectionReconciler,
    debouncer: FilterDebouncer,
    product_id: Option<RecordId>,
    lines: Vec<ChildLine>,
    locations: HostLocations,
}

struct Inner<S, H> {
    query: InventoryQueryClient<S>,
    host: H,
    kind: HostKind,
    state: Mutex<SessionState>,
}

/// Selection controller for one host record
pub struct SelectionSession<S, H> {
    inner: Arc<Inner<S, H>>,
}

impl<S, H> Clone for SelectionSession<S, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, H> SelectionSession<S, H>
where
    S: RemoteDataService + 'static,
    H: HostRecord + 'static,
{
    pub fn new(
        query: InventoryQueryClient<S>,
        host: H,
        kind: HostKind,
        config: &SelectionConfig,
        filters: FilterSet,
    ) -> Self {
        if let Err(err) = validate_filters(&filters) {
            tracing::warn!("Initial filter ignored by the query: {}", err);
        }

        let state = SessionState {
            reconciler: SelectionReconciler::new(config.page_size),
            debouncer: FilterDebouncer::new(config.debounce(), filters),
            product_id: None,
            lines: Vec::new(),
            locations: HostLocations::default(),
        };

        Self {
            inner: Arc::new(Inner {
                query,
                host,
                kind,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    pub fn query(&self) -> &InventoryQueryClient<S> {
        &self.inner.query
    }

    /// Read the host record and load the first page
    pub async fn attach(&self) -> FetchOutcome {
        tracing::info!("Attaching to {}", self.inner.kind.model());
        self.inner.sync_host().await;
        self.inner.refresh().await
    }

    /// Reload from page zero with the current filters
    pub async fn refresh(&self) -> FetchOutcome {
        self.inner.refresh().await
    }

    /// Load the next page unless a fetch is running or everything is loaded
    pub async fn load_more(&self) -> FetchOutcome {
        self.inner.load_more().await
    }

    /// Re-run the request that failed last
    pub async fn retry(&self) -> FetchOutcome {
        let request = {
            let mut state = self.inner.state.lock().await;
            match state.reconciler.retry() {
                Some(ticket) => state.request(ticket),
                None => return FetchOutcome::Skipped,
            }
        };
        self.inner.run(request).await
    }

    /// Update one filter and schedule a debounced reload
    pub async fn on_filter_input(&self, key: FilterKey, value: impl Into<String>) {
        let value = value.into();
        tracing::debug!("Filter {} = {:?}", key, value);

        let weak = Arc::downgrade(&self.inner);
        let mut state = self.inner.state.lock().await;
        state
            .debouncer
            .on_filter_input(key, value, move |_filters| debounced_refresh(weak));
    }

    /// Clear every filter and schedule a debounced reload
    pub async fn clear_filters(&self) {
        let weak = Arc::downgrade(&self.inner);
        let mut state = self.inner.state.lock().await;
        state
            .debouncer
            .clear_filters(move |_filters| debounced_refresh(weak));
    }

    /// Select or deselect the candidate's lot and commit it to the host
    pub async fn toggle(&self, candidate: &Candidate) -> CommitOutcome {
        self.inner.toggle(candidate).await
    }

    /// Toggle a lot by id, using whatever candidate data is loaded for it
    pub async fn toggle_lot(&self, lot: LotId) -> CommitOutcome {
        let candidate = {
            let state = self.inner.state.lock().await;
            state.reconciler.candidate_for(lot)
        };
        let candidate = candidate.unwrap_or_else(|| Candidate::placeholder(lot, None));
        self.inner.toggle(&candidate).await
    }

    /// React to the host record changing underneath the session.
    ///
    /// A product switch drops everything in flight and reloads; otherwise only
    /// the committed selection is re-read.
    pub async fn on_host_changed(&self) -> FetchOutcome {
        let previous = self.inner.state.lock().await.product_id;
        self.inner.sync_host().await;

        let (current, state) = {
            let mut state = self.inner.state.lock().await;
            if state.product_id != previous {
                state.reconciler.clear_results();
            }
            (state.product_id, state.reconciler.state().clone())
        };

        if current != previous {
            tracing::info!("Product changed from {:?} to {:?}", previous, current);
        }
        if current != previous || state == LoadState::Idle {
            self.inner.refresh().await
        } else {
            FetchOutcome::Skipped
        }
    }

    /// Stop the timer and drop the results of anything still in flight
    pub async fn detach(&self) {
        let mut state = self.inner.state.lock().await;
        state.debouncer.cancel();
        state.reconciler.invalidate();
        tracing::info!("Detached from {}", self.inner.kind.model());
    }

    /// Snapshot for rendering
    pub async fn view(&self) -> SelectionView {
        let state = self.inner.state.lock().await;
        let reconciler = &state.reconciler;
        let candidates = reconciler.candidates();

        SelectionView {
            groups: group_candidates(&candidates, reconciler.pending()),
            selected_count: reconciler.selected_count(),
            selected_total_quantity: reconciler.selected_total_quantity(),
            loaded: reconciler.loaded_count(),
            total: reconciler.total(),
            has_more: reconciler.has_more(),
            state: reconciler.state().clone(),
            filters: state.debouncer.filters().clone(),
        }
    }

    /// Merged candidate list, selected lots the server left out first
    pub async fn candidates(&self) -> Vec<Candidate> {
        self.inner.state.lock().await.reconciler.candidates()
    }

    pub async fn pending(&self) -> Vec<LotId> {
        let state = self.inner.state.lock().await;
        state.reconciler.pending().iter().copied().collect()
    }

    pub async fn load_state(&self) -> LoadState {
        self.inner.state.lock().await.reconciler.state().clone()
    }

    /// Load every remaining page; used by headless callers
    pub async fn load_all(&self) -> SelectionResult<Page<Candidate>> {
        loop {
            match self.load_more().await {
                FetchOutcome::Loaded => continue,
                FetchOutcome::Failed(message) => return Err(SelectionError::Query(message)),
                FetchOutcome::Stale | FetchOutcome::Skipped => break,
            }
        }

        let state = self.inner.state.lock().await;
        Ok(Page {
            items: state.reconciler.candidates(),
            total: state.reconciler.total(),
        })
    }
}

async fn debounced_refresh<S, H>(weak: Weak<Inner<S, H>>)
where
    S: RemoteDataService + 'static,
    H: HostRecord + 'static,
{
    if let Some(inner) = weak.upgrade() {
        inner.refresh().await;
    }
}

/// Everything a fetch needs, captured under the lock
struct Request {
    ticket: FetchTicket,
    product_id: RecordId,
    filters: FilterSet,
    pending: BTreeSet<LotId>,
}

impl SessionState {
    fn request(&self, ticket: FetchTicket) -> Request {
        Request {
            ticket,
            // Tickets are only issued while a product is set
            product_id: self.product_id.unwrap_or_default(),
            filters: self.debouncer.filters().clone(),
            pending: self.reconciler.pending().clone(),
        }
    }
}

impl<S, H> Inner<S, H>
where
    S: RemoteDataService + 'static,
    H: HostRecord + 'static,
{
    async fn sync_host(&self) {
        let snapshot = read_snapshot(&self.host, self.kind).await;
        for diagnostic in &snapshot.diagnostics {
            tracing::warn!("{}", diagnostic);
        }

        let mut state = self.state.lock().await;
        state.product_id = snapshot.product_id;
        state.lines = snapshot.lines;
        state.locations = snapshot.locations;
        state
            .reconciler
            .sync_from_host(snapshot.pending, snapshot.assigned);
    }

    async fn refresh(&self) -> FetchOutcome {
        let request = {
            let mut state = self.state.lock().await;
            if state.product_id.is_none() {
                state.reconciler.settle_empty();
                return FetchOutcome::Skipped;
            }
            let ticket = state.reconciler.request_reset();
            state.request(ticket)
        };
        self.run(request).await
    }

    async fn load_more(&self) -> FetchOutcome {
        let request = {
            let mut state = self.state.lock().await;
            if state.product_id.is_none() {
                return FetchOutcome::Skipped;
            }
            match state.reconciler.request_next_page() {
                Some(ticket) => state.request(ticket),
                None => return FetchOutcome::Skipped,
            }
        };
        self.run(request).await
    }

    async fn run(&self, request: Request) -> FetchOutcome {
        let ticket = request.ticket;
        tracing::debug!(
            "Fetch #{} for product {} (page {})",
            ticket.sequence,
            request.product_id,
            ticket.pagination.page
        );

        let result = self
            .query
            .fetch_page(
                request.product_id,
                &request.filters,
                &request.pending,
                ticket.pagination,
            )
            .await;

        let (applied, outcome) = {
            let mut state = self.state.lock().await;
            match result {
                Ok(page) => {
                    let received = page.items.len();
                    let applied = state.reconciler.apply_page(ticket, page);
                    if applied == ApplyOutcome::Applied {
                        tracing::debug!("Fetch #{} applied ({} items)", ticket.sequence, received);
                    }
                    (applied, FetchOutcome::Loaded)
                }
                Err(err) => {
                    let message = err.user_message();
                    let applied = state.reconciler.apply_failure(ticket, message.clone());
                    if applied == ApplyOutcome::Applied {
                        tracing::error!("Fetch #{} failed: {}", ticket.sequence, message);
                    }
                    (applied, FetchOutcome::Failed(message))
                }
            }
        };

        match applied {
            ApplyOutcome::Applied => {
                if outcome == FetchOutcome::Loaded {
                    self.enrich_missing_lots().await;
                }
                outcome
            }
            ApplyOutcome::Stale(diagnostic) => {
                tracing::debug!("{}", diagnostic);
                FetchOutcome::Stale
            }
        }
    }

    /// Fill selected lots the server left out with `stock.lot` label and attributes
    async fn enrich_missing_lots(&self) {
        let lots = self.state.lock().await.reconciler.lots_missing_data();
        if lots.is_empty() {
            return;
        }

        let records = match self.query.read_lots(&lots).await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!("Could not read lots {:?}: {}", lots, err);
                return;
            }
        };

        let mut state = self.state.lock().await;
        for record in &records {
            let Some(lot) = field_id(record_field(record, "id")) else {
                continue;
            };
            let mut candidate = state
                .reconciler
                .candidate_for(lot)
                .unwrap_or_else(|| Candidate::placeholder(lot, None));
            if candidate.lacks_lot_data() {
                candidate.enrich_from_lot(record);
                state.reconciler.enrich_assigned(candidate);
            }
        }
    }

    async fn toggle(&self, candidate: &Candidate) -> CommitOutcome {
        let (toggle, patch) = {
            let mut state = self.state.lock().await;
            let previous = state.reconciler.pending().clone();
            let toggle = state.reconciler.toggle(candidate);
            if toggle == ToggleOutcome::Ignored {
                return CommitOutcome::Unchanged;
            }

            match self.build_patch(&state, &previous) {
                Ok(Some(patch)) => (toggle, patch),
                Ok(None) => {
                    state.reconciler.revert(toggle, candidate);
                    return CommitOutcome::Unchanged;
                }
                Err(diagnostics) => {
                    state.reconciler.revert(toggle, candidate);
                    let message = diagnostics
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; ");
                    tracing::warn!("Toggle not committed: {}", message);
                    return CommitOutcome::Reverted { toggle, message };
                }
            }
        };

        match self.host.update(patch).await {
            Ok(()) => {
                tracing::info!("Committed {:?}", toggle);
                self.sync_host().await;
                CommitOutcome::Committed { toggle }
            }
            Err(err) => {
                let message = err.user_message();
                tracing::error!("Host update failed, reverting {:?}: {}", toggle, message);
                self.state.lock().await.reconciler.revert(toggle, candidate);
                CommitOutcome::Reverted { toggle, message }
            }
        }
    }

    /// Field patch taking the host from `previous` to the current pending set.
    ///
    /// Fails with the diagnostics when none of the requested changes can be
    /// expressed as a mutation.
    fn build_patch(
        &self,
        state: &SessionState,
        previous: &BTreeSet<LotId>,
    ) -> Result<Option<Value>, Vec<Diagnostic>> {
        let next = state.reconciler.pending();
        let field = self.kind.selection_field();

        match self.kind {
            HostKind::SaleOrderLine => Ok(build_command(previous, next).map(|c| c.patch(field))),
            HostKind::StockMove => {
                let plan = diff_commands(
                    &state.lines,
                    next,
                    &state.reconciler.candidates_by_lot(),
                    &state.locations,
                );
                for diagnostic in &plan.diagnostics {
                    tracing::warn!("{}", diagnostic);
                }
                if plan.is_empty() {
                    if plan.diagnostics.is_empty() {
                        return Ok(None);
                    }
                    return Err(plan.diagnostics);
                }
                Ok(Some(ChildMutation::batch_patch(field, &plan.mutations)))
            }
        }
    }
}

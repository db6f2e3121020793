//! Selection reconciliation
//!
//! [`SelectionReconciler`] owns the per-session selection state: the pending
//! lot ids, the assigned entries rebuilt from the host record, the candidate
//! pages loaded so far and the load status. It performs no I/O; callers ask it
//! for a [`FetchTicket`], run the query, and hand the result back. Every ticket
//! carries a sequence number and only the most recently issued one may change
//! visible state.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rust_decimal::Decimal;
use serde::Serialize;

use super::candidate::Candidate;
use super::diagnostic::Diagnostic;
use crate::types::{has_more, LotId, Page, Pagination, DEFAULT_PAGE_SIZE};

/// Load status of the candidate list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    /// The last fetch failed; previous items are kept
    Error(String),
}

/// Permission to run one fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub sequence: u64,
    pub pagination: Pagination,
}

impl FetchTicket {
    /// Page zero replaces the loaded items; later pages append
    pub fn is_reset(&self) -> bool {
        self.pagination.page == 0
    }
}

/// What happened to a fetch result handed back to the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Stale(Diagnostic),
}

/// Effect of a toggle on the pending set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "lot_id", rename_all = "snake_case")]
pub enum ToggleOutcome {
    Selected(LotId),
    Deselected(LotId),
    /// The candidate has no lot and cannot be selected
    Ignored,
}

/// Merge server items with pending lots that the server did not return.
///
/// Pending lots missing from `server_items` are injected at the front, using
/// the assigned entry when one exists and a placeholder otherwise. Server
/// items keep their relative order; the output never repeats a lot id.
pub fn merge(
    server_items: &[Candidate],
    pending: &BTreeSet<LotId>,
    assigned: &BTreeMap<LotId, Candidate>,
) -> Vec<Candidate> {
    let mut seen: HashSet<LotId> = HashSet::with_capacity(server_items.len());
    let server: Vec<Candidate> = server_items
        .iter()
        .filter(|c| match c.lot_id {
            Some(lot) => seen.insert(lot),
            None => true,
        })
        .cloned()
        .collect();

    let mut merged: Vec<Candidate> = pending
        .iter()
        .filter(|lot| !seen.contains(*lot))
        .map(|lot| {
            let mut entry = assigned
                .get(lot)
                .cloned()
                .unwrap_or_else(|| Candidate::placeholder(*lot, None));
            entry.lot_id = Some(*lot);
            entry
        })
        .collect();

    merged.extend(server);
    merged
}

/// Per-session selection state machine
#[derive(Debug, Clone)]
pub struct SelectionReconciler {
    pending: BTreeSet<LotId>,
    assigned: BTreeMap<LotId, Candidate>,
    items: Vec<Candidate>,
    state: LoadState,
    page_size: u32,
    next_page: u32,
    total: u64,
    loaded: u64,
    issued: u64,
    last_ticket: Option<FetchTicket>,
}

impl Default for SelectionReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl SelectionReconciler {
    pub fn new(page_size: u32) -> Self {
        Self {
            pending: BTreeSet::new(),
            assigned: BTreeMap::new(),
            items: Vec::new(),
            state: LoadState::Idle,
            page_size: page_size.max(1),
            next_page: 0,
            total: 0,
            loaded: 0,
            issued: 0,
            last_ticket: None,
        }
    }

    // ------------------------------------------------------------------
    // Fetch bookkeeping
    // ------------------------------------------------------------------

    fn issue(&mut self, pagination: Pagination) -> FetchTicket {
        self.issued += 1;
        let ticket = FetchTicket {
            sequence: self.issued,
            pagination,
        };
        self.last_ticket = Some(ticket);
        self.state = LoadState::Loading;
        ticket
    }

    /// Start a fresh query from page zero; supersedes anything in flight
    pub fn request_reset(&mut self) -> FetchTicket {
        self.issue(Pagination::first(self.page_size))
    }

    /// Start loading the next page, unless a fetch is in flight or nothing is left
    pub fn request_next_page(&mut self) -> Option<FetchTicket> {
        if self.is_loading() || !self.has_more() {
            return None;
        }
        Some(self.issue(Pagination::new(self.next_page, self.page_size)))
    }

    /// Re-run the last request after a failure
    pub fn retry(&mut self) -> Option<FetchTicket> {
        if !matches!(self.state, LoadState::Error(_)) {
            return None;
        }
        let pagination = self
            .last_ticket
            .map(|t| t.pagination)
            .unwrap_or_else(|| Pagination::first(self.page_size));
        Some(self.issue(pagination))
    }

    fn check_current(&self, ticket: &FetchTicket) -> Result<(), Diagnostic> {
        if ticket.sequence == self.issued {
            Ok(())
        } else {
            Err(Diagnostic::StaleResponse {
                sequence: ticket.sequence,
                latest: self.issued,
            })
        }
    }

    /// Apply a successful fetch
    pub fn apply_page(&mut self, ticket: FetchTicket, page: Page<Candidate>) -> ApplyOutcome {
        if let Err(stale) = self.check_current(&ticket) {
            return ApplyOutcome::Stale(stale);
        }

        let received = page.items.len() as u64;
        if ticket.is_reset() {
            self.items = page.items;
            self.loaded = received;
        } else {
            self.items.extend(page.items);
            self.loaded += received;
        }
        self.total = page.total;
        // A short page ends the listing even if the reported total disagrees
        if received < u64::from(ticket.pagination.page_size) {
            self.total = self.loaded;
        }
        self.next_page = ticket.pagination.page + 1;
        self.state = LoadState::Ready;

        // Server data is richer than anything rebuilt from child lines
        for candidate in &self.items {
            if let Some(lot) = candidate.lot_id {
                if self.pending.contains(&lot) {
                    self.assigned.insert(lot, candidate.clone());
                }
            }
        }

        ApplyOutcome::Applied
    }

    /// Record a failed fetch; loaded items and the selection are kept
    pub fn apply_failure(&mut self, ticket: FetchTicket, message: impl Into<String>) -> ApplyOutcome {
        if let Err(stale) = self.check_current(&ticket) {
            return ApplyOutcome::Stale(stale);
        }
        self.state = LoadState::Error(message.into());
        ApplyOutcome::Applied
    }

    /// Drop the results of every fetch issued so far
    pub fn invalidate(&mut self) {
        self.issued += 1;
        if self.is_loading() {
            self.state = LoadState::Idle;
        }
    }

    /// Forget loaded items, e.g. after the product changed
    pub fn clear_results(&mut self) {
        self.invalidate();
        self.items.clear();
        self.total = 0;
        self.loaded = 0;
        self.next_page = 0;
        self.last_ticket = None;
        self.state = LoadState::Idle;
    }

    /// Show an empty, settled list without querying (no product to query for)
    pub fn settle_empty(&mut self) {
        self.clear_results();
        self.state = LoadState::Ready;
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Flip a candidate's lot in the pending set
    pub fn toggle(&mut self, candidate: &Candidate) -> ToggleOutcome {
        let Some(lot) = candidate.lot_id.filter(|lot| *lot > 0) else {
            return ToggleOutcome::Ignored;
        };

        if self.pending.remove(&lot) {
            self.assigned.remove(&lot);
            ToggleOutcome::Deselected(lot)
        } else {
            self.pending.insert(lot);
            self.assigned.insert(lot, candidate.clone());
            ToggleOutcome::Selected(lot)
        }
    }

    /// Undo a toggle whose commit failed
    pub fn revert(&mut self, outcome: ToggleOutcome, candidate: &Candidate) {
        match outcome {
            ToggleOutcome::Selected(lot) => {
                self.pending.remove(&lot);
                self.assigned.remove(&lot);
            }
            ToggleOutcome::Deselected(lot) => {
                self.pending.insert(lot);
                self.assigned.insert(lot, candidate.clone());
            }
            ToggleOutcome::Ignored => {}
        }
    }

    /// Replace the selection with the host record's committed state.
    ///
    /// Existing entries with real data are kept over placeholders or
    /// child-line reconstructions of the same lot.
    pub fn sync_from_host(&mut self, pending: BTreeSet<LotId>, assigned: BTreeMap<LotId, Candidate>) {
        let mut previous = std::mem::take(&mut self.assigned);
        let mut next = BTreeMap::new();

        for lot in &pending {
            let kept = previous.remove(lot);
            let incoming = assigned.get(lot).cloned();
            let entry = match (kept, incoming) {
                (Some(kept), Some(incoming)) if kept.is_placeholder() => Some(incoming),
                (Some(kept), _) => Some(kept),
                (None, incoming) => incoming,
            };
            if let Some(entry) = entry {
                next.insert(*lot, entry);
            }
        }

        for candidate in &self.items {
            if let Some(lot) = candidate.lot_id {
                if pending.contains(&lot) {
                    next.insert(lot, candidate.clone());
                }
            }
        }

        self.pending = pending;
        self.assigned = next;
    }

    /// Replace the assigned entry for a pending lot with richer data
    pub fn enrich_assigned(&mut self, candidate: Candidate) {
        if let Some(lot) = candidate.lot_id {
            if self.pending.contains(&lot) {
                self.assigned.insert(lot, candidate);
            }
        }
    }

    /// Pending lots the server left out whose entry still lacks `stock.lot` data
    pub fn lots_missing_data(&self) -> Vec<LotId> {
        let loaded: HashSet<LotId> = self.items.iter().filter_map(|c| c.lot_id).collect();
        self.pending
            .iter()
            .filter(|lot| !loaded.contains(*lot))
            .filter(|lot| self.assigned.get(*lot).map_or(true, Candidate::lacks_lot_data))
            .copied()
            .collect()
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Candidates to render: pending lots the server left out, then server items
    pub fn candidates(&self) -> Vec<Candidate> {
        merge(&self.items, &self.pending, &self.assigned)
    }

    /// Look up a candidate currently known for a lot
    pub fn candidate_for(&self, lot: LotId) -> Option<Candidate> {
        self.items
            .iter()
            .find(|c| c.lot_id == Some(lot))
            .or_else(|| self.assigned.get(&lot))
            .cloned()
    }

    /// Every candidate known by lot, for command translation
    pub fn candidates_by_lot(&self) -> BTreeMap<LotId, Candidate> {
        let mut by_lot: BTreeMap<LotId, Candidate> = self
            .assigned
            .iter()
            .map(|(lot, c)| (*lot, c.clone()))
            .collect();
        for candidate in &self.items {
            if let Some(lot) = candidate.lot_id {
                by_lot.insert(lot, candidate.clone());
            }
        }
        by_lot
    }

    pub fn is_selected(&self, lot: LotId) -> bool {
        self.pending.contains(&lot)
    }

    pub fn pending(&self) -> &BTreeSet<LotId> {
        &self.pending
    }

    pub fn assigned(&self) -> &BTreeMap<LotId, Candidate> {
        &self.assigned
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn loaded_count(&self) -> u64 {
        self.loaded
    }

    pub fn has_more(&self) -> bool {
        has_more(self.loaded, self.total)
    }

    /// Highest sequence number issued so far
    pub fn latest_sequence(&self) -> u64 {
        self.issued
    }

    pub fn selected_count(&self) -> usize {
        self.pending.len()
    }

    /// Sum of quantities over the selected candidates
    pub fn selected_total_quantity(&self) -> Decimal {
        self.candidates()
            .iter()
            .filter(|c| c.lot_id.is_some_and(|lot| self.pending.contains(&lot)))
            .map(|c| c.quantity)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateId, CandidateOrigin};

    fn quant(id: i64, lot: i64) -> Candidate {
        let mut c = Candidate::placeholder(lot, Some(format!("LOT-{}", lot)));
        c.id = CandidateId::Quant(id);
        c.origin = CandidateOrigin::Server;
        c.quantity = Decimal::from(2);
        c
    }

    fn page(items: Vec<Candidate>, total: u64) -> Page<Candidate> {
        Page { items, total }
    }

    #[test]
    fn test_toggle_twice_restores_pending() {
        let mut reconciler = SelectionReconciler::new(35);
        let candidate = quant(1, 7);

        assert_eq!(reconciler.toggle(&candidate), ToggleOutcome::Selected(7));
        assert!(reconciler.is_selected(7));
        assert_eq!(reconciler.toggle(&candidate), ToggleOutcome::Deselected(7));
        assert!(reconciler.pending().is_empty());
    }

    #[test]
    fn test_toggle_without_lot_is_ignored() {
        let mut reconciler = SelectionReconciler::new(35);
        let mut candidate = quant(1, 7);
        candidate.lot_id = None;
        assert_eq!(reconciler.toggle(&candidate), ToggleOutcome::Ignored);
        candidate.lot_id = Some(0);
        assert_eq!(reconciler.toggle(&candidate), ToggleOutcome::Ignored);
        assert!(reconciler.pending().is_empty());
    }

    #[test]
    fn test_revert_undoes_toggle() {
        let mut reconciler = SelectionReconciler::new(35);
        let candidate = quant(1, 7);
        let outcome = reconciler.toggle(&candidate);
        reconciler.revert(outcome, &candidate);
        assert!(reconciler.pending().is_empty());
        assert!(reconciler.assigned().is_empty());
    }

    #[test]
    fn test_merge_injects_missing_pending_first() {
        let server = vec![quant(1, 10), quant(2, 11)];
        let pending = BTreeSet::from([11, 12]);
        let assigned = BTreeMap::from([(12, quant(99, 12))]);

        let merged = merge(&server, &pending, &assigned);
        let lots: Vec<_> = merged.iter().map(|c| c.lot_id).collect();
        assert_eq!(lots, vec![Some(12), Some(10), Some(11)]);
        assert_eq!(merged[0].id, CandidateId::Quant(99));
    }

    #[test]
    fn test_merge_synthesizes_placeholder() {
        let merged = merge(&[], &BTreeSet::from([5]), &BTreeMap::new());
        assert_eq!(merged.len(), 1);
        assert!(merged[0].is_placeholder());
        assert_eq!(merged[0].lot_id, Some(5));
    }

    #[test]
    fn test_merge_drops_duplicate_server_lots() {
        let server = vec![quant(1, 10), quant(2, 10), quant(3, 11)];
        let merged = merge(&server, &BTreeSet::new(), &BTreeMap::new());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, CandidateId::Quant(1));
    }

    #[test]
    fn test_pages_accumulate_until_total() {
        let mut reconciler = SelectionReconciler::new(35);
        let sizes = [35usize, 35, 30];

        let mut ticket = reconciler.request_reset();
        for (index, size) in sizes.iter().enumerate() {
            assert_eq!(ticket.pagination.page, index as u32);
            let items = (0..*size)
                .map(|i| {
                    let n = (index * 35 + i) as i64;
                    quant(n + 1, n + 1000)
                })
                .collect();
            assert_eq!(reconciler.apply_page(ticket, page(items, 100)), ApplyOutcome::Applied);
            if let Some(next) = reconciler.request_next_page() {
                ticket = next;
            }
        }

        assert_eq!(reconciler.loaded_count(), 100);
        assert!(!reconciler.has_more());
        assert_eq!(reconciler.request_next_page(), None);
        assert_eq!(reconciler.candidates().len(), 100);
    }

    #[test]
    fn test_empty_later_page_ends_listing() {
        let mut reconciler = SelectionReconciler::new(2);
        let ticket = reconciler.request_reset();
        reconciler.apply_page(ticket, page(vec![quant(1, 1), quant(2, 2)], 10));

        let next = reconciler.request_next_page().unwrap();
        reconciler.apply_page(next, page(Vec::new(), 10));

        assert_eq!(reconciler.total(), 2);
        assert!(!reconciler.has_more());
        assert_eq!(reconciler.request_next_page(), None);
    }

    #[test]
    fn test_next_page_suppressed_while_loading() {
        let mut reconciler = SelectionReconciler::new(2);
        let ticket = reconciler.request_reset();
        reconciler.apply_page(ticket, page(vec![quant(1, 1), quant(2, 2)], 10));

        assert!(reconciler.request_next_page().is_some());
        assert_eq!(reconciler.request_next_page(), None);
    }

    #[test]
    fn test_stale_response_discarded() {
        let mut reconciler = SelectionReconciler::new(35);
        let third = reconciler.request_reset();
        let fourth = reconciler.request_reset();

        assert_eq!(
            reconciler.apply_page(fourth, page(vec![quant(4, 40)], 1)),
            ApplyOutcome::Applied
        );
        assert_eq!(
            reconciler.apply_page(third, page(vec![quant(3, 30)], 1)),
            ApplyOutcome::Stale(Diagnostic::StaleResponse {
                sequence: third.sequence,
                latest: fourth.sequence
            })
        );
        assert_eq!(reconciler.candidates()[0].lot_id, Some(40));
        assert_eq!(reconciler.state(), &LoadState::Ready);
    }

    #[test]
    fn test_failure_keeps_items_and_selection() {
        let mut reconciler = SelectionReconciler::new(35);
        let ticket = reconciler.request_reset();
        reconciler.apply_page(ticket, page(vec![quant(1, 10)], 1));
        reconciler.toggle(&quant(1, 10));

        let ticket = reconciler.request_reset();
        reconciler.apply_failure(ticket, "connection refused");
        assert_eq!(reconciler.state(), &LoadState::Error("connection refused".to_string()));
        assert_eq!(reconciler.candidates().len(), 1);
        assert!(reconciler.is_selected(10));

        let retry = reconciler.retry().unwrap();
        assert_eq!(reconciler.state(), &LoadState::Loading);
        reconciler.apply_page(retry, page(vec![quant(1, 10), quant(2, 11)], 2));
        assert_eq!(reconciler.state(), &LoadState::Ready);
        assert!(reconciler.is_selected(10));
    }

    #[test]
    fn test_invalidate_drops_in_flight() {
        let mut reconciler = SelectionReconciler::new(35);
        let ticket = reconciler.request_reset();
        reconciler.invalidate();
        assert!(matches!(
            reconciler.apply_page(ticket, page(vec![quant(1, 1)], 1)),
            ApplyOutcome::Stale(_)
        ));
        assert!(reconciler.candidates().is_empty());
    }

    #[test]
    fn test_assigned_lot_absent_from_server_stays_visible() {
        let mut reconciler = SelectionReconciler::new(35);
        let assigned = BTreeMap::from([(7, Candidate::placeholder(7, Some("LOT-007".into())))]);
        reconciler.sync_from_host(BTreeSet::from([7]), assigned);

        let ticket = reconciler.request_reset();
        reconciler.apply_page(ticket, Page::empty());

        let candidates = reconciler.candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].lot_label, "LOT-007");
        assert_eq!(reconciler.selected_count(), 1);
        assert_eq!(reconciler.lots_missing_data(), vec![7]);
    }

    #[test]
    fn test_sync_prefers_rich_entries() {
        let mut reconciler = SelectionReconciler::new(35);
        reconciler.toggle(&quant(1, 7));
        reconciler.sync_from_host(
            BTreeSet::from([7, 8]),
            BTreeMap::from([(7, Candidate::placeholder(7, None)), (8, Candidate::placeholder(8, None))]),
        );

        assert_eq!(reconciler.assigned()[&7].id, CandidateId::Quant(1));
        assert!(reconciler.assigned()[&8].is_placeholder());
        assert_eq!(reconciler.lots_missing_data(), vec![8]);
    }

    #[test]
    fn test_child_line_entry_needs_lot_data_until_enriched() {
        use crate::models::{ChildLine, ChildRef};
        use serde_json::json;

        let line = ChildLine {
            record: ChildRef::Saved(100),
            lot: Some((7, "LOT-007".to_string())),
            location: Some((8, "WH/Stock".to_string())),
            quantity: Decimal::from(3),
        };
        let assigned = Candidate::from_child_line(&line).unwrap();
        let mut reconciler = SelectionReconciler::new(35);
        reconciler.sync_from_host(BTreeSet::from([7]), BTreeMap::from([(7, assigned.clone())]));
        assert_eq!(reconciler.lots_missing_data(), vec![7]);

        let mut enriched = assigned;
        enriched.enrich_from_lot(&json!({"id": 7, "name": "LOT-007", "x_bloque": "B-09"}));
        reconciler.enrich_assigned(enriched);

        assert!(reconciler.lots_missing_data().is_empty());
        assert_eq!(reconciler.assigned()[&7].quantity, Decimal::from(3));
        assert_eq!(reconciler.assigned()[&7].location_id, Some(8));
    }

    #[test]
    fn test_selected_total_quantity() {
        let mut reconciler = SelectionReconciler::new(35);
        let ticket = reconciler.request_reset();
        reconciler.apply_page(ticket, page(vec![quant(1, 10), quant(2, 11)], 2));
        reconciler.toggle(&quant(1, 10));
        assert_eq!(reconciler.selected_total_quantity(), Decimal::from(2));
    }
}

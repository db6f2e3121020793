//! Grouping of candidates by block for display

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::Serialize;

use super::candidate::Candidate;
use crate::types::LotId;

/// Key used for candidates without a block
pub const UNGROUPED_KEY: &str = "ungrouped";

/// A block of candidates with its aggregate quantity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateGroup {
    pub key: String,
    pub items: Vec<Candidate>,
    pub total_quantity: Decimal,
    /// Whether any item in the group is currently selected
    pub has_selection: bool,
}

impl CandidateGroup {
    fn new(key: String) -> Self {
        Self {
            key,
            items: Vec::new(),
            total_quantity: Decimal::ZERO,
            has_selection: false,
        }
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }
}

/// Group candidates by block.
///
/// Groups holding a selected candidate come first, then larger groups, then
/// by key. Items keep their incoming order within a group.
pub fn group_candidates(candidates: &[Candidate], pending: &BTreeSet<LotId>) -> Vec<CandidateGroup> {
    let mut groups: Vec<CandidateGroup> = Vec::new();

    for candidate in candidates {
        let key = group_key(candidate);
        let index = match groups.iter().position(|g| g.key == key) {
            Some(index) => index,
            None => {
                groups.push(CandidateGroup::new(key));
                groups.len() - 1
            }
        };

        let group = &mut groups[index];
        group.total_quantity += candidate.quantity;
        if candidate.lot_id.is_some_and(|lot| pending.contains(&lot)) {
            group.has_selection = true;
        }
        group.items.push(candidate.clone());
    }

    groups.sort_by(|a, b| {
        b.has_selection
            .cmp(&a.has_selection)
            .then_with(|| b.count().cmp(&a.count()))
            .then_with(|| a.key.cmp(&b.key))
    });
    groups
}

fn group_key(candidate: &Candidate) -> String {
    candidate
        .attributes
        .block
        .as_deref()
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .unwrap_or(UNGROUPED_KEY)
        .to_string()
}

//! Non-fatal conditions reported by the selection core

use serde::Serialize;

use crate::types::LotId;

/// A condition worth logging that never interrupts the user
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A relational field arrived in a shape no recognizer understood
    ExtractionAmbiguity { shape: String },
    /// A response arrived after a newer request had been issued
    StaleResponse { sequence: u64, latest: u64 },
    /// A selected lot could not be turned into a host mutation
    CommandBuild { lot_id: LotId, reason: String },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::ExtractionAmbiguity { shape } => {
                write!(f, "unrecognized relational value shape: {}", shape)
            }
            Diagnostic::StaleResponse { sequence, latest } => {
                write!(f, "discarded response #{} (latest is #{})", sequence, latest)
            }
            Diagnostic::CommandBuild { lot_id, reason } => {
                write!(f, "skipped lot {}: {}", lot_id, reason)
            }
        }
    }
}

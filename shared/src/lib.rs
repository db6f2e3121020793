//! Shared types and selection logic for the stone lot selector
//!
//! This crate holds the I/O-free core: candidate models, relational-field
//! identifier extraction, selection reconciliation, command translation and
//! grouping. It is used by the async `selection` crate and, through WASM,
//! directly by the browser view layer.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;

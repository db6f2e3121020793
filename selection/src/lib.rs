//! Stone lot selection runtime
//!
//! Async side of the selector: configuration, the remote data service
//! transport, the inventory query client, filter debouncing and the
//! [`services::SelectionSession`] controller that ties them to a host record.
//! The pure selection logic lives in the `shared` crate.

pub mod config;
pub mod error;
pub mod external;
pub mod services;

pub use config::Config;
pub use error::{SelectionError, SelectionResult};

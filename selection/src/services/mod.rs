//! Selection services: querying, debouncing, host access and the session controller

pub mod debounce;
pub mod host;
pub mod query;
pub mod session;

pub use debounce::FilterDebouncer;
pub use host::{read_snapshot, HostKind, HostRecord, HostSnapshot, RemoteHostRecord};
pub use query::InventoryQueryClient;
pub use session::{CommitOutcome, FetchOutcome, SelectionSession, SelectionView};

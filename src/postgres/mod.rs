// ABOUTME: PostgreSQL utilities module
// ABOUTME: Exports connection management, the worker session pool and snapshot sharing

pub mod connection;
pub mod pool;
pub mod snapshot;

pub use connection::{connect, connect_with_retry};
pub use pool::{create_pool, Session};
pub use snapshot::{end_snapshot, export_snapshot, import_snapshot};

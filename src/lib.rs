// Library module for rediff
// Re-exports modules for use in integration tests and external crates

pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod keys;
pub mod pool;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod resolve;
pub mod schedule;
pub mod store;
pub mod sync;
pub mod value;

pub use config::DiffConfig;
pub use error::{DiffError, StoreError};
pub use pool::{ConnectionPool, SelectionPolicy, Side};
pub use reconcile::{DiffResult, Reconciler};
pub use report::{DiffReport, ReportOptions};
pub use sync::{SyncStats, Synchronizer};
pub use value::{ContainerType, Value};

//! # Attribution Sync
//!
//! Incremental sync of AppsFlyer attribution events into an analytical
//! store, partitioned by app/bundle id.
//!
//! Each run computes one fetch window, then for every partition resolves
//! the stored high-water mark, downloads the window, maps rows into the
//! fixed destination schema and loads only rows newer than the mark.
//! Re-running over an overlapping window never duplicates loaded rows.
//!
//! ## Module Organization
//!
//! - `config` - Environment-driven settings
//! - `error`  - Config and per-partition error types
//! - `window` - Fetch window selection (fixed UTC+7)
//! - `schema` - FIELD_SPEC table, row mapping, timestamp coercion, DDL
//! - `dedup`  - Watermark filter
//! - `source` - Remote event sources (AppsFlyer export)
//! - `store`  - Destination stores (ClickHouse, SQLite)
//! - `sync`   - Per-partition orchestration

pub mod config;
pub mod dedup;
pub mod error;
pub mod schema;
pub mod source;
pub mod store;
pub mod sync;
pub mod window;

#[cfg(test)]
mod test_http;

pub use config::{StoreBackend, SyncConfig};
pub use error::{ConfigError, SyncError, SyncResult};
pub use schema::{FieldKind, FieldSpec, MappedRecord, MappedValue, RawRecord, FIELD_SPEC};
pub use source::{AppsFlyerClient, EventSource};
pub use store::{ClickHouseStore, EventStore, SqliteStore};
pub use sync::{PartitionReport, PartitionStatus, SyncOrchestrator, SyncReport};
pub use window::TimeWindow;

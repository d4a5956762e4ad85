//! Destination store trait
//!
//! Two operations matter to the sync loop:
//! - `max_event_time` — watermark for one partition (None when it has no rows)
//! - `insert_batch`   — append one partition's filtered rows in FIELD_SPEC column order
//!
//! Backends:
//! - `ClickHouseStore` — HTTP interface, production
//! - `SqliteStore`     — local file, development and tests

pub mod clickhouse;
pub mod sqlite;

use crate::error::SyncResult;
use crate::schema::MappedRecord;
use async_trait::async_trait;
use chrono::NaiveDateTime;

pub use clickhouse::ClickHouseStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Latest `event_time` already stored for `partition`
    async fn max_event_time(&self, partition: &str) -> SyncResult<Option<NaiveDateTime>>;

    /// Write `records` as a single batch; returns rows written
    async fn insert_batch(&self, records: &[MappedRecord]) -> SyncResult<usize>;

    /// Create the destination table if it does not exist
    async fn ensure_table(&self) -> SyncResult<()>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

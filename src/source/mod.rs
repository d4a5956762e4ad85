//! Remote event sources
//!
//! A source returns the raw rows for one partition inside a time window.
//! Any non-success response is an error; the orchestrator logs it and
//! skips the partition for this run.

pub mod appsflyer;

use crate::error::SyncResult;
use crate::schema::RawRecord;
use crate::window::TimeWindow;
use async_trait::async_trait;

pub use appsflyer::AppsFlyerClient;

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch all raw rows for `partition` within `window`
    async fn fetch(&self, partition: &str, window: &TimeWindow) -> SyncResult<Vec<RawRecord>>;

    /// Source name for logging
    fn source_name(&self) -> &'static str;
}

//! Sync orchestrator
//!
//! One run = one time window, applied to every partition in order:
//!
//! 1. resolve the partition's watermark from the store
//! 2. fetch raw rows for the shared window
//! 3. map rows into FIELD_SPEC order
//! 4. drop rows at or before the watermark
//! 5. load what is left as one batch
//!
//! Partitions never share state. A failure in one is logged, recorded in its
//! report, and the loop moves on; the watermark has not advanced, so the next
//! scheduled run picks the rows up again.

use crate::dedup::filter_after_watermark;
use crate::schema::{map_record, FieldSpec, MappedRecord, EVENT_TIME_INDEX, FIELD_SPEC};
use crate::source::EventSource;
use crate::store::EventStore;
use crate::window::{select_window, TimeWindow};
use chrono::NaiveDateTime;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionStatus {
    /// A non-empty batch was written
    Loaded,
    /// The source returned no rows for the window
    NothingFetched,
    /// Every fetched row was at or before the watermark
    NothingNew,
    /// Watermark, fetch or load failed; nothing was written
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PartitionReport {
    pub partition: String,
    pub watermark: Option<NaiveDateTime>,
    pub fetched: usize,
    pub kept: usize,
    pub loaded: usize,
    pub status: PartitionStatus,
}

impl PartitionReport {
    fn new(partition: &str) -> Self {
        Self {
            partition: partition.to_string(),
            watermark: None,
            fetched: 0,
            kept: 0,
            loaded: 0,
            status: PartitionStatus::NothingFetched,
        }
    }

    fn failed(mut self, reason: String) -> Self {
        self.status = PartitionStatus::Failed(reason);
        self
    }
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub window: TimeWindow,
    pub partitions: Vec<PartitionReport>,
}

impl SyncReport {
    /// Sum of successfully loaded batch sizes
    pub fn total_loaded(&self) -> usize {
        self.partitions.iter().map(|p| p.loaded).sum()
    }

    pub fn failed_partitions(&self) -> Vec<&str> {
        self.partitions
            .iter()
            .filter(|p| matches!(p.status, PartitionStatus::Failed(_)))
            .map(|p| p.partition.as_str())
            .collect()
    }
}

pub struct SyncOrchestrator {
    source: Arc<dyn EventSource>,
    store: Arc<dyn EventStore>,
    spec: &'static [FieldSpec],
    event_time_index: usize,
}

impl SyncOrchestrator {
    pub fn new(source: Arc<dyn EventSource>, store: Arc<dyn EventStore>) -> Self {
        Self {
            source,
            store,
            spec: FIELD_SPEC,
            event_time_index: EVENT_TIME_INDEX,
        }
    }

    /// Sync every partition over the last `lookback_hours`; returns rows loaded
    pub async fn run(&self, partitions: &[String], lookback_hours: u32) -> usize {
        let window = select_window(lookback_hours);
        self.run_window(partitions, &window).await.total_loaded()
    }

    /// Sync every partition over an explicit window
    pub async fn run_window(&self, partitions: &[String], window: &TimeWindow) -> SyncReport {
        log::info!(
            "🕒 Fetching {} from {} to {} (UTC+7)",
            self.source.source_name(),
            window.from_param(),
            window.to_param()
        );

        let mut reports = Vec::with_capacity(partitions.len());
        let mut total_loaded = 0usize;

        for partition in partitions {
            if partition.trim().is_empty() {
                log::warn!("⚠️  Skipping blank partition key");
                continue;
            }
            log::info!("==== Processing partition: {} ====", partition);

            let report = self.sync_partition(partition, window).await;
            total_loaded += report.loaded;
            reports.push(report);
        }

        log::info!(
            "== Total rows loaded into {} (all partitions): {} ==",
            self.store.backend_name(),
            total_loaded
        );

        SyncReport {
            window: *window,
            partitions: reports,
        }
    }

    async fn sync_partition(&self, partition: &str, window: &TimeWindow) -> PartitionReport {
        let mut report = PartitionReport::new(partition);

        // 1. Watermark is read before the fetch and used unchanged for filtering
        let watermark = match self.store.max_event_time(partition).await {
            Ok(w) => w,
            Err(e) => {
                log::error!("❌ Watermark query failed ({}): {}", partition, e);
                return report.failed(format!("watermark: {}", e));
            }
        };
        report.watermark = watermark;
        match watermark {
            Some(w) => log::info!("   ├─ Max event_time already stored: {}", w),
            None => log::info!("   ├─ No rows stored yet for this partition"),
        }

        // 2. Fetch
        let raw = match self.source.fetch(partition, window).await {
            Ok(rows) => rows,
            Err(e) => {
                log::error!("❌ Fetch failed ({}): {}", partition, e);
                return report.failed(format!("fetch: {}", e));
            }
        };
        report.fetched = raw.len();
        if raw.is_empty() {
            log::warn!("⚠️  No {} rows for {} in this window", self.source.source_name(), partition);
            return report;
        }
        log::info!("   ├─ Rows fetched: {}", raw.len());

        // 3. Map
        let mapped: Vec<MappedRecord> = raw
            .iter()
            .map(|row| map_record(row, partition, self.spec))
            .collect();

        // 4. Dedup
        let fresh = filter_after_watermark(mapped, self.event_time_index, watermark);
        report.kept = fresh.len();
        log::info!("   ├─ New rows after dedup: {}", fresh.len());

        if fresh.is_empty() {
            log::info!("   └─ Nothing new to load");
            report.status = PartitionStatus::NothingNew;
            return report;
        }

        // 5. Load
        match self.store.insert_batch(&fresh).await {
            Ok(written) => {
                log::info!("   └─ ✅ Loaded {} rows", written);
                report.loaded = written;
                report.status = PartitionStatus::Loaded;
                report
            }
            Err(e) => {
                log::error!("❌ Load failed ({}): {}", partition, e);
                report.failed(format!("load: {}", e))
            }
        }
    }
}

//! Watermark dedup filter
//!
//! Rows at or before the partition's watermark are already in the store.
//! Ties are dropped (strict greater-than), rows with no event time are kept
//! because they can never be confirmed as duplicates.

use crate::schema::MappedRecord;
use chrono::NaiveDateTime;

/// Keep only rows newer than `watermark`
///
/// `None` watermark means the partition has never been loaded: everything passes.
pub fn filter_after_watermark(
    records: Vec<MappedRecord>,
    event_time_index: usize,
    watermark: Option<NaiveDateTime>,
) -> Vec<MappedRecord> {
    let Some(watermark) = watermark else {
        return records;
    };

    records
        .into_iter()
        .filter(|record| match record.timestamp_at(event_time_index) {
            Some(event_time) => event_time > watermark,
            None => true,
        })
        .collect()
}

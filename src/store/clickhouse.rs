//! ClickHouse destination store (HTTP interface)
//!
//! All statements go through `POST /` on the HTTP port:
//! - watermark: `SELECT maxOrNull(event_time) ... FORMAT JSONEachRow`, partition key
//!   bound as a server-side query parameter (`param_partition`)
//! - insert:    `INSERT INTO <table> (...) FORMAT JSONEachRow`, one JSON object per row
//!
//! Timestamps travel as `YYYY-MM-DD HH:MM:SS` strings in both directions.

use super::EventStore;
use crate::config::ClickHouseConfig;
use crate::error::{SyncError, SyncResult};
use crate::schema::{
    create_table_sql, Dialect, FieldSpec, MappedRecord, EVENT_TIME_COLUMN, PARTITION_COLUMN,
    TIMESTAMP_FORMAT,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct WatermarkRow {
    watermark: Option<String>,
}

pub struct ClickHouseStore {
    client: reqwest::Client,
    config: ClickHouseConfig,
    table: String,
    spec: &'static [FieldSpec],
}

impl ClickHouseStore {
    pub fn new(
        config: ClickHouseConfig,
        table: &str,
        spec: &'static [FieldSpec],
        timeout: Duration,
    ) -> SyncResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        log::info!("✅ ClickHouse store configured ({}, table: {})", config.endpoint(), table);

        Ok(Self {
            client,
            config,
            table: table.to_string(),
            spec,
        })
    }

    fn watermark_query(&self) -> String {
        format!(
            "SELECT maxOrNull({}) AS watermark FROM {} WHERE {} = {{partition:String}} FORMAT JSONEachRow",
            EVENT_TIME_COLUMN, self.table, PARTITION_COLUMN
        )
    }

    fn insert_query(&self) -> String {
        let columns: Vec<&str> = self.spec.iter().map(|f| f.dest).collect();
        format!(
            "INSERT INTO {} ({}) FORMAT JSONEachRow",
            self.table,
            columns.join(", ")
        )
    }

    /// POST a statement; `query` travels in the URL when `body` carries data
    async fn post(&self, params: &[(&str, &str)], body: String) -> SyncResult<String> {
        let response = self
            .client
            .post(format!("{}/", self.config.endpoint()))
            .query(&[("database", self.config.database.as_str())])
            .query(params)
            .header("X-ClickHouse-User", &self.config.user)
            .header("X-ClickHouse-Key", &self.config.password)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SyncError::Status { status, body: text });
        }
        Ok(text)
    }
}

#[async_trait]
impl EventStore for ClickHouseStore {
    async fn max_event_time(&self, partition: &str) -> SyncResult<Option<NaiveDateTime>> {
        let body = self
            .post(&[("param_partition", partition)], self.watermark_query())
            .await?;
        parse_watermark(&body)
    }

    async fn insert_batch(&self, records: &[MappedRecord]) -> SyncResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let query = self.insert_query();
        let body = insert_body(records, self.spec)?;
        self.post(&[("query", query.as_str())], body).await?;

        log::debug!("✅ Inserted {} rows into {}", records.len(), self.table);
        Ok(records.len())
    }

    async fn ensure_table(&self) -> SyncResult<()> {
        self.post(&[], create_table_sql(&self.table, self.spec, Dialect::ClickHouse))
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "clickhouse"
    }
}

/// Read the watermark out of a JSONEachRow response
///
/// An empty body, a missing row, or a null value all mean "no rows yet".
pub fn parse_watermark(body: &str) -> SyncResult<Option<NaiveDateTime>> {
    let Some(line) = body.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Ok(None);
    };

    let row: WatermarkRow = serde_json::from_str(line)?;
    match row.watermark {
        None => Ok(None),
        Some(s) => NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT)
            .map(Some)
            .map_err(|e| SyncError::Store(format!("unreadable watermark '{}': {}", s, e))),
    }
}

/// Render rows as JSONEachRow, keyed by destination column
pub fn insert_body(records: &[MappedRecord], spec: &[FieldSpec]) -> SyncResult<String> {
    let mut body = String::new();
    for record in records {
        if record.len() != spec.len() {
            return Err(SyncError::Store(format!(
                "row has {} values, table has {} columns",
                record.len(),
                spec.len()
            )));
        }

        let object: serde_json::Map<String, serde_json::Value> = spec
            .iter()
            .zip(&record.values)
            .map(|(field, value)| {
                serde_json::to_value(value).map(|json| (field.dest.to_string(), json))
            })
            .collect::<Result<_, serde_json::Error>>()?;

        body.push_str(&serde_json::to_string(&object)?);
        body.push('\n');
    }
    Ok(body)
}

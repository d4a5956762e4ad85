//! SQLite destination store
//!
//! Same table shape as ClickHouse, with timestamps stored as
//! `YYYY-MM-DD HH:MM:SS` text so `MAX()` orders them chronologically.

use super::EventStore;
use crate::error::{SyncError, SyncResult};
use crate::schema::{
    create_table_sql, dest_columns, Dialect, FieldSpec, MappedRecord, MappedValue,
    EVENT_TIME_COLUMN, PARTITION_COLUMN, TIMESTAMP_FORMAT,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::types::{Null, ToSql, ToSqlOutput};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

impl ToSql for MappedValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            MappedValue::Text(s) => ToSqlOutput::from(s.as_str()),
            MappedValue::Timestamp(ts) => ToSqlOutput::from(ts.format(TIMESTAMP_FORMAT).to_string()),
            MappedValue::Null => ToSqlOutput::from(Null),
        })
    }
}

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
    spec: &'static [FieldSpec],
}

impl SqliteStore {
    pub fn open(
        db_path: impl AsRef<Path>,
        table: &str,
        spec: &'static [FieldSpec],
    ) -> SyncResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        log::info!("✅ SQLite store opened (table: {})", table);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: table.to_string(),
            spec,
        })
    }

    /// Rows stored for `partition`
    pub fn count_rows(&self, partition: &str) -> SyncResult<usize> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            self.table, PARTITION_COLUMN
        );
        let count: i64 = conn.query_row(&sql, [partition], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn lock(&self) -> SyncResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SyncError::Store("SQLite connection mutex poisoned".to_string()))
    }

    fn insert_sql(&self) -> String {
        let columns = dest_columns(self.spec);
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders.join(", ")
        )
    }
}

/// Watermark index; a `schema.` prefix goes on the index name, not the table
fn index_sql(table: &str) -> String {
    let (schema, bare) = match table.rsplit_once('.') {
        Some((schema, bare)) => (format!("{}.", schema), bare),
        None => (String::new(), table),
    };
    format!(
        "CREATE INDEX IF NOT EXISTS {}idx_{}_partition_time ON {} ({}, {})",
        schema, bare, bare, PARTITION_COLUMN, EVENT_TIME_COLUMN
    )
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn max_event_time(&self, partition: &str) -> SyncResult<Option<NaiveDateTime>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT MAX({}) FROM {} WHERE {} = ?1",
            EVENT_TIME_COLUMN, self.table, PARTITION_COLUMN
        );

        let raw: Option<String> = conn
            .query_row(&sql, [partition], |row| row.get::<_, Option<String>>(0))
            .optional()?
            .flatten();

        raw.map(|s| {
            NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT)
                .map_err(|e| SyncError::Store(format!("unreadable {} '{}': {}", EVENT_TIME_COLUMN, s, e)))
        })
        .transpose()
    }

    async fn insert_batch(&self, records: &[MappedRecord]) -> SyncResult<usize> {
        let mut conn = self.lock()?;
        let sql = self.insert_sql();

        // One transaction per batch: either the whole partition lands or nothing does
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                if record.len() != self.spec.len() {
                    return Err(SyncError::Store(format!(
                        "row has {} values, table has {} columns",
                        record.len(),
                        self.spec.len()
                    )));
                }
                stmt.execute(params_from_iter(record.values.iter()))?;
            }
        }
        tx.commit()?;

        log::debug!("✅ Inserted {} rows into {}", records.len(), self.table);
        Ok(records.len())
    }

    async fn ensure_table(&self) -> SyncResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(&create_table_sql(&self.table, self.spec, Dialect::Sqlite))?;
        conn.execute_batch(&index_sql(&self.table))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

//! Error types for the sync pipeline
//!
//! Two families:
//! - `ConfigError` — fatal at startup, before any partition is touched
//! - `SyncError`   — transport/store failures, scoped to a single partition

use thiserror::Error;

/// Startup configuration errors (missing or unusable settings)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Per-partition failures from the event source or the destination store
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

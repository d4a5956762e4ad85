//! Sync configuration from environment variables
//!
//! Resolved once at startup; nothing here is mutated during a run.
//!
//! Environment variables:
//! - `APPSFLYER_TOKEN` (required)
//! - `APP_IDS` (default: id1203171490,vn.ghn.app.giaohangnhanh)
//! - `APPSFLYER_REPORT` (default: organic_installs_report)
//! - `APPSFLYER_BASE_URL` (default: https://hq1.appsflyer.com)
//! - `APPSFLYER_TIMEZONE` (default: Asia/Ho_Chi_Minh)
//! - `STORE_BACKEND` (default: clickhouse; or sqlite)
//! - `CH_HOST` (required for clickhouse), `CH_PORT` (default: 8123)
//! - `CH_USER` (default: default), `CH_PASSWORD`, `CH_DATABASE` (default: default)
//! - `CH_TABLE` (required)
//! - `SQLITE_PATH` (default: attribution_sync.db)
//! - `LOOKBACK_HOURS` (default: 2)
//! - `HTTP_TIMEOUT_SECS` (default: 60)
//! - `ENSURE_TABLE` (default: false)

use crate::error::ConfigError;
use std::env;

pub const DEFAULT_APP_IDS: &str = "id1203171490,vn.ghn.app.giaohangnhanh";
pub const DEFAULT_LOOKBACK_HOURS: u32 = 2;

/// Raw-data exports only reach back 90 days
pub const MAX_LOOKBACK_HOURS: u32 = 90 * 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    ClickHouse,
    Sqlite,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "clickhouse" => Ok(StoreBackend::ClickHouse),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(ConfigError::InvalidValue(format!(
                "STORE_BACKEND must be 'clickhouse' or 'sqlite', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppsFlyerConfig {
    pub token: String,
    pub base_url: String,
    pub report: String,
    pub timezone: String,
}

#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ClickHouseConfig {
    /// HTTP interface endpoint; a bare host gets `http://`
    pub fn endpoint(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub appsflyer: AppsFlyerConfig,
    pub partitions: Vec<String>,
    pub backend: StoreBackend,
    /// Present when `backend` is ClickHouse
    pub clickhouse: Option<ClickHouseConfig>,
    pub sqlite_path: String,
    pub table: String,
    pub lookback_hours: u32,
    pub http_timeout_secs: u64,
    pub ensure_table: bool,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, map in tests)
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
        };
        let or_default = |key: &str, default: &str| -> String {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let appsflyer = AppsFlyerConfig {
            token: required("APPSFLYER_TOKEN")?,
            base_url: or_default("APPSFLYER_BASE_URL", "https://hq1.appsflyer.com")
                .trim_end_matches('/')
                .to_string(),
            report: or_default("APPSFLYER_REPORT", "organic_installs_report"),
            timezone: or_default("APPSFLYER_TIMEZONE", "Asia/Ho_Chi_Minh"),
        };

        let partitions = parse_partitions(&or_default("APP_IDS", DEFAULT_APP_IDS))?;

        let backend = StoreBackend::parse(&or_default("STORE_BACKEND", "clickhouse"))?;

        let clickhouse = match backend {
            StoreBackend::ClickHouse => Some(ClickHouseConfig {
                host: required("CH_HOST")?,
                port: parse_number("CH_PORT", &or_default("CH_PORT", "8123"))?,
                user: or_default("CH_USER", "default"),
                password: get("CH_PASSWORD").unwrap_or_default(),
                database: or_default("CH_DATABASE", "default"),
            }),
            StoreBackend::Sqlite => None,
        };

        let table = required("CH_TABLE")?;
        if !is_identifier(&table) {
            return Err(ConfigError::InvalidValue(format!(
                "CH_TABLE must be a plain table name, got '{}'",
                table
            )));
        }

        let lookback_hours = parse_lookback(&or_default(
            "LOOKBACK_HOURS",
            &DEFAULT_LOOKBACK_HOURS.to_string(),
        ))?;

        let http_timeout_secs = parse_number("HTTP_TIMEOUT_SECS", &or_default("HTTP_TIMEOUT_SECS", "60"))?;

        let ensure_table = parse_flag("ENSURE_TABLE", &or_default("ENSURE_TABLE", "false"))?;

        Ok(Self {
            appsflyer,
            partitions,
            backend,
            clickhouse,
            sqlite_path: or_default("SQLITE_PATH", "attribution_sync.db"),
            table,
            lookback_hours,
            http_timeout_secs,
            ensure_table,
        })
    }
}

/// Comma-separated partition keys, trimmed, empties dropped
pub fn parse_partitions(value: &str) -> Result<Vec<String>, ConfigError> {
    let partitions: Vec<String> = value
        .split(',')
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();

    if partitions.is_empty() {
        return Err(ConfigError::InvalidValue("APP_IDS contains no app ids".to_string()));
    }
    Ok(partitions)
}

pub fn parse_lookback(value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(hours) if hours > 0 && hours <= MAX_LOOKBACK_HOURS => Ok(hours),
        _ => Err(ConfigError::InvalidValue(format!(
            "LOOKBACK_HOURS must be an integer between 1 and {}, got '{}'",
            MAX_LOOKBACK_HOURS, value
        ))),
    }
}

/// Boolean switch: true/false, 1/0, yes/no (any case)
fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!(
            "{} must be true or false, got '{}'",
            key, value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} must be a number, got '{}'", key, value)))
}

/// Table names are interpolated into SQL, so only `[A-Za-z0-9_.]` is accepted
fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("APPSFLYER_TOKEN", "tok"),
            ("CH_HOST", "ch.local"),
            ("CH_TABLE", "af_events"),
        ]))
        .unwrap();

        assert_eq!(config.partitions, vec!["id1203171490", "vn.ghn.app.giaohangnhanh"]);
        assert_eq!(config.backend, StoreBackend::ClickHouse);
        assert_eq!(config.lookback_hours, 2);
        assert_eq!(config.http_timeout_secs, 60);
        assert_eq!(config.appsflyer.report, "organic_installs_report");
        assert_eq!(config.appsflyer.timezone, "Asia/Ho_Chi_Minh");
        assert!(!config.ensure_table);

        let ch = config.clickhouse.unwrap();
        assert_eq!(ch.port, 8123);
        assert_eq!(ch.user, "default");
        assert_eq!(ch.endpoint(), "http://ch.local:8123");
    }

    #[test]
    fn test_custom_values() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("APPSFLYER_TOKEN", "tok"),
            ("APP_IDS", " app1 , ,app2,"),
            ("STORE_BACKEND", "SQLite"),
            ("SQLITE_PATH", "/tmp/af.db"),
            ("CH_TABLE", "af_events"),
            ("LOOKBACK_HOURS", "6"),
            ("ENSURE_TABLE", "true"),
        ]))
        .unwrap();

        assert_eq!(config.partitions, vec!["app1", "app2"]);
        assert_eq!(config.backend, StoreBackend::Sqlite);
        assert!(config.clickhouse.is_none());
        assert_eq!(config.sqlite_path, "/tmp/af.db");
        assert_eq!(config.lookback_hours, 6);
        assert!(config.ensure_table);
    }

    #[test]
    fn test_missing_required() {
        let err = SyncConfig::from_lookup(lookup(&[("CH_TABLE", "t")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable(ref v) if v == "APPSFLYER_TOKEN"));

        let err = SyncConfig::from_lookup(lookup(&[("APPSFLYER_TOKEN", "tok"), ("CH_TABLE", "t")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVariable(ref v) if v == "CH_HOST"));
    }

    #[test]
    fn test_invalid_values() {
        let base = [
            ("APPSFLYER_TOKEN", "tok"),
            ("STORE_BACKEND", "sqlite"),
            ("CH_TABLE", "t"),
        ];

        let mut pairs = base.to_vec();
        pairs.push(("LOOKBACK_HOURS", "0"));
        assert!(matches!(SyncConfig::from_lookup(lookup(&pairs)), Err(ConfigError::InvalidValue(_))));

        let pairs = [("APPSFLYER_TOKEN", "tok"), ("STORE_BACKEND", "postgres"), ("CH_TABLE", "t")];
        assert!(matches!(SyncConfig::from_lookup(lookup(&pairs)), Err(ConfigError::InvalidValue(_))));

        let mut pairs = base.to_vec();
        pairs.push(("APP_IDS", " , "));
        assert!(matches!(SyncConfig::from_lookup(lookup(&pairs)), Err(ConfigError::InvalidValue(_))));

        let mut pairs = base.to_vec();
        pairs.push(("ENSURE_TABLE", "maybe"));
        assert!(matches!(SyncConfig::from_lookup(lookup(&pairs)), Err(ConfigError::InvalidValue(_))));

        let pairs = [("APPSFLYER_TOKEN", "tok"), ("STORE_BACKEND", "sqlite"), ("CH_TABLE", "t; DROP TABLE x")];
        assert!(matches!(SyncConfig::from_lookup(lookup(&pairs)), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_lookback_bounds() {
        assert_eq!(parse_lookback("1").unwrap(), 1);
        assert_eq!(parse_lookback(" 2160 ").unwrap(), MAX_LOOKBACK_HOURS);
        assert!(matches!(parse_lookback("2161"), Err(ConfigError::InvalidValue(_))));
        assert!(matches!(parse_lookback("3000000000"), Err(ConfigError::InvalidValue(_))));
        assert!(matches!(parse_lookback("-1"), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_ensure_table_flag_spellings() {
        for (raw, expected) in [("1", true), ("YES", true), ("True", true), ("0", false), ("no", false)] {
            let config = SyncConfig::from_lookup(lookup(&[
                ("APPSFLYER_TOKEN", "tok"),
                ("STORE_BACKEND", "sqlite"),
                ("CH_TABLE", "t"),
                ("ENSURE_TABLE", raw),
            ]))
            .unwrap();
            assert_eq!(config.ensure_table, expected, "ENSURE_TABLE={raw}");
        }
    }
}

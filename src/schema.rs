//! Source → destination schema mapping
//!
//! The destination schema is a static table (`FIELD_SPEC`): one entry per
//! destination column, in column order, naming the AppsFlyer CSV header it
//! is read from and how the value is coerced.
//!
//! Coercion kinds:
//! - `Passthrough` — text as-is, sentinel nulls (`""`, `"null"`, `"None"`) become NULL
//! - `Identity`    — always the partition key (bundle id), source value ignored
//! - `Timestamp`   — lenient civil-time parse, malformed values become NULL + warning
//!
//! Mapping never fails: every raw row yields exactly `FIELD_SPEC.len()` values.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::sync::LazyLock;

/// One parsed CSV row: header name → cell text, in header order
pub type RawRecord = IndexMap<String, String>;

/// Civil timestamp format used on both sides of the pipeline
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Destination column holding the event time (watermark column)
pub const EVENT_TIME_COLUMN: &str = "event_time";

/// Destination column holding the partition key
pub const PARTITION_COLUMN: &str = "bundle_id";

/// Position of `event_time` in `FIELD_SPEC`
pub const EVENT_TIME_INDEX: usize = 3;

/// Passthrough values the export uses to mean "no value" (case-sensitive)
pub const PASSTHROUGH_NULLS: [&str; 3] = ["", "null", "None"];

/// Timestamp values treated as absent, compared after trim + lowercase
pub const TIMESTAMP_NULLS: [&str; 4] = ["", "null", "none", "n/a"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Passthrough,
    Identity,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub source: &'static str,
    pub dest: &'static str,
    pub kind: FieldKind,
}

const fn text(source: &'static str, dest: &'static str) -> FieldSpec {
    FieldSpec { source, dest, kind: FieldKind::Passthrough }
}

const fn time(source: &'static str, dest: &'static str) -> FieldSpec {
    FieldSpec { source, dest, kind: FieldKind::Timestamp }
}

const fn identity(source: &'static str, dest: &'static str) -> FieldSpec {
    FieldSpec { source, dest, kind: FieldKind::Identity }
}

/// Full destination schema, in destination column order
pub static FIELD_SPEC: &[FieldSpec] = &[
    text("Attributed Touch Type", "attributed_touch_type"),
    time("Attributed Touch Time", "attributed_touch_time"),
    time("Install Time", "install_time"),
    time("Event Time", "event_time"),
    text("Event Name", "event_name"),
    text("Partner", "partner"),
    text("Media Source", "media_source"),
    text("Campaign", "campaign"),
    text("Adset", "adset"),
    text("Ad", "ad"),
    text("Ad Type", "ad_type"),
    text("Contributor 1 Touch Type", "contributor_1_touch_type"),
    time("Contributor 1 Touch Time", "contributor_1_touch_time"),
    text("Contributor 1 Partner", "contributor_1_partner"),
    text("Contributor 1 Match Type", "contributor_1_match_type"),
    text("Contributor 1 Media Source", "contributor_1_media_source"),
    text("Contributor 1 Campaign", "contributor_1_campaign"),
    text("Contributor 1 Engagement Type", "contributor_1_engagement_type"),
    text("Contributor 2 Touch Type", "contributor_2_touch_type"),
    time("Contributor 2 Touch Time", "contributor_2_touch_time"),
    text("Contributor 2 Partner", "contributor_2_partner"),
    text("Contributor 2 Media Source", "contributor_2_media_source"),
    text("Contributor 2 Campaign", "contributor_2_campaign"),
    text("Contributor 2 Match Type", "contributor_2_match_type"),
    text("Contributor 2 Engagement Type", "contributor_2_engagement_type"),
    text("Contributor 3 Touch Type", "contributor_3_touch_type"),
    time("Contributor 3 Touch Time", "contributor_3_touch_time"),
    text("Contributor 3 Partner", "contributor_3_partner"),
    text("Contributor 3 Media Source", "contributor_3_media_source"),
    text("Contributor 3 Campaign", "contributor_3_campaign"),
    text("Contributor 3 Match Type", "contributor_3_match_type"),
    text("Contributor 3 Engagement Type", "contributor_3_engagement_type"),
    text("City", "city"),
    text("IP", "ip"),
    text("AppsFlyer ID", "appsflyer_id"),
    text("Customer User ID", "customer_user_id"),
    text("IDFA", "idfa"),
    text("IDFV", "idfv"),
    text("Device Category", "device_category"),
    text("Platform", "platform"),
    text("OS Version", "os_version"),
    identity("Bundle ID", "bundle_id"),
    text("Is Retargeting", "is_retargeting"),
    text("Attribution Lookback", "attribution_lookback"),
    text("Match Type", "match_type"),
    time("Device Download Time", "device_download_time"),
    text("Device Model", "device_model"),
    text("Engagement Type", "engagement_type"),
];

/// Destination column names, in order
pub fn dest_columns(spec: &[FieldSpec]) -> Vec<&'static str> {
    spec.iter().map(|f| f.dest).collect()
}

/// A single destination cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedValue {
    Text(String),
    Timestamp(NaiveDateTime),
    Null,
}

impl MappedValue {
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            MappedValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MappedValue::Null)
    }
}

impl Serialize for MappedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MappedValue::Text(s) => serializer.serialize_str(s),
            MappedValue::Timestamp(ts) => {
                serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
            }
            MappedValue::Null => serializer.serialize_none(),
        }
    }
}

/// One destination row, positionally aligned with the `FieldSpec` it was mapped with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRecord {
    pub values: Vec<MappedValue>,
}

impl MappedRecord {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Timestamp at `index`, or None when the cell is null / not a timestamp
    pub fn timestamp_at(&self, index: usize) -> Option<NaiveDateTime> {
        self.values.get(index).and_then(MappedValue::as_timestamp)
    }

    pub fn event_time(&self) -> Option<NaiveDateTime> {
        self.timestamp_at(EVENT_TIME_INDEX)
    }
}

/// Map one raw row into destination order
///
/// Absent source headers behave exactly like empty cells.
pub fn map_record(raw: &RawRecord, partition_key: &str, spec: &[FieldSpec]) -> MappedRecord {
    let values = spec
        .iter()
        .map(|field| {
            let source = raw.get(field.source).map(String::as_str);
            match field.kind {
                FieldKind::Identity => MappedValue::Text(partition_key.to_string()),
                FieldKind::Timestamp => match parse_timestamp(source) {
                    Some(ts) => MappedValue::Timestamp(ts),
                    None => MappedValue::Null,
                },
                FieldKind::Passthrough => match source {
                    Some(v) if !PASSTHROUGH_NULLS.contains(&v) => MappedValue::Text(v.to_string()),
                    _ => MappedValue::Null,
                },
            }
        })
        .collect();

    MappedRecord { values }
}

/// Outcome of timestamp coercion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampCoercion {
    Parsed(NaiveDateTime),
    /// Absent or a null sentinel
    Empty,
    /// Present but not a recognisable timestamp
    Malformed,
}

static SHORT_HOUR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4}-[0-9]{2}-[0-9]{2}) ([0-9]{1,2}):([0-9]{2}):([0-9]{2})$")
        .expect("static timestamp pattern")
});

static CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}$")
        .expect("static timestamp pattern")
});

/// Classify a raw timestamp cell without side effects
pub fn coerce_timestamp(value: Option<&str>) -> TimestampCoercion {
    let Some(value) = value else {
        return TimestampCoercion::Empty;
    };

    let trimmed = value.trim();
    if TIMESTAMP_NULLS.contains(&trimmed.to_lowercase().as_str()) {
        return TimestampCoercion::Empty;
    }

    // Drop fractional seconds: everything from the first '.'
    let whole = match trimmed.find('.') {
        Some(pos) => &trimmed[..pos],
        None => trimmed,
    };

    let padded = match SHORT_HOUR.captures(whole) {
        Some(caps) => format!("{} {:0>2}:{}:{}", &caps[1], &caps[2], &caps[3], &caps[4]),
        None => whole.to_string(),
    };

    if !CANONICAL.is_match(&padded) {
        return TimestampCoercion::Malformed;
    }

    // Shape is right but the calendar may not be (e.g. month 13)
    match NaiveDateTime::parse_from_str(&padded, TIMESTAMP_FORMAT) {
        Ok(ts) => TimestampCoercion::Parsed(ts),
        Err(_) => TimestampCoercion::Malformed,
    }
}

/// Lenient timestamp parse: malformed values degrade to None with a warning
pub fn parse_timestamp(value: Option<&str>) -> Option<NaiveDateTime> {
    match coerce_timestamp(value) {
        TimestampCoercion::Parsed(ts) => Some(ts),
        TimestampCoercion::Empty => None,
        TimestampCoercion::Malformed => {
            log::warn!("⚠️  Malformed datetime '{}' -> NULL", value.unwrap_or_default());
            None
        }
    }
}

/// Destination SQL dialects the table DDL can be rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    ClickHouse,
    Sqlite,
}

/// `CREATE TABLE IF NOT EXISTS` statement for `spec`
pub fn create_table_sql(table: &str, spec: &[FieldSpec], dialect: Dialect) -> String {
    let columns: Vec<String> = spec
        .iter()
        .map(|field| {
            let ty = match (dialect, field.kind) {
                (Dialect::ClickHouse, FieldKind::Timestamp) => "Nullable(DateTime)",
                (Dialect::ClickHouse, FieldKind::Identity) => "String",
                (Dialect::ClickHouse, FieldKind::Passthrough) => "Nullable(String)",
                (Dialect::Sqlite, FieldKind::Identity) => "TEXT NOT NULL",
                (Dialect::Sqlite, _) => "TEXT",
            };
            format!("    {} {}", field.dest, ty)
        })
        .collect();

    let body = columns.join(",\n");
    match dialect {
        Dialect::ClickHouse => format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n{body}\n) ENGINE = MergeTree ORDER BY ({PARTITION_COLUMN})"
        ),
        Dialect::Sqlite => format!("CREATE TABLE IF NOT EXISTS {table} (\n{body}\n)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    fn raw(pairs: &[(&str, &str)]) -> RawRecord {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_field_spec_constants_line_up() {
        assert_eq!(FIELD_SPEC.len(), 48);
        assert_eq!(FIELD_SPEC[EVENT_TIME_INDEX].dest, EVENT_TIME_COLUMN);
        assert_eq!(FIELD_SPEC[EVENT_TIME_INDEX].kind, FieldKind::Timestamp);

        let identities: Vec<_> = FIELD_SPEC.iter().filter(|f| f.kind == FieldKind::Identity).collect();
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].dest, PARTITION_COLUMN);

        let timestamps = FIELD_SPEC.iter().filter(|f| f.kind == FieldKind::Timestamp).count();
        assert_eq!(timestamps, 7);
    }

    #[test]
    fn test_parse_timestamp_pads_hour_and_drops_fraction() {
        assert_eq!(parse_timestamp(Some("2024-05-01 9:03:07.123")), Some(ts(2024, 5, 1, 9, 3, 7)));
        assert_eq!(parse_timestamp(Some("2024-05-01 19:03:07")), Some(ts(2024, 5, 1, 19, 3, 7)));
        assert_eq!(parse_timestamp(Some("  2024-05-01 00:00:00  ")), Some(ts(2024, 5, 1, 0, 0, 0)));
    }

    #[test]
    fn test_parse_timestamp_null_sentinels() {
        assert_eq!(parse_timestamp(None), None);
        for v in ["", "   ", "null", "NULL", "None", "none", "N/A", "n/a"] {
            assert_eq!(coerce_timestamp(Some(v)), TimestampCoercion::Empty, "value {v:?}");
        }
    }

    #[test]
    fn test_parse_timestamp_malformed() {
        assert_eq!(parse_timestamp(Some("not-a-date")), None);
        assert_eq!(coerce_timestamp(Some("not-a-date")), TimestampCoercion::Malformed);
        assert_eq!(coerce_timestamp(Some("2024-05-01")), TimestampCoercion::Malformed);
        assert_eq!(coerce_timestamp(Some("2024-05-01T09:03:07")), TimestampCoercion::Malformed);
        assert_eq!(coerce_timestamp(Some("2024-13-01 09:03:07")), TimestampCoercion::Malformed);
        assert_eq!(coerce_timestamp(Some("2024-05-01 123:03:07")), TimestampCoercion::Malformed);
    }

    #[test]
    fn test_only_first_dot_is_cut() {
        // "2024.05.01 ..." loses everything after the first dot and is rejected
        assert_eq!(coerce_timestamp(Some("2024.05.01 09:03:07")), TimestampCoercion::Malformed);
    }

    #[test]
    fn test_map_record_empty_row_keeps_schema_shape() {
        let mapped = map_record(&RawRecord::new(), "app1", FIELD_SPEC);

        assert_eq!(mapped.len(), FIELD_SPEC.len());
        for (field, value) in FIELD_SPEC.iter().zip(&mapped.values) {
            match field.kind {
                FieldKind::Identity => assert_eq!(value, &MappedValue::Text("app1".to_string())),
                _ => assert!(value.is_null(), "{} should be null", field.dest),
            }
        }
    }

    #[test]
    fn test_map_record_coerces_by_kind() {
        let row = raw(&[
            ("Event Time", "2024-05-01 10:00:01"),
            ("Install Time", "garbage"),
            ("Event Name", "af_purchase"),
            ("Media Source", "None"),
            ("Campaign", "null"),
            ("Adset", "NULL"),
            ("Bundle ID", "com.other.app"),
            ("Unmapped Header", "ignored"),
        ]);

        let mapped = map_record(&row, "app1", FIELD_SPEC);
        let col = |name: &str| {
            let idx = FIELD_SPEC.iter().position(|f| f.dest == name).unwrap();
            mapped.values[idx].clone()
        };

        assert_eq!(mapped.event_time(), Some(ts(2024, 5, 1, 10, 0, 1)));
        assert_eq!(col("install_time"), MappedValue::Null);
        assert_eq!(col("event_name"), MappedValue::Text("af_purchase".to_string()));
        assert_eq!(col("media_source"), MappedValue::Null);
        assert_eq!(col("campaign"), MappedValue::Null);
        // Sentinels are case-sensitive for passthrough columns
        assert_eq!(col("adset"), MappedValue::Text("NULL".to_string()));
        assert_eq!(col("bundle_id"), MappedValue::Text("app1".to_string()));
    }

    #[test]
    fn test_mapped_value_serializes_for_json_rows() {
        let values = vec![
            MappedValue::Text("a".to_string()),
            MappedValue::Timestamp(ts(2024, 5, 1, 9, 3, 7)),
            MappedValue::Null,
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"["a","2024-05-01 09:03:07",null]"#);
    }

    #[test]
    fn test_create_table_sql_types() {
        let ddl = create_table_sql("events", FIELD_SPEC, Dialect::ClickHouse);
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS events ("));
        assert!(ddl.contains("    event_time Nullable(DateTime)"));
        assert!(ddl.contains("    bundle_id String,"));
        assert!(ddl.contains("    city Nullable(String)"));
        assert!(ddl.ends_with("ENGINE = MergeTree ORDER BY (bundle_id)"));

        let ddl = create_table_sql("events", FIELD_SPEC, Dialect::Sqlite);
        assert!(ddl.contains("    bundle_id TEXT NOT NULL"));
        assert!(ddl.contains("    event_time TEXT"));
    }
}

//! Attribution Sync - one incremental run
//!
//! Loads AppsFlyer raw events for every configured app id into the
//! destination store, skipping rows already present (per-app watermark).
//! Meant to be scheduled (cron / systemd timer) every hour or so with a
//! lookback that overlaps the previous run.
//!
//! Usage:
//!   cargo run --release --bin attribution_sync -- [--lookback-hours N] [--app-ids a,b] [--backend sqlite]
//!
//! Environment variables: see `attribution_sync::config`.

use attribution_sync::{
    config::{StoreBackend, SyncConfig},
    schema::FIELD_SPEC,
    window::select_window,
    AppsFlyerClient, ClickHouseStore, EventStore, SqliteStore, SyncOrchestrator,
};
use clap::Parser;
use dotenv::dotenv;
use log::{error, info, warn};
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Command-line overrides; anything unset falls back to the environment
#[derive(Debug, Parser)]
#[command(name = "attribution_sync", version, about = "Incremental AppsFlyer → analytics store sync")]
struct Args {
    /// Hours to look back from now (UTC+7)
    #[arg(long)]
    lookback_hours: Option<u32>,

    /// Comma-separated app ids, replaces APP_IDS
    #[arg(long)]
    app_ids: Option<String>,

    /// Destination backend: clickhouse or sqlite
    #[arg(long)]
    backend: Option<String>,

    /// Create the destination table if missing
    #[arg(long)]
    ensure_table: bool,
}

impl Args {
    /// Environment lookup with command-line values layered on top
    fn lookup(&self, key: &str) -> Option<String> {
        let flag = match key {
            "LOOKBACK_HOURS" => self.lookback_hours.map(|h| h.to_string()),
            "APP_IDS" => self.app_ids.clone(),
            "STORE_BACKEND" => self.backend.clone(),
            "ENSURE_TABLE" if self.ensure_table => Some("true".to_string()),
            _ => None,
        };
        flag.or_else(|| env::var(key).ok())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();

    info!("🚀 Attribution Sync");

    // Configuration errors are fatal before any partition is touched
    let config = SyncConfig::from_lookup(|key| args.lookup(key))?;

    info!("📊 Configuration:");
    info!("   ├─ Partitions: {:?}", config.partitions);
    info!("   ├─ Report: {}", config.appsflyer.report);
    info!("   ├─ Backend: {:?} (table: {})", config.backend, config.table);
    info!("   └─ Lookback: {}h", config.lookback_hours);

    let timeout = Duration::from_secs(config.http_timeout_secs);

    let store: Arc<dyn EventStore> = match config.backend {
        StoreBackend::ClickHouse => {
            let ch = config
                .clickhouse
                .clone()
                .ok_or("ClickHouse backend selected without CH_HOST")?;
            Arc::new(ClickHouseStore::new(ch, &config.table, FIELD_SPEC, timeout)?)
        }
        StoreBackend::Sqlite => {
            Arc::new(SqliteStore::open(&config.sqlite_path, &config.table, FIELD_SPEC)?)
        }
    };

    // SQLite has no external DDL path, so its table is always ensured
    if config.ensure_table || config.backend == StoreBackend::Sqlite {
        info!("🔧 Ensuring table {} exists...", config.table);
        store.ensure_table().await?;
    }

    let source = Arc::new(AppsFlyerClient::new(config.appsflyer.clone(), timeout)?);
    let orchestrator = SyncOrchestrator::new(source, store);

    let window = select_window(config.lookback_hours);
    let report = orchestrator.run_window(&config.partitions, &window).await;

    let failed = report.failed_partitions();
    if failed.is_empty() {
        info!("✅ Sync finished: {} rows loaded", report.total_loaded());
    } else {
        warn!(
            "⚠️  Sync finished with failures: {} rows loaded, failed partitions: {:?}",
            report.total_loaded(),
            failed
        );
        if failed.len() == report.partitions.len() {
            error!("❌ Every partition failed this run");
        }
    }

    Ok(())
}

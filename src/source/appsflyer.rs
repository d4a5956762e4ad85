//! AppsFlyer raw-data export integration
//!
//! Endpoint: `{base}/api/raw-data/export/app/{app_id}/{report}/v5`
//! Returns: CSV with a header row (sometimes prefixed with a UTF-8 BOM)
//!
//! The export has no "newer than" predicate, so the full window is always
//! downloaded and dedup happens client-side against the store watermark.

use super::EventSource;
use crate::config::AppsFlyerConfig;
use crate::error::{SyncError, SyncResult};
use crate::schema::RawRecord;
use crate::window::TimeWindow;
use async_trait::async_trait;
use std::time::Duration;

/// Extra columns requested on every export call
pub const ADDITIONAL_FIELDS: &str = concat!(
    "blocked_reason_rule,store_reinstall,impressions,contributor3_match_type,custom_dimension,conversion_type,",
    "gp_click_time,match_type,mediation_network,oaid,deeplink_url,blocked_reason,blocked_sub_reason,",
    "gp_broadcast_referrer,gp_install_begin,campaign_type,custom_data,rejected_reason,device_download_time,",
    "keyword_match_type,contributor1_match_type,contributor2_match_type,device_model,monetization_network,",
    "segment,is_lat,gp_referrer,blocked_reason_value,store_product_page,device_category,app_type,",
    "rejected_reason_value,ad_unit,keyword_id,placement,network_account_id,install_app_store,amazon_aid,att,",
    "engagement_type,gdpr_applies,ad_user_data_enabled,ad_personalization_enabled"
);

const BOM: char = '\u{feff}';

pub struct AppsFlyerClient {
    client: reqwest::Client,
    config: AppsFlyerConfig,
}

impl AppsFlyerClient {
    pub fn new(config: AppsFlyerConfig, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn export_url(&self, app_id: &str) -> String {
        format!(
            "{}/api/raw-data/export/app/{}/{}/v5",
            self.config.base_url, app_id, self.config.report
        )
    }
}

#[async_trait]
impl EventSource for AppsFlyerClient {
    async fn fetch(&self, partition: &str, window: &TimeWindow) -> SyncResult<Vec<RawRecord>> {
        let from = window.from_param();
        let to = window.to_param();

        let response = self
            .client
            .get(self.export_url(partition))
            .query(&[
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("timezone", self.config.timezone.as_str()),
                ("additional_fields", ADDITIONAL_FIELDS),
            ])
            .header("Authorization", &self.config.token)
            .header("accept", "text/csv")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status { status, body });
        }

        let body = response.text().await?;
        parse_report(&body)
    }

    fn source_name(&self) -> &'static str {
        "appsflyer"
    }
}

/// Parse a CSV export body into raw rows
///
/// Header names lose any BOM. Short rows simply lack the trailing keys.
pub fn parse_report(body: &str) -> SyncResult<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_matches(BOM).to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: RawRecord = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

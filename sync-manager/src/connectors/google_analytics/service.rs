use super::api::{GoogleAnalyticsClient, TopPage, TrafficSource};
use super::transformer::transform_ga_rows;
use crate::dates::{parse_date, range_days, split_date_range, DateRange, MAX_RANGE_DAYS};
use crate::error::SyncError;
use crate::persistence::{mark_synced, store_metrics, BatchSettings};
use crate::refresh::TokenRefresher;
use crate::retry::{with_retry, RetryPolicy};
use crate::validation::filter_valid_records;
use marketlens::config::{AppConfig, SyncConfig};
use marketlens::credentials::TokenCipher;
use marketlens::source::DataSource;
use marketlens::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const PLATFORM: &str = "google_analytics";

#[derive(Debug, Clone, Deserialize)]
pub struct GaSyncRequest {
    pub source_id: String,
    /// Overrides (and replaces) the property stored on the source.
    #[serde(default)]
    pub property_id: Option<String>,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaSyncResult {
    pub success: bool,
    pub data_points: usize,
    pub date_range: DateRange,
}

/// Fetch-and-store for Google Analytics sources.
pub struct GoogleAnalyticsService {
    store: Arc<Store>,
    cipher: TokenCipher,
    refresher: Arc<TokenRefresher>,
    base_url: String,
    chunk_days: i64,
    batches: BatchSettings,
    retry: RetryPolicy,
    http: reqwest::Client,
}

impl GoogleAnalyticsService {
    pub fn new(
        store: Arc<Store>,
        cipher: TokenCipher,
        refresher: Arc<TokenRefresher>,
        config: &AppConfig,
    ) -> Self {
        Self::with_settings(
            store,
            cipher,
            refresher,
            config.google.analytics_data_url.clone(),
            &config.sync,
        )
    }

    pub fn with_settings(
        store: Arc<Store>,
        cipher: TokenCipher,
        refresher: Arc<TokenRefresher>,
        base_url: String,
        sync: &SyncConfig,
    ) -> Self {
        Self {
            store,
            cipher,
            refresher,
            base_url,
            chunk_days: sync.chunk_days,
            batches: BatchSettings::from_config(sync),
            retry: RetryPolicy::from_config(sync),
            http: reqwest::Client::new(),
        }
    }

    /// Fetches `[start_date, end_date]` in chunks, then replaces the stored
    /// rows for every returned date.
    pub async fn fetch_and_store(&self, request: GaSyncRequest) -> Result<GaSyncResult, SyncError> {
        let start = parse_date(&request.start_date).ok_or_else(|| {
            SyncError::InvalidDateRange(format!("bad start date '{}'", request.start_date))
        })?;
        let end = parse_date(&request.end_date).ok_or_else(|| {
            SyncError::InvalidDateRange(format!("bad end date '{}'", request.end_date))
        })?;
        if end < start {
            return Err(SyncError::InvalidDateRange(format!(
                "{} is before {}",
                request.end_date, request.start_date
            )));
        }
        if range_days(start, end) > MAX_RANGE_DAYS {
            return Err(SyncError::InvalidDateRange(format!(
                "{}..{} spans more than {} days",
                request.start_date, request.end_date, MAX_RANGE_DAYS
            )));
        }

        let (source, client) = self.authorized_client(&request.source_id).await?;

        let property_id = match request.property_id.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(property_id) => {
                if stored_property(&source) != Some(property_id) {
                    self.store.set_google_property(&source.id, property_id)?;
                }
                property_id.to_string()
            }
            None => stored_property(&source).map(str::to_string).ok_or_else(no_property)?,
        };

        info!(
            source_id = %source.id,
            property_id = %property_id,
            start = %start,
            end = %end,
            "Starting Google Analytics sync"
        );

        let mut rows = Vec::new();
        for (chunk_start, chunk_end) in split_date_range(start, end, self.chunk_days) {
            let since = chunk_start.format("%Y-%m-%d").to_string();
            let until = chunk_end.format("%Y-%m-%d").to_string();
            debug!(source_id = %source.id, since = %since, until = %until, "Fetching chunk");

            let chunk = with_retry(self.retry, "google_analytics.get_metrics", || {
                client.get_metrics(&property_id, &since, &until)
            })
            .await
            .map_err(SyncError::api(PLATFORM))?;
            rows.extend(chunk);
        }

        let records = filter_valid_records(transform_ga_rows(&source.user_id, &source.id, &rows));
        let data_points = store_metrics(
            self.store.clone(),
            &source.user_id,
            &source.id,
            records,
            self.batches,
        )
        .await?;
        mark_synced(&self.store, &source.id);

        info!(
            source_id = %source.id,
            days = rows.len(),
            data_points,
            "Google Analytics sync complete"
        );

        Ok(GaSyncResult {
            success: true,
            data_points,
            date_range: DateRange::new(start, end),
        })
    }

    pub async fn realtime_active_users(&self, source_id: &str) -> Result<f64, SyncError> {
        let (source, client) = self.authorized_client(source_id).await?;
        let property_id = stored_property(&source).ok_or_else(no_property)?;
        client
            .get_realtime_active_users(property_id)
            .await
            .map_err(SyncError::api(PLATFORM))
    }

    pub async fn top_pages(&self, source_id: &str, limit: u32) -> Result<Vec<TopPage>, SyncError> {
        let (source, client) = self.authorized_client(source_id).await?;
        let property_id = stored_property(&source).ok_or_else(no_property)?;
        client
            .get_top_pages(property_id, limit)
            .await
            .map_err(SyncError::api(PLATFORM))
    }

    pub async fn traffic_sources(
        &self,
        source_id: &str,
        limit: u32,
    ) -> Result<Vec<TrafficSource>, SyncError> {
        let (source, client) = self.authorized_client(source_id).await?;
        let property_id = stored_property(&source).ok_or_else(no_property)?;
        client
            .get_traffic_sources(property_id, limit)
            .await
            .map_err(SyncError::api(PLATFORM))
    }

    /// Refreshes the token if due (failures only logged), then builds a
    /// client from the stored access token.
    async fn authorized_client(
        &self,
        source_id: &str,
    ) -> Result<(DataSource, GoogleAnalyticsClient), SyncError> {
        if let Err(e) = self.refresher.refresh_data_source_token(source_id).await {
            warn!(source_id = %source_id, error = %e, "Token refresh failed, trying stored token");
        }

        let source = self
            .store
            .get_source(source_id)?
            .ok_or_else(|| SyncError::SourceNotFound(source_id.to_string()))?;

        let google = source
            .credentials
            .as_google()
            .ok_or_else(|| SyncError::CredentialMismatch {
                source_id: source.id.clone(),
                expected: "google",
            })?;
        let access_token = self.cipher.decrypt(&google.access_token)?;

        let client = GoogleAnalyticsClient::new(self.http.clone(), access_token, self.base_url.clone());
        Ok((source, client))
    }
}

fn stored_property(source: &DataSource) -> Option<&str> {
    source
        .credentials
        .as_google()
        .and_then(|g| g.property_id.as_deref())
        .filter(|p| !p.is_empty())
}

fn no_property() -> SyncError {
    SyncError::MissingConfiguration("no Google Analytics property selected".to_string())
}

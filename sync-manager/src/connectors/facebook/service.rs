use super::api::{FacebookClient, INSTAGRAM_METRICS, PAGE_METRICS};
use super::transformer::{
    followers_count_record, transform_facebook_insights, transform_instagram_insights,
};
use crate::dates::{trailing_window, DateRange};
use crate::error::SyncError;
use crate::persistence::{mark_synced, store_metrics, BatchSettings};
use crate::refresh::TokenRefresher;
use crate::retry::{with_retry, RetryPolicy};
use crate::validation::filter_valid_records;
use chrono::Utc;
use marketlens::config::{AppConfig, SyncConfig};
use marketlens::credentials::TokenCipher;
use marketlens::store::Store;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

const PLATFORM: &str = "facebook";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacebookSyncResult {
    pub success: bool,
    pub record_count: usize,
    pub date_range: DateRange,
}

/// Fetch-and-store for Facebook Page sources and their linked Instagram
/// business account.
pub struct FacebookService {
    store: Arc<Store>,
    cipher: TokenCipher,
    refresher: Arc<TokenRefresher>,
    graph_url: String,
    batches: BatchSettings,
    retry: RetryPolicy,
    http: reqwest::Client,
}

impl FacebookService {
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
            config.facebook.graph_url.clone(),
            &config.sync,
        )
    }

    pub fn with_settings(
        store: Arc<Store>,
        cipher: TokenCipher,
        refresher: Arc<TokenRefresher>,
        graph_url: String,
        sync: &SyncConfig,
    ) -> Self {
        Self {
            store,
            cipher,
            refresher,
            graph_url,
            batches: BatchSettings::from_config(sync),
            retry: RetryPolicy::from_config(sync),
            http: reqwest::Client::new(),
        }
    }

    /// Syncs the last `days` days of page insights, plus Instagram insights
    /// and follower count when an Instagram account is linked.
    pub async fn fetch_and_store(
        &self,
        source_id: &str,
        user_id: &str,
        days: i64,
    ) -> Result<FacebookSyncResult, SyncError> {
        let (start, end) =
            trailing_window(days, Utc::now().date_naive()).ok_or_else(|| SyncError::window_days(days))?;
        let range = DateRange::new(start, end);

        if let Err(e) = self.refresher.refresh_data_source_token(source_id).await {
            warn!(source_id = %source_id, error = %e, "Token refresh failed, trying stored token");
        }

        let source = self
            .store
            .get_source(source_id)?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| SyncError::SourceNotFound(source_id.to_string()))?;

        let facebook = source
            .credentials
            .as_facebook()
            .ok_or_else(|| SyncError::CredentialMismatch {
                source_id: source.id.clone(),
                expected: "facebook",
            })?;

        let page_token = self.cipher.decrypt(&facebook.page_access_token)?;
        let client = FacebookClient::new(self.http.clone(), page_token, self.graph_url.clone());

        info!(
            source_id = %source.id,
            page_id = %facebook.page_id,
            since = %range.start,
            until = %range.end,
            "Starting Facebook sync"
        );

        let page_series = with_retry(self.retry, "facebook.get_page_insights", || {
            client.get_page_insights(&facebook.page_id, &PAGE_METRICS, &range.start, &range.end)
        })
        .await
        .map_err(SyncError::api(PLATFORM))?;

        let mut records = transform_facebook_insights(&source.user_id, &source.id, &page_series);

        if let Some(account_id) = facebook.instagram_account_id.as_deref() {
            let ig_series = with_retry(self.retry, "facebook.get_instagram_insights", || {
                client.get_instagram_insights(account_id, &INSTAGRAM_METRICS, &range.start, &range.end)
            })
            .await
            .map_err(SyncError::api("instagram"))?;
            records.extend(transform_instagram_insights(
                &source.user_id,
                &source.id,
                &ig_series,
            ));

            match client.get_instagram_followers_count(account_id).await {
                Ok(Some(count)) => {
                    records.push(followers_count_record(&source.user_id, &source.id, count))
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(source_id = %source.id, error = %e, "Instagram follower count unavailable")
                }
            }
        }

        let records = filter_valid_records(records);
        let record_count = store_metrics(
            self.store.clone(),
            &source.user_id,
            &source.id,
            records,
            self.batches,
        )
        .await?;
        mark_synced(&self.store, &source.id);

        info!(source_id = %source.id, record_count, "Facebook sync complete");

        Ok(FacebookSyncResult {
            success: true,
            record_count,
            date_range: range,
        })
    }
}

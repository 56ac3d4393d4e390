//! Google Analytics (GA4 Data API) connector.

pub mod api;
pub mod service;
pub mod transformer;

pub use api::{GaDailyMetrics, GoogleAnalyticsClient, TopPage, TrafficSource};
pub use service::{GaSyncRequest, GaSyncResult, GoogleAnalyticsService};

use crate::connector::{Connector, SyncOutcome};
use crate::dates::{trailing_window, DateRange};
use crate::error::SyncError;
use async_trait::async_trait;
use chrono::Utc;
use marketlens::source::{DataSource, Platform};
use std::sync::Arc;

/// Syncs the trailing window of a Google Analytics source.
pub struct GoogleAnalyticsConnector {
    service: Arc<GoogleAnalyticsService>,
    window_days: i64,
}

impl GoogleAnalyticsConnector {
    pub fn new(service: Arc<GoogleAnalyticsService>, window_days: i64) -> Self {
        Self {
            service,
            window_days,
        }
    }
}

#[async_trait]
impl Connector for GoogleAnalyticsConnector {
    fn platform(&self) -> Platform {
        Platform::GoogleAnalytics
    }

    async fn sync(&self, source: &DataSource) -> Result<SyncOutcome, SyncError> {
        let (start, end) = trailing_window(self.window_days, Utc::now().date_naive())
            .ok_or_else(|| SyncError::window_days(self.window_days))?;
        let range = DateRange::new(start, end);

        let result = self
            .service
            .fetch_and_store(GaSyncRequest {
                source_id: source.id.clone(),
                property_id: None,
                start_date: range.start,
                end_date: range.end,
            })
            .await?;

        Ok(SyncOutcome {
            records: result.data_points,
            date_range: result.date_range,
        })
    }
}

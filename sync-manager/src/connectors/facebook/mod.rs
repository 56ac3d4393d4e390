//! Facebook Page and Instagram business account connector.

pub mod api;
pub mod service;
pub mod transformer;

pub use api::{FacebookClient, InsightSeries, InsightValue};
pub use service::{FacebookService, FacebookSyncResult};

use crate::connector::{Connector, SyncOutcome};
use crate::error::SyncError;
use async_trait::async_trait;
use marketlens::source::{DataSource, Platform};
use std::sync::Arc;

pub struct FacebookConnector {
    service: Arc<FacebookService>,
    window_days: i64,
}

impl FacebookConnector {
    pub fn new(service: Arc<FacebookService>, window_days: i64) -> Self {
        Self {
            service,
            window_days,
        }
    }
}

#[async_trait]
impl Connector for FacebookConnector {
    fn platform(&self) -> Platform {
        Platform::FacebookInstagram
    }

    async fn sync(&self, source: &DataSource) -> Result<SyncOutcome, SyncError> {
        let result = self
            .service
            .fetch_and_store(&source.id, &source.user_id, self.window_days)
            .await?;

        Ok(SyncOutcome {
            records: result.record_count,
            date_range: result.date_range,
        })
    }
}

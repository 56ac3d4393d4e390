//! Async wrappers over the blocking metric store.

use crate::error::SyncError;
use chrono::Utc;
use marketlens::config::SyncConfig;
use marketlens::metric::MetricRecord;
use marketlens::store::Store;
use std::sync::Arc;
use tracing::{debug, warn};

/// Insert batching for [`store_metrics`].
#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    pub batch_size: usize,
}

impl BatchSettings {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            batch_size: config.insert_batch_size,
        }
    }
}

/// Replaces the source's rows for every date in `records`.
pub async fn store_metrics(
    store: Arc<Store>,
    user_id: &str,
    source_id: &str,
    records: Vec<MetricRecord>,
    settings: BatchSettings,
) -> Result<usize, SyncError> {
    let user_id = user_id.to_string();
    let source_id = source_id.to_string();

    let inserted = tokio::task::spawn_blocking(move || {
        store.replace_metrics(&user_id, &source_id, &records, settings.batch_size)
    })
    .await
    .map_err(|e| SyncError::Task(e.to_string()))??;

    debug!(inserted, "Metric rows replaced");
    Ok(inserted)
}

/// Stamps `last_synced_at`. Failures are logged and swallowed.
pub fn mark_synced(store: &Store, source_id: &str) {
    if let Err(e) = store.touch_last_synced(source_id, Utc::now()) {
        warn!(source_id = %source_id, error = %e, "Failed to update last_synced_at");
    }
}

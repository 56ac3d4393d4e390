//! Multi-source sync coordinator.
//!
//! Each source syncs under its own lease so that a refresh, fetch and
//! persist of one source never interleaves with another run for the same
//! source. Different sources run concurrently.

use crate::connector::SyncOutcome;
use crate::dates::DateRange;
use crate::error::SyncError;
use crate::registry::ConnectorRegistry;
use dashmap::DashMap;
use futures::future::join_all;
use marketlens::source::{DataSource, Platform};
use marketlens::store::Store;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info};

/// Per-source async leases.
///
/// An entry lives only while its lease is held or awaited, so the map stays
/// as small as the set of sources currently syncing.
#[derive(Default)]
pub struct SourceLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive use of `source_id`; released on drop.
    pub async fn acquire(&self, source_id: &str) -> SourceLease<'_> {
        let lock = self
            .locks
            .entry(source_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        SourceLease {
            locks: self,
            source_id: source_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of sources with a held or awaited lease.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive hold on one source.
pub struct SourceLease<'a> {
    locks: &'a SourceLocks,
    source_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SourceLease<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone of the mutex, so the entry survives
        // until the last of them is done.
        self.locks
            .locks
            .remove_if(&self.source_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSyncResult {
    pub source_id: String,
    pub platform: Platform,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSummary {
    pub total_sources: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<SourceSyncResult>,
}

pub struct SyncCoordinator {
    store: Arc<Store>,
    registry: ConnectorRegistry,
    locks: Arc<SourceLocks>,
}

impl SyncCoordinator {
    pub fn new(store: Arc<Store>, registry: ConnectorRegistry, locks: Arc<SourceLocks>) -> Self {
        Self {
            store,
            registry,
            locks,
        }
    }

    pub fn locks(&self) -> &SourceLocks {
        &self.locks
    }

    /// Syncs every connected source of `user_id` concurrently.
    ///
    /// A failing source becomes a failure entry; it never stops the others.
    pub async fn sync_all_sources(&self, user_id: &str) -> Result<SyncSummary, SyncError> {
        let sources = self.store.list_connected_sources(user_id)?;

        info!(user_id = %user_id, source_count = sources.len(), "Syncing all sources");

        let results = join_all(sources.iter().map(|source| self.sync_entry(source))).await;

        let success_count = results.iter().filter(|r| r.success).count();
        let summary = SyncSummary {
            total_sources: results.len(),
            success_count,
            failure_count: results.len() - success_count,
            results,
        };

        info!(
            user_id = %user_id,
            total = summary.total_sources,
            succeeded = summary.success_count,
            failed = summary.failure_count,
            "Sync of all sources finished"
        );

        Ok(summary)
    }

    /// Syncs one source through its platform connector, holding the
    /// source's lease for the whole run.
    pub async fn sync_source(&self, source: &DataSource) -> Result<SyncOutcome, SyncError> {
        let connector = self
            .registry
            .get(source.platform)
            .ok_or(SyncError::UnsupportedPlatform(source.platform))?;

        let _lease = self.locks.acquire(&source.id).await;
        connector.sync(source).await
    }

    async fn sync_entry(&self, source: &DataSource) -> SourceSyncResult {
        match self.sync_source(source).await {
            Ok(outcome) => SourceSyncResult {
                source_id: source.id.clone(),
                platform: source.platform,
                success: true,
                records: Some(outcome.records),
                date_range: Some(outcome.date_range),
                error: None,
            },
            Err(e) => {
                error!(
                    source_id = %source.id,
                    platform = %source.platform,
                    code = e.code(),
                    error = %e,
                    "Source sync failed"
                );
                SourceSyncResult {
                    source_id: source.id.clone(),
                    platform: source.platform,
                    success: false,
                    records: None,
                    date_range: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

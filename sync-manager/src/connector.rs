use crate::dates::DateRange;
use crate::error::SyncError;
use async_trait::async_trait;
use marketlens::source::{DataSource, Platform};
use serde::Serialize;

/// What one successful sync of a source wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub records: usize,
    pub date_range: DateRange,
}

/// Platform-specific sync driven by the coordinator.
///
/// Implementations own everything between a stored [`DataSource`] and its
/// persisted metric rows: token refresh, provider calls, transformation,
/// validation and the final replace. They hold no per-source state.
///
/// # Example
/// ```no_run
/// use async_trait::async_trait;
/// use marketlens::source::{DataSource, Platform};
/// use sync_manager::{Connector, SyncError, SyncOutcome};
///
/// struct AdsConnector;
///
/// #[async_trait]
/// impl Connector for AdsConnector {
///     fn platform(&self) -> Platform {
///         Platform::GoogleAds
///     }
///
///     async fn sync(&self, source: &DataSource) -> Result<SyncOutcome, SyncError> {
///         Err(SyncError::UnsupportedPlatform(source.platform))
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Platform whose sources this connector syncs.
    fn platform(&self) -> Platform;

    /// Syncs the default window for `source`.
    async fn sync(&self, source: &DataSource) -> Result<SyncOutcome, SyncError>;
}

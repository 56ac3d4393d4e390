use crate::connectors::api_error::ApiError;
use crate::dates::MAX_RANGE_DAYS;
use crate::refresh::RefreshError;
use marketlens::credentials::CryptoError;
use marketlens::source::Platform;
use marketlens::store::StoreError;
use thiserror::Error;

/// Failures of a fetch-and-store run or of the coordinator around it.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("data source '{0}' not found")]
    SourceNotFound(String),

    #[error("{0}")]
    MissingConfiguration(String),

    #[error("sync is not supported for platform '{0}'")]
    UnsupportedPlatform(Platform),

    #[error("data source '{source_id}' does not hold {expected} credentials")]
    CredentialMismatch {
        source_id: String,
        expected: &'static str,
    },

    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error("credential decryption failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("{platform} API error: {source}")]
    Api {
        platform: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("failed to persist metrics: {0}")]
    Persistence(#[from] StoreError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl SyncError {
    pub fn api(platform: &'static str) -> impl FnOnce(ApiError) -> SyncError {
        move |source| SyncError::Api { platform, source }
    }

    /// A trailing window whose length is not in `1..=MAX_RANGE_DAYS`.
    pub fn window_days(days: i64) -> SyncError {
        SyncError::InvalidDateRange(format!(
            "days must be between 1 and {}, got {}",
            MAX_RANGE_DAYS, days
        ))
    }

    /// Short machine-readable kind for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::SourceNotFound(_) => "source_not_found",
            SyncError::MissingConfiguration(_) => "missing_configuration",
            SyncError::UnsupportedPlatform(_) => "unsupported_platform",
            SyncError::CredentialMismatch { .. } => "credential_mismatch",
            SyncError::InvalidDateRange(_) => "invalid_date_range",
            SyncError::Refresh(_) => "refresh_failed",
            SyncError::Crypto(_) => "credential_error",
            SyncError::Api { .. } => "provider_error",
            SyncError::Persistence(_) => "persistence_error",
            SyncError::Task(_) => "internal_error",
        }
    }
}

//! Marketlens sync manager: pulls provider metrics into the store.
//!
//! # Architecture
//!
//! ```text
//!   POST /api/sync ──► SyncCoordinator ──► ConnectorRegistry
//!                            │                  │
//!                     per-source lease   GoogleAnalyticsConnector
//!                                        FacebookConnector
//!                                               │
//!        TokenRefresher ◄── fetch-and-store service ──► provider API client
//!                                               │
//!                         transformer ─► validation ─► Store::replace_metrics
//! ```
//!
//! Each source sync is strictly sequential (refresh, chunked fetch with
//! retry, transform, validate, replace). A "sync all" runs every connected
//! source of a user concurrently and reports failures per source.

pub mod api;
pub mod connector;
pub mod connectors;
pub mod dates;
pub mod error;
pub mod manager;
pub mod persistence;
pub mod refresh;
pub mod registry;
pub mod retry;
pub mod validation;

pub use api::{create_sync_router, SyncAppState};
pub use connector::{Connector, SyncOutcome};
pub use error::SyncError;
pub use manager::{SourceLease, SourceLocks, SourceSyncResult, SyncCoordinator, SyncSummary};
pub use refresh::{RefreshError, RefreshOutcome, TokenRefresher};
pub use registry::{ConnectorRegistry, SyncServices};
pub use retry::{with_retry, RetryPolicy};

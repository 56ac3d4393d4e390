//! Platform connectors: API client, transformer and fetch-and-store service
//! per provider.

pub mod api_error;
pub mod facebook;
pub mod google_analytics;

pub use api_error::ApiError;

// HTTP APIs: OAuth connect flow and data source management

mod error;
pub mod oauth;
pub mod sources;

pub use error::{AppError, ErrorResponse};
pub use oauth::{create_oauth_router, OAuthAppState, OAuthEngine};
pub use sources::{create_sources_router, SourcesAppState};

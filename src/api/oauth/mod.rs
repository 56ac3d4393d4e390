//! OAuth 2.0 authorization flow for Google and Facebook connections.
//!
//! Implements the authorization code flow:
//! 1. User clicks "Connect" in the dashboard
//! 2. GET /api/oauth/:provider/start → state cookie set, redirect to provider
//! 3. User authorizes on provider's site
//! 4. Provider redirects to /api/oauth/:provider/callback
//! 5. State checked and cookie cleared, code exchanged, data source stored
//!    with encrypted tokens
//! 6. Browser lands on the settings page with `?connected=` or `?error=`

mod engine;
pub mod exchange;
pub mod facebook;
mod provider;
pub mod state;

pub use engine::{CallbackParams, ConnectionResult, OAuthEngine, OAuthStart};
pub use exchange::ExchangeError;
pub use provider::{OAuthProvider, OAuthProviderConfig};

use crate::api::AppError;
use crate::auth::{authenticated_user, read_cookie};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Failures of the consent flow. [`OAuthError::code`] is what the browser
/// sees in the `error` query parameter.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("user denied access")]
    AccessDenied,

    #[error("provider returned error '{error}': {description}")]
    Provider { error: String, description: String },

    #[error("OAuth state mismatch")]
    InvalidState,

    #[error("no authenticated user")]
    Unauthenticated,

    #[error("{0}")]
    Configuration(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(#[from] ExchangeError),

    #[error("no Facebook pages available for this account")]
    NoPagesFound,

    #[error("failed to store connection: {0}")]
    Connection(String),

    #[error("unknown OAuth provider '{0}'")]
    UnknownProvider(String),
}

impl OAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::AccessDenied => "access_denied",
            OAuthError::Provider { .. } => "oauth_error",
            OAuthError::InvalidState => "invalid_state",
            OAuthError::Unauthenticated => "unauthorized",
            OAuthError::Configuration(_) => "configuration_error",
            OAuthError::TokenExchange(_) => "token_exchange_failed",
            OAuthError::NoPagesFound => "no_pages_found",
            OAuthError::Connection(_) => "connection_failed",
            OAuthError::UnknownProvider(_) => "unknown_provider",
        }
    }
}

/// Shared application state for OAuth API
#[derive(Clone)]
pub struct OAuthAppState {
    pub engine: Arc<OAuthEngine>,
    /// Dashboard origin, e.g. `https://app.example.com`
    pub app_url: String,
    pub settings_path: String,
    pub state_ttl_seconds: u64,
    pub secure_cookies: bool,
}

impl OAuthAppState {
    fn settings_redirect(&self, query: &str) -> Redirect {
        Redirect::temporary(&format!(
            "{}{}?{}",
            self.app_url.trim_end_matches('/'),
            self.settings_path,
            query
        ))
    }
}

/// Create OAuth API router
pub fn create_oauth_router(state: OAuthAppState) -> Router {
    Router::new()
        .route("/api/oauth/:provider/start", get(oauth_start))
        .route("/api/oauth/:provider/callback", get(oauth_callback))
        .with_state(Arc::new(state))
}

/// GET /api/oauth/:provider/start
///
/// Redirects the user to the provider's consent page.
///
/// # Security
/// - Provider must be configured (checked before anything else)
/// - Requires an authenticated caller
/// - State nonce stored in an HTTP-only cookie for 10 minutes
async fn oauth_start(
    State(state): State<Arc<OAuthAppState>>,
    Path(provider_name): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    debug!(provider = %provider_name, "OAuth start requested");

    let provider: OAuthProvider = provider_name.parse().map_err(|e: OAuthError| {
        warn!(provider = %provider_name, "Invalid OAuth provider");
        AppError::NotFound(e.to_string())
    })?;

    if let Err(e) = state.engine.provider_config(provider) {
        error!(provider = %provider, error = %e, "OAuth provider not configured");
        return Ok(state
            .settings_redirect(&format!("error={}", e.code()))
            .into_response());
    }

    let user_id = authenticated_user(&headers)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    let start = match state.engine.initiate(provider, &user_id) {
        Ok(start) => start,
        Err(e) => {
            return Ok(state
                .settings_redirect(&format!("error={}", e.code()))
                .into_response())
        }
    };

    let cookie = state::state_cookie(
        provider,
        &start.state,
        state.state_ttl_seconds,
        state.secure_cookies,
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Redirect::temporary(&start.authorization_url),
    )
        .into_response())
}

/// GET /api/oauth/:provider/callback
///
/// Always clears the state cookie, then redirects to the settings page with
/// either `connected=<provider>` or `error=<code>`.
async fn oauth_callback(
    State(state): State<Arc<OAuthAppState>>,
    Path(provider_name): Path<String>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    debug!(provider = %provider_name, "OAuth callback received");

    let provider: OAuthProvider = provider_name
        .parse()
        .map_err(|e: OAuthError| AppError::NotFound(e.to_string()))?;

    let cookie_state = read_cookie(&headers, &provider.state_cookie_name());
    let user_id = authenticated_user(&headers).ok();

    let outcome = state
        .engine
        .complete_callback(provider, user_id.as_deref(), &params, cookie_state.as_deref())
        .await;

    let redirect = match outcome {
        Ok(_) => state.settings_redirect(&format!("connected={}", provider)),
        Err(e) => {
            error!(provider = %provider, code = e.code(), error = %e, "OAuth callback failed");
            state.settings_redirect(&format!("error={}", e.code()))
        }
    };

    let clear = state::clear_state_cookie(provider, state.secure_cookies);
    Ok(([(header::SET_COOKIE, clear)], redirect).into_response())
}

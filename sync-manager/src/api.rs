//! HTTP API for triggering syncs and reading live reports.

use crate::connector::SyncOutcome;
use crate::connectors::google_analytics::{GaSyncRequest, GaSyncResult, TopPage, TrafficSource};
use crate::connectors::facebook::FacebookSyncResult;
use crate::dates::{trailing_window, DateRange, MAX_RANGE_DAYS};
use crate::error::SyncError;
use crate::manager::{SyncCoordinator, SyncSummary};
use crate::refresh::{RefreshError, RefreshOutcome};
use crate::registry::SyncServices;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use marketlens::auth::authenticated_user;
use marketlens::source::DataSource;
use marketlens::store::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_REPORT_LIMIT: u32 = 10;

/// Shared application state for the sync API
#[derive(Clone)]
pub struct SyncAppState {
    pub store: Arc<Store>,
    pub services: Arc<SyncServices>,
    pub coordinator: Arc<SyncCoordinator>,
    /// Window used when a sync request names no range
    pub default_window_days: i64,
}

/// Error body: `{"error": <code>, "message": <detail>}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub struct SyncApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl SyncApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    fn not_found(source_id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "source_not_found",
            format!("data source '{}' not found", source_id),
        )
    }
}

impl From<SyncError> for SyncApiError {
    fn from(e: SyncError) -> Self {
        let status = match &e {
            SyncError::SourceNotFound(_) => StatusCode::NOT_FOUND,
            SyncError::MissingConfiguration(_)
            | SyncError::UnsupportedPlatform(_)
            | SyncError::CredentialMismatch { .. }
            | SyncError::InvalidDateRange(_) => StatusCode::BAD_REQUEST,
            SyncError::Refresh(RefreshError::MissingRefreshToken(_)) => StatusCode::CONFLICT,
            SyncError::Refresh(_) | SyncError::Api { .. } => StatusCode::BAD_GATEWAY,
            SyncError::Crypto(_) | SyncError::Persistence(_) | SyncError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(code = e.code(), error = %e, "Sync request failed");
        }
        Self::new(status, e.code(), e.to_string())
    }
}

impl From<RefreshError> for SyncApiError {
    fn from(e: RefreshError) -> Self {
        match e {
            RefreshError::SourceNotFound(id) => Self::not_found(&id),
            other => SyncError::Refresh(other).into(),
        }
    }
}

impl IntoResponse for SyncApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.code.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GaSyncBody {
    pub property_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyBody {
    pub property_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FacebookSyncBody {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub refreshed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RealtimeResponse {
    pub active_users: f64,
}

/// Create sync API router
pub fn create_sync_router(state: SyncAppState) -> Router {
    Router::new()
        .route("/api/sync", post(sync_all))
        .route("/api/sources/:id/sync", post(sync_one))
        .route("/api/sources/:id/refresh", post(refresh_token))
        .route(
            "/api/sources/:id/google-analytics/sync",
            post(sync_google_analytics),
        )
        .route(
            "/api/sources/:id/google-analytics/property",
            put(set_property),
        )
        .route(
            "/api/sources/:id/google-analytics/realtime",
            get(ga_realtime),
        )
        .route(
            "/api/sources/:id/google-analytics/top-pages",
            get(ga_top_pages),
        )
        .route(
            "/api/sources/:id/google-analytics/traffic-sources",
            get(ga_traffic_sources),
        )
        .route("/api/sources/:id/facebook/sync", post(sync_facebook))
        .with_state(Arc::new(state))
}

fn caller(headers: &HeaderMap) -> Result<String, SyncApiError> {
    authenticated_user(headers).map_err(|e| SyncApiError::unauthorized(format!("Invalid token: {}", e)))
}

/// Loads a source owned by the caller; other users' sources read as missing.
fn owned_source(
    state: &SyncAppState,
    headers: &HeaderMap,
    source_id: &str,
) -> Result<DataSource, SyncApiError> {
    let user_id = caller(headers)?;
    state
        .store
        .get_source(source_id)
        .map_err(SyncError::from)?
        .filter(|s| s.user_id == user_id)
        .ok_or_else(|| SyncApiError::not_found(source_id))
}

/// POST /api/sync
async fn sync_all(
    State(state): State<Arc<SyncAppState>>,
    headers: HeaderMap,
) -> Result<Json<SyncSummary>, SyncApiError> {
    let user_id = caller(&headers)?;
    let summary = state.coordinator.sync_all_sources(&user_id).await?;
    Ok(Json(summary))
}

/// POST /api/sources/:id/sync
async fn sync_one(
    State(state): State<Arc<SyncAppState>>,
    Path(source_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<SyncOutcome>, SyncApiError> {
    let source = owned_source(&state, &headers, &source_id)?;
    let outcome = state.coordinator.sync_source(&source).await?;
    Ok(Json(outcome))
}

/// POST /api/sources/:id/refresh
async fn refresh_token(
    State(state): State<Arc<SyncAppState>>,
    Path(source_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RefreshResponse>, SyncApiError> {
    let source = owned_source(&state, &headers, &source_id)?;

    let _lease = state.coordinator.locks().acquire(&source.id).await;
    let outcome = state
        .services
        .refresher
        .refresh_data_source_token(&source.id)
        .await?;

    let response = match outcome {
        RefreshOutcome::NotNeeded => RefreshResponse {
            refreshed: false,
            expires_at: source.credentials.expires_at(),
        },
        RefreshOutcome::Refreshed { expires_at } => RefreshResponse {
            refreshed: true,
            expires_at,
        },
    };
    Ok(Json(response))
}

/// POST /api/sources/:id/google-analytics/sync
///
/// Body fields are optional; the range defaults to the trailing sync window
/// and the property to the one stored on the source.
async fn sync_google_analytics(
    State(state): State<Arc<SyncAppState>>,
    Path(source_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<GaSyncBody>>,
) -> Result<Json<GaSyncResult>, SyncApiError> {
    let source = owned_source(&state, &headers, &source_id)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();

    let default_range = trailing_window(state.default_window_days, Utc::now().date_naive())
        .map(|(start, end)| DateRange::new(start, end))
        .ok_or_else(|| SyncError::window_days(state.default_window_days))?;

    let request = GaSyncRequest {
        source_id: source.id.clone(),
        property_id: body.property_id,
        start_date: body.start_date.unwrap_or(default_range.start),
        end_date: body.end_date.unwrap_or(default_range.end),
    };

    let _lease = state.coordinator.locks().acquire(&source.id).await;
    let result = state.services.google_analytics.fetch_and_store(request).await?;
    Ok(Json(result))
}

/// PUT /api/sources/:id/google-analytics/property
async fn set_property(
    State(state): State<Arc<SyncAppState>>,
    Path(source_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<PropertyBody>,
) -> Result<StatusCode, SyncApiError> {
    let source = owned_source(&state, &headers, &source_id)?;

    let property_id = body.property_id.trim();
    if property_id.is_empty() {
        return Err(SyncApiError::new(
            StatusCode::BAD_REQUEST,
            "missing_configuration",
            "property_id must not be empty",
        ));
    }

    if source.credentials.as_google().is_none() {
        return Err(SyncError::CredentialMismatch {
            source_id: source.id,
            expected: "google",
        }
        .into());
    }

    state
        .store
        .set_google_property(&source.id, property_id)
        .map_err(SyncError::from)?;

    info!(source_id = %source.id, property_id = %property_id, "Google Analytics property set");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/sources/:id/facebook/sync
async fn sync_facebook(
    State(state): State<Arc<SyncAppState>>,
    Path(source_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<FacebookSyncBody>>,
) -> Result<Json<FacebookSyncResult>, SyncApiError> {
    let source = owned_source(&state, &headers, &source_id)?;
    let days = body
        .and_then(|Json(b)| b.days)
        .unwrap_or(state.default_window_days);
    if !(1..=MAX_RANGE_DAYS).contains(&days) {
        return Err(SyncError::window_days(days).into());
    }

    let _lease = state.coordinator.locks().acquire(&source.id).await;
    let result = state
        .services
        .facebook
        .fetch_and_store(&source.id, &source.user_id, days)
        .await?;
    Ok(Json(result))
}

/// GET /api/sources/:id/google-analytics/realtime
async fn ga_realtime(
    State(state): State<Arc<SyncAppState>>,
    Path(source_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RealtimeResponse>, SyncApiError> {
    let source = owned_source(&state, &headers, &source_id)?;
    let active_users = state
        .services
        .google_analytics
        .realtime_active_users(&source.id)
        .await?;
    Ok(Json(RealtimeResponse { active_users }))
}

/// GET /api/sources/:id/google-analytics/top-pages?limit=N
async fn ga_top_pages(
    State(state): State<Arc<SyncAppState>>,
    Path(source_id): Path<String>,
    Query(query): Query<LimitQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<TopPage>>, SyncApiError> {
    let source = owned_source(&state, &headers, &source_id)?;
    let pages = state
        .services
        .google_analytics
        .top_pages(&source.id, query.limit.unwrap_or(DEFAULT_REPORT_LIMIT))
        .await?;
    Ok(Json(pages))
}

/// GET /api/sources/:id/google-analytics/traffic-sources?limit=N
async fn ga_traffic_sources(
    State(state): State<Arc<SyncAppState>>,
    Path(source_id): Path<String>,
    Query(query): Query<LimitQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<TrafficSource>>, SyncApiError> {
    let source = owned_source(&state, &headers, &source_id)?;
    let sources = state
        .services
        .google_analytics
        .traffic_sources(&source.id, query.limit.unwrap_or(DEFAULT_REPORT_LIMIT))
        .await?;
    Ok(Json(sources))
}

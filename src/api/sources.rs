//! Listing and disconnecting a user's data sources.

use super::oauth::OAuthEngine;
use super::AppError;
use crate::auth::authenticated_user;
use crate::source::{ConnectionStatus, DataSource, DataSourceSummary};
use crate::store::Store;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct SourcesAppState {
    pub store: Arc<Store>,
    pub engine: Arc<OAuthEngine>,
}

pub fn create_sources_router(state: SourcesAppState) -> Router {
    Router::new()
        .route("/api/sources", get(list_sources))
        .route("/api/sources/:id/disconnect", post(disconnect_source))
        .with_state(Arc::new(state))
}

/// GET /api/sources
async fn list_sources(
    State(state): State<Arc<SourcesAppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<DataSourceSummary>>, AppError> {
    let user_id = authenticated_user(&headers)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    let sources = state.store.list_sources_by_user(&user_id).map_err(|e| {
        error!(user_id = %user_id, error = %e, "Failed to list data sources");
        AppError::ServerError(format!("Failed to list data sources: {}", e))
    })?;

    Ok(Json(sources.iter().map(DataSource::summary).collect()))
}

/// POST /api/sources/:id/disconnect
///
/// Revokes the provider grant where possible and marks the source
/// `disconnected`. Metric rows are kept.
async fn disconnect_source(
    State(state): State<Arc<SourcesAppState>>,
    Path(source_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DataSourceSummary>, AppError> {
    let user_id = authenticated_user(&headers)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    let source = state
        .store
        .get_source(&source_id)
        .map_err(|e| AppError::ServerError(e.to_string()))?
        .filter(|source| source.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("Data source '{}' not found", source_id)))?;

    state.engine.revoke(&source).await;

    state
        .store
        .set_status(&source.id, ConnectionStatus::Disconnected)
        .map_err(|e| {
            error!(source_id = %source.id, error = %e, "Failed to disconnect data source");
            AppError::ServerError(e.to_string())
        })?;

    info!(source_id = %source.id, platform = %source.platform, "Data source disconnected");

    let mut summary = source.summary();
    summary.status = ConnectionStatus::Disconnected;
    Ok(Json(summary))
}

use anyhow::{anyhow, Context, Result};
use marketlens::config::AppConfig;
use marketlens::credentials::TokenCipher;
use marketlens::store::Store;
use std::sync::Arc;
use sync_manager::{
    create_sync_router, ConnectorRegistry, SourceLocks, SyncAppState, SyncCoordinator,
    SyncServices,
};
use tower_http::cors::CorsLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sync_manager=info,marketlens=info".into()),
        )
        .init();

    info!("Sync manager starting...");

    let config = AppConfig::load().map_err(|e| anyhow!("Failed to load configuration: {}", e))?;

    let encryption_key = config
        .storage
        .encryption_key
        .as_deref()
        .context("MARKETLENS_ENCRYPTION_KEY is required (base64-encoded 32-byte key)")?;
    let cipher = TokenCipher::new(encryption_key).context("Invalid encryption key")?;

    let store = Arc::new(
        Store::open(&config.storage.database_path).context("Failed to initialize store")?,
    );
    info!(database = %config.storage.database_path, "Store initialized");

    let services = Arc::new(SyncServices::new(Arc::clone(&store), cipher, &config));
    let registry = ConnectorRegistry::from_services(&services, config.sync.default_window_days);
    info!(platforms = ?registry.platforms(), "Connectors registered");

    let coordinator = Arc::new(SyncCoordinator::new(
        Arc::clone(&store),
        registry,
        Arc::new(SourceLocks::new()),
    ));

    let router = create_sync_router(SyncAppState {
        store,
        services,
        coordinator,
        default_window_days: config.sync.default_window_days,
    })
    .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.server.sync_port))
        .await
        .context("Failed to bind sync API port")?;
    info!(port = config.server.sync_port, "Sync API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("Sync API server error")?;

    info!("Sync manager stopped");
    Ok(())
}

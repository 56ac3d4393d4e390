use anyhow::{anyhow, Context, Result};
use marketlens::api::{
    create_oauth_router, create_sources_router, OAuthAppState, OAuthEngine, SourcesAppState,
};
use marketlens::config::AppConfig;
use marketlens::credentials::TokenCipher;
use marketlens::store::Store;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketlens=info".into()),
        )
        .init();

    info!("Marketlens starting...");

    let config = AppConfig::load().map_err(|e| anyhow!("Failed to load configuration: {}", e))?;

    let encryption_key = config
        .storage
        .encryption_key
        .as_deref()
        .context("MARKETLENS_ENCRYPTION_KEY is required (base64-encoded 32-byte key)")?;
    let cipher = TokenCipher::new(encryption_key).context("Invalid encryption key")?;

    if !config.google.is_configured() {
        warn!("Google OAuth is not configured; connecting Google Analytics will fail");
    }
    if !config.facebook.is_configured() {
        warn!("Facebook OAuth is not configured; connecting Facebook pages will fail");
    }

    let store = Arc::new(
        Store::open(&config.storage.database_path).context("Failed to initialize store")?,
    );
    info!(database = %config.storage.database_path, "Store initialized");

    let engine = Arc::new(OAuthEngine::new(Arc::clone(&store), cipher, &config));

    let oauth_state = OAuthAppState {
        engine: Arc::clone(&engine),
        app_url: config.server.app_url.clone(),
        settings_path: config.oauth.settings_path.clone(),
        state_ttl_seconds: config.oauth.state_ttl_seconds,
        secure_cookies: config.server.secure_cookies,
    };
    let sources_state = SourcesAppState {
        store: Arc::clone(&store),
        engine,
    };

    let router = create_oauth_router(oauth_state)
        .merge(create_sources_router(sources_state))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.server.port))
        .await
        .context("Failed to bind API port")?;
    info!(port = config.server.port, "Marketlens API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("API server error")?;

    info!("Marketlens stopped");
    Ok(())
}

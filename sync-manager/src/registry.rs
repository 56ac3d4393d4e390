//! Connector registry: which platforms can be synced, and by what.

use crate::connector::Connector;
use crate::connectors::facebook::{FacebookConnector, FacebookService};
use crate::connectors::google_analytics::{GoogleAnalyticsConnector, GoogleAnalyticsService};
use crate::refresh::TokenRefresher;
use marketlens::config::AppConfig;
use marketlens::credentials::TokenCipher;
use marketlens::source::Platform;
use marketlens::store::Store;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared services behind the connectors and the sync API.
pub struct SyncServices {
    pub refresher: Arc<TokenRefresher>,
    pub google_analytics: Arc<GoogleAnalyticsService>,
    pub facebook: Arc<FacebookService>,
}

impl SyncServices {
    pub fn new(store: Arc<Store>, cipher: TokenCipher, config: &AppConfig) -> Self {
        let refresher = Arc::new(TokenRefresher::new(
            store.clone(),
            cipher.clone(),
            config.google.clone(),
            config.facebook.clone(),
            config.sync.refresh_buffer(),
        ));

        Self {
            google_analytics: Arc::new(GoogleAnalyticsService::new(
                store.clone(),
                cipher.clone(),
                refresher.clone(),
                config,
            )),
            facebook: Arc::new(FacebookService::new(store, cipher, refresher.clone(), config)),
            refresher,
        }
    }
}

/// Connectors keyed by platform. Platforms without one are reported as
/// unsupported by the coordinator.
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    connectors: HashMap<Platform, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Google Analytics and Facebook connectors syncing `window_days`.
    pub fn from_services(services: &SyncServices, window_days: i64) -> Self {
        Self::new()
            .with_connector(Arc::new(GoogleAnalyticsConnector::new(
                services.google_analytics.clone(),
                window_days,
            )))
            .with_connector(Arc::new(FacebookConnector::new(
                services.facebook.clone(),
                window_days,
            )))
    }

    /// Registers `connector`, replacing any previous one for its platform.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.insert(connector.platform(), connector);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn Connector>> {
        self.connectors.get(&platform).cloned()
    }

    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.connectors.contains_key(p))
            .collect()
    }
}

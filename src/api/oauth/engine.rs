//! Provider-independent driver of the consent flow.

use super::exchange::{self, TokenSet};
use super::facebook::{self, ManagedPage};
use super::provider::{facebook_provider_config, google_provider_config, OAuthProviderConfig};
use super::{state, OAuthError, OAuthProvider};
use crate::config::{AppConfig, FacebookProviderConfig, GoogleProviderConfig};
use crate::credentials::{
    CredentialBundle, FacebookCredentials, FacebookPage, GoogleCredentials, TokenCipher,
};
use crate::source::{DataSource, Platform};
use crate::store::Store;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of initiating a flow: where to send the browser and the nonce to
/// store in the state cookie.
#[derive(Debug, Clone)]
pub struct OAuthStart {
    pub authorization_url: String,
    pub state: String,
}

/// OAuth callback query parameters
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// A data source created or updated by a completed flow.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionResult {
    pub source_id: String,
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_name: Option<String>,
}

/// Runs the initiate and callback phases for Google and Facebook.
pub struct OAuthEngine {
    store: Arc<Store>,
    cipher: TokenCipher,
    google: GoogleProviderConfig,
    facebook: FacebookProviderConfig,
    callback_base_url: String,
    http: reqwest::Client,
}

impl OAuthEngine {
    pub fn new(store: Arc<Store>, cipher: TokenCipher, config: &AppConfig) -> Self {
        Self {
            store,
            cipher,
            google: config.google.clone(),
            facebook: config.facebook.clone(),
            callback_base_url: config.server.callback_base_url.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Client configuration of a provider, or `configuration_error`.
    pub fn provider_config(&self, provider: OAuthProvider) -> Result<OAuthProviderConfig, OAuthError> {
        match provider {
            OAuthProvider::Google => google_provider_config(&self.google),
            OAuthProvider::Facebook => facebook_provider_config(&self.facebook),
        }
    }

    /// Callback URL registered with the provider.
    pub fn redirect_uri(&self, provider: OAuthProvider) -> String {
        format!(
            "{}/api/oauth/{}/callback",
            self.callback_base_url.trim_end_matches('/'),
            provider
        )
    }

    /// Builds the consent URL and a fresh state nonce.
    pub fn initiate(&self, provider: OAuthProvider, user_id: &str) -> Result<OAuthStart, OAuthError> {
        let config = self.provider_config(provider)?;
        let state = state::generate_state();
        let authorization_url = config.build_auth_url(&state, &self.redirect_uri(provider));

        info!(provider = %provider, user_id = %user_id, "Redirecting to OAuth provider");

        Ok(OAuthStart {
            authorization_url,
            state,
        })
    }

    /// Handles the provider's redirect back to us.
    ///
    /// Checks run in order: provider-reported error, state nonce, caller
    /// identity, configuration. Only then are tokens exchanged and the
    /// (user, platform) data source written.
    pub async fn complete_callback(
        &self,
        provider: OAuthProvider,
        user_id: Option<&str>,
        params: &CallbackParams,
        cookie_state: Option<&str>,
    ) -> Result<ConnectionResult, OAuthError> {
        if let Some(error) = &params.error {
            let description = params
                .error_description
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string());
            warn!(provider = %provider, error = %error, description = %description, "OAuth authorization failed");

            if error == "access_denied" {
                return Err(OAuthError::AccessDenied);
            }
            return Err(OAuthError::Provider {
                error: error.clone(),
                description,
            });
        }

        if !state::validate_state(cookie_state, params.state.as_deref()) {
            warn!(provider = %provider, "OAuth state mismatch (possible CSRF attack)");
            return Err(OAuthError::InvalidState);
        }

        let user_id = user_id.ok_or(OAuthError::Unauthenticated)?;
        let config = self.provider_config(provider)?;

        let code = params.code.as_deref().ok_or_else(|| OAuthError::Provider {
            error: "missing_code".to_string(),
            description: "Callback carried no authorization code".to_string(),
        })?;

        debug!(provider = %provider, user_id = %user_id, "CSRF state validated");

        let result = match provider {
            OAuthProvider::Google => self.connect_google(&config, user_id, code).await?,
            OAuthProvider::Facebook => self.connect_facebook(&config, user_id, code).await?,
        };

        info!(
            provider = %provider,
            user_id = %user_id,
            source_id = %result.source_id,
            "OAuth flow completed successfully"
        );

        Ok(result)
    }

    async fn connect_google(
        &self,
        config: &OAuthProviderConfig,
        user_id: &str,
        code: &str,
    ) -> Result<ConnectionResult, OAuthError> {
        let tokens = exchange::exchange_code_for_token(
            &self.http,
            &config.token_url,
            code,
            &self.redirect_uri(OAuthProvider::Google),
            &config.client_id,
            &config.client_secret,
        )
        .await
        .map_err(OAuthError::TokenExchange)?;

        // A reconnect keeps the chosen property, and the previous refresh
        // token when Google does not issue a new one.
        let existing = self
            .store
            .find_source(user_id, Platform::GoogleAnalytics)
            .map_err(|e| OAuthError::Connection(e.to_string()))?;
        let previous = existing
            .as_ref()
            .and_then(|source| source.credentials.as_google());

        let bundle = self
            .google_bundle(&tokens, previous)
            .map_err(|e| OAuthError::Connection(e.to_string()))?;

        let source = self.save(user_id, Platform::GoogleAnalytics, &bundle)?;

        Ok(ConnectionResult {
            source_id: source.id,
            platform: source.platform,
            page_name: None,
        })
    }

    fn google_bundle(
        &self,
        tokens: &TokenSet,
        previous: Option<&GoogleCredentials>,
    ) -> Result<CredentialBundle, crate::credentials::CryptoError> {
        let refresh_token = match &tokens.refresh_token {
            Some(token) => Some(self.cipher.encrypt(token)?),
            None => previous.and_then(|p| p.refresh_token.clone()),
        };

        Ok(CredentialBundle::Google(GoogleCredentials {
            access_token: self.cipher.encrypt(&tokens.access_token)?,
            refresh_token,
            expires_at: tokens.expires_at(Utc::now()),
            token_type: tokens.token_type_or_default(),
            property_id: previous.and_then(|p| p.property_id.clone()),
        }))
    }

    async fn connect_facebook(
        &self,
        config: &OAuthProviderConfig,
        user_id: &str,
        code: &str,
    ) -> Result<ConnectionResult, OAuthError> {
        let short_lived = facebook::exchange_code(
            &self.http,
            &config.token_url,
            code,
            &self.redirect_uri(OAuthProvider::Facebook),
            &config.client_id,
            &config.client_secret,
        )
        .await
        .map_err(OAuthError::TokenExchange)?;

        let long_lived = facebook::exchange_long_lived_token(
            &self.http,
            &config.token_url,
            &short_lived.access_token,
            &config.client_id,
            &config.client_secret,
        )
        .await
        .map_err(OAuthError::TokenExchange)?;

        let pages = facebook::list_managed_pages(
            &self.http,
            &self.facebook.graph_url,
            &long_lived.access_token,
        )
        .await
        .map_err(OAuthError::TokenExchange)?;

        // TODO: let the user pick the primary page instead of taking the first.
        let primary = pages.first().cloned().ok_or(OAuthError::NoPagesFound)?;

        let bundle = self
            .facebook_bundle(&long_lived, &primary, &pages)
            .map_err(|e| OAuthError::Connection(e.to_string()))?;

        let source = self.save(user_id, Platform::FacebookInstagram, &bundle)?;

        Ok(ConnectionResult {
            source_id: source.id,
            platform: source.platform,
            page_name: Some(primary.name),
        })
    }

    fn facebook_bundle(
        &self,
        tokens: &TokenSet,
        primary: &ManagedPage,
        pages: &[ManagedPage],
    ) -> Result<CredentialBundle, crate::credentials::CryptoError> {
        let now = Utc::now();
        let expires_at = tokens
            .expires_at(now)
            .unwrap_or_else(|| now + Duration::days(self.facebook.long_lived_token_days));

        let available_pages = pages
            .iter()
            .map(|page| {
                Ok(FacebookPage {
                    id: page.id.clone(),
                    name: page.name.clone(),
                    access_token: self.cipher.encrypt(&page.access_token)?,
                    instagram_business_account: page
                        .instagram_business_account
                        .as_ref()
                        .map(|ig| ig.id.clone()),
                })
            })
            .collect::<Result<Vec<_>, crate::credentials::CryptoError>>()?;

        Ok(CredentialBundle::Facebook(FacebookCredentials {
            access_token: self.cipher.encrypt(&tokens.access_token)?,
            refresh_token: None,
            expires_at: Some(expires_at),
            token_type: tokens.token_type_or_default(),
            page_id: primary.id.clone(),
            page_name: primary.name.clone(),
            page_access_token: self.cipher.encrypt(&primary.access_token)?,
            instagram_account_id: primary
                .instagram_business_account
                .as_ref()
                .map(|ig| ig.id.clone()),
            available_pages,
        }))
    }

    fn save(
        &self,
        user_id: &str,
        platform: Platform,
        bundle: &CredentialBundle,
    ) -> Result<DataSource, OAuthError> {
        self.store
            .upsert_source(user_id, platform, bundle)
            .map_err(|e| OAuthError::Connection(e.to_string()))
    }

    /// Best-effort revocation of a source's provider grant.
    ///
    /// Only Google exposes a revoke endpoint for these tokens. Failures are
    /// logged and otherwise ignored.
    pub async fn revoke(&self, source: &DataSource) {
        let CredentialBundle::Google(google) = &source.credentials else {
            return;
        };

        // Revoking the refresh token also invalidates its access tokens.
        let ciphertext = google
            .refresh_token
            .as_deref()
            .unwrap_or(&google.access_token);

        let token = match self.cipher.decrypt(ciphertext) {
            Ok(token) => token,
            Err(e) => {
                warn!(source_id = %source.id, error = %e, "Cannot decrypt token for revocation");
                return;
            }
        };

        match exchange::revoke_token(&self.http, &self.google.revoke_url, &token).await {
            Ok(()) => info!(source_id = %source.id, "Google token revoked"),
            Err(e) => warn!(source_id = %source.id, error = %e, "Google token revocation failed"),
        }
    }
}

//! Token refresh guard, called before every provider fetch.

use chrono::{DateTime, Duration, Utc};
use marketlens::api::oauth::exchange::{self, ExchangeError};
use marketlens::config::{FacebookProviderConfig, GoogleProviderConfig};
use marketlens::credentials::{CredentialBundle, CryptoError, TokenCipher};
use marketlens::store::{Store, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("data source '{0}' not found")]
    SourceNotFound(String),

    #[error("token for '{0}' is expiring and no refresh token is stored; reconnect required")]
    MissingRefreshToken(String),

    #[error("{0} OAuth client is not configured")]
    NotConfigured(&'static str),

    #[error("credential decryption failed: {0}")]
    Crypto(#[from] CryptoError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("token refresh failed: {0}")]
    Exchange(#[from] ExchangeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No expiry stored, or the token outlives the buffer.
    NotNeeded,
    Refreshed { expires_at: Option<DateTime<Utc>> },
}

/// Refreshes stored access tokens that are about to expire.
pub struct TokenRefresher {
    store: Arc<Store>,
    cipher: TokenCipher,
    google: GoogleProviderConfig,
    facebook: FacebookProviderConfig,
    buffer: Duration,
    http: reqwest::Client,
}

impl TokenRefresher {
    pub fn new(
        store: Arc<Store>,
        cipher: TokenCipher,
        google: GoogleProviderConfig,
        facebook: FacebookProviderConfig,
        buffer: Duration,
    ) -> Self {
        Self {
            store,
            cipher,
            google,
            facebook,
            buffer,
            http: reqwest::Client::new(),
        }
    }

    /// Refreshes the source's access token if it expires within the buffer.
    ///
    /// Safe to call before every fetch: tokens without an expiry, or with
    /// one beyond the buffer, are left alone. A refresh rewrites the access
    /// token, its expiry and (when rotated) the refresh token; every other
    /// credential field stays as stored.
    pub async fn refresh_data_source_token(&self, source_id: &str) -> Result<RefreshOutcome, RefreshError> {
        let source = self
            .store
            .get_source(source_id)?
            .ok_or_else(|| RefreshError::SourceNotFound(source_id.to_string()))?;

        let Some(expires_at) = source.credentials.expires_at() else {
            debug!(source_id = %source_id, "No token expiry stored, skipping refresh");
            return Ok(RefreshOutcome::NotNeeded);
        };

        if expires_at > Utc::now() + self.buffer {
            debug!(source_id = %source_id, expires_at = %expires_at, "Token still valid");
            return Ok(RefreshOutcome::NotNeeded);
        }

        let encrypted_refresh = source
            .credentials
            .refresh_token()
            .ok_or_else(|| RefreshError::MissingRefreshToken(source_id.to_string()))?;

        let (token_url, client_id, client_secret) = match &source.credentials {
            CredentialBundle::Google(_) => {
                let (id, secret) = self
                    .google
                    .credentials()
                    .ok_or(RefreshError::NotConfigured("google"))?;
                (self.google.token_url.clone(), id, secret)
            }
            CredentialBundle::Facebook(_) => {
                let (id, secret) = self
                    .facebook
                    .credentials()
                    .ok_or(RefreshError::NotConfigured("facebook"))?;
                (self.facebook.token_url(), id, secret)
            }
        };

        let refresh_token = self.cipher.decrypt(encrypted_refresh)?;

        info!(source_id = %source_id, platform = %source.platform, "Refreshing access token");

        let tokens = exchange::refresh_access_token(
            &self.http,
            &token_url,
            &refresh_token,
            client_id,
            client_secret,
        )
        .await?;

        let new_expiry = tokens.expires_at(Utc::now());
        let access_ciphertext = self.cipher.encrypt(&tokens.access_token)?;
        let refresh_ciphertext = self.cipher.encrypt_opt(tokens.refresh_token.as_deref())?;

        self.store.update_access_token(
            source_id,
            access_ciphertext,
            new_expiry,
            refresh_ciphertext,
        )?;

        info!(
            source_id = %source_id,
            rotated_refresh_token = tokens.refresh_token.is_some(),
            "Access token refreshed"
        );

        Ok(RefreshOutcome::Refreshed {
            expires_at: new_expiry,
        })
    }
}

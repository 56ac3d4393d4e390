//! OAuth provider configurations.
//!
//! Defines OAuth 2.0 configuration for each supported external service.

use super::OAuthError;
use crate::config::{FacebookProviderConfig, GoogleProviderConfig};
use crate::source::Platform;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Providers a user can connect through the consent flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthProvider {
    Google,
    Facebook,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }

    /// Platform of the data source a successful flow creates.
    pub fn platform(&self) -> Platform {
        match self {
            OAuthProvider::Google => Platform::GoogleAnalytics,
            OAuthProvider::Facebook => Platform::FacebookInstagram,
        }
    }

    /// Name of the cookie holding this provider's pending state nonce.
    pub fn state_cookie_name(&self) -> String {
        format!("oauth_state_{}", self.as_str())
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(OAuthProvider::Google),
            "facebook" => Ok(OAuthProvider::Facebook),
            other => Err(OAuthError::UnknownProvider(other.to_string())),
        }
    }
}

/// OAuth provider configuration
#[derive(Clone, Debug)]
pub struct OAuthProviderConfig {
    /// OAuth authorization endpoint URL
    pub auth_url: String,

    /// OAuth token exchange endpoint URL
    pub token_url: String,

    /// Required OAuth scopes
    pub scopes: Vec<String>,

    /// Google expects spaces between scopes, the Facebook dialog commas
    pub scope_separator: &'static str,

    pub client_id: String,

    pub client_secret: String,

    /// Provider-specific parameters appended to the authorization URL
    pub extra_params: Vec<(&'static str, &'static str)>,
}

impl OAuthProviderConfig {
    /// Build authorization URL with state and redirect_uri
    pub fn build_auth_url(&self, state: &str, redirect_uri: &str) -> String {
        let scopes = self.scopes.join(self.scope_separator);
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&scope={}&state={}&response_type=code",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        );

        for (key, value) in &self.extra_params {
            url.push_str(&format!("&{}={}", key, urlencoding::encode(value)));
        }

        url
    }
}

/// Google consent configuration.
///
/// Always asks for offline access and forces the consent screen so every
/// authorization returns a refresh token, not only the first one.
pub fn google_provider_config(google: &GoogleProviderConfig) -> Result<OAuthProviderConfig, OAuthError> {
    let (client_id, client_secret) = google.credentials().ok_or_else(|| {
        OAuthError::Configuration(
            "Google OAuth is not configured. Set MARKETLENS_GOOGLE_CLIENT_ID and MARKETLENS_GOOGLE_CLIENT_SECRET."
                .to_string(),
        )
    })?;

    Ok(OAuthProviderConfig {
        auth_url: google.auth_url.clone(),
        token_url: google.token_url.clone(),
        scopes: google.scopes.clone(),
        scope_separator: " ",
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
        extra_params: vec![("access_type", "offline"), ("prompt", "consent")],
    })
}

/// Facebook Login dialog configuration.
pub fn facebook_provider_config(
    facebook: &FacebookProviderConfig,
) -> Result<OAuthProviderConfig, OAuthError> {
    let (app_id, app_secret) = facebook.credentials().ok_or_else(|| {
        OAuthError::Configuration(
            "Facebook OAuth is not configured. Set MARKETLENS_FACEBOOK_APP_ID and MARKETLENS_FACEBOOK_APP_SECRET."
                .to_string(),
        )
    })?;

    Ok(OAuthProviderConfig {
        auth_url: facebook.dialog_url.clone(),
        token_url: facebook.token_url(),
        scopes: facebook.scopes.clone(),
        scope_separator: ",",
        client_id: app_id.to_string(),
        client_secret: app_secret.to_string(),
        extra_params: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured_google() -> GoogleProviderConfig {
        GoogleProviderConfig {
            client_id: Some("test_client_id".to_string()),
            client_secret: Some("test_secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_provider_names() {
        assert_eq!("google".parse::<OAuthProvider>().unwrap(), OAuthProvider::Google);
        assert_eq!(
            "facebook".parse::<OAuthProvider>().unwrap(),
            OAuthProvider::Facebook
        );
        assert!(matches!(
            "github".parse::<OAuthProvider>(),
            Err(OAuthError::UnknownProvider(name)) if name == "github"
        ));
        assert_eq!(OAuthProvider::Google.state_cookie_name(), "oauth_state_google");
        assert_eq!(OAuthProvider::Facebook.platform(), Platform::FacebookInstagram);
    }

    #[test]
    fn test_build_auth_url() {
        let config = OAuthProviderConfig {
            auth_url: "https://example.com/oauth/authorize".to_string(),
            token_url: "https://example.com/oauth/token".to_string(),
            scopes: vec!["read".to_string(), "write".to_string()],
            scope_separator: " ",
            client_id: "test_client_id".to_string(),
            client_secret: "test_secret".to_string(),
            extra_params: Vec::new(),
        };

        let url = config.build_auth_url("random_state", "http://localhost:3000/callback");

        assert!(url.starts_with("https://example.com/oauth/authorize?"));
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback"));
        // URL encoding converts spaces to %20
        assert!(url.contains("scope=read%20write"));
        assert!(url.contains("state=random_state"));
        assert!(url.contains("response_type=code"));
        assert!(!url.contains("client_secret"));
    }

    #[test]
    fn test_google_requests_offline_consent() {
        let config = google_provider_config(&configured_google()).unwrap();
        let url = config.build_auth_url("s", "http://localhost:3000/cb");

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("analytics.readonly"));
    }

    #[test]
    fn test_facebook_scopes_are_comma_separated() {
        let facebook = FacebookProviderConfig {
            app_id: Some("app".to_string()),
            app_secret: Some("secret".to_string()),
            ..Default::default()
        };
        let config = facebook_provider_config(&facebook).unwrap();
        let url = config.build_auth_url("s", "http://localhost:3000/cb");

        assert!(url.contains("scope=pages_show_list%2Cpages_read_engagement"));
        assert!(!url.contains("access_type"));
        assert_eq!(
            config.token_url,
            "https://graph.facebook.com/v18.0/oauth/access_token"
        );
    }

    #[test]
    fn test_missing_credentials_is_configuration_error() {
        let result = google_provider_config(&GoogleProviderConfig::default());
        assert!(matches!(result, Err(OAuthError::Configuration(_))));

        let result = facebook_provider_config(&FacebookProviderConfig::default());
        assert!(matches!(result, Err(OAuthError::Configuration(_))));
    }
}

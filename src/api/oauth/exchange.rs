//! OAuth token endpoint calls.
//!
//! Handles exchanging authorization codes for access tokens, refreshing
//! access tokens, and revoking them.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

/// Token endpoint failures.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("invalid token response: {0}")]
    Decode(String),
}

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenSet {
    /// Absolute expiry, measured from `now`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in.map(|seconds| now + Duration::seconds(seconds))
    }

    pub fn token_type_or_default(&self) -> String {
        self.token_type
            .clone()
            .unwrap_or_else(|| "Bearer".to_string())
    }
}

/// Exchange authorization code for access token
///
/// # Arguments
/// * `token_url` - OAuth token endpoint URL
/// * `code` - Authorization code from callback
/// * `redirect_uri` - Redirect URI used in authorization request
/// * `client_id` - OAuth client ID
/// * `client_secret` - OAuth client secret
pub async fn exchange_code_for_token(
    client: &reqwest::Client,
    token_url: &str,
    code: &str,
    redirect_uri: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<TokenSet, ExchangeError> {
    let mut form_data = HashMap::new();
    form_data.insert("grant_type", "authorization_code");
    form_data.insert("code", code);
    form_data.insert("redirect_uri", redirect_uri);
    form_data.insert("client_id", client_id);
    form_data.insert("client_secret", client_secret);

    tracing::debug!("Exchanging authorization code for token at {}", token_url);

    let token_set = post_token_form(client, token_url, &form_data).await?;

    tracing::debug!(
        "Token exchange successful, has_refresh_token={}, expires_in={:?}",
        token_set.refresh_token.is_some(),
        token_set.expires_in
    );

    Ok(token_set)
}

/// Trades a refresh token for a new access token.
///
/// The response carries a new refresh token only when the provider rotates it.
pub async fn refresh_access_token(
    client: &reqwest::Client,
    token_url: &str,
    refresh_token: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<TokenSet, ExchangeError> {
    let mut form_data = HashMap::new();
    form_data.insert("grant_type", "refresh_token");
    form_data.insert("refresh_token", refresh_token);
    form_data.insert("client_id", client_id);
    form_data.insert("client_secret", client_secret);

    tracing::debug!("Refreshing access token at {}", token_url);

    post_token_form(client, token_url, &form_data).await
}

/// Revokes a token at the provider.
pub async fn revoke_token(
    client: &reqwest::Client,
    revoke_url: &str,
    token: &str,
) -> Result<(), ExchangeError> {
    let response = client
        .post(revoke_url)
        .form(&[("token", token)])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ExchangeError::Provider { status, body });
    }

    Ok(())
}

async fn post_token_form(
    client: &reqwest::Client,
    token_url: &str,
    form_data: &HashMap<&str, &str>,
) -> Result<TokenSet, ExchangeError> {
    let response = client
        .post(token_url)
        .header("Accept", "application/json")
        .form(form_data)
        .send()
        .await?;

    parse_token_response(response).await
}

/// Reads a token endpoint response, mapping non-2xx statuses to
/// [`ExchangeError::Provider`].
pub(crate) async fn parse_token_response(
    response: reqwest::Response,
) -> Result<TokenSet, ExchangeError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ExchangeError::Provider { status, body });
    }

    response
        .json::<TokenSet>()
        .await
        .map_err(|e| ExchangeError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "access_token": "ya29.a0Af",
            "refresh_token": "1//0gRefresh",
            "expires_in": 3599,
            "token_type": "Bearer"
        }"#;

        let response: TokenSet = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "ya29.a0Af");
        assert_eq!(response.refresh_token, Some("1//0gRefresh".to_string()));
        assert_eq!(response.expires_in, Some(3599));
        assert_eq!(response.token_type_or_default(), "Bearer");
    }

    #[test]
    fn test_token_response_minimal() {
        let response: TokenSet = serde_json::from_str(r#"{"access_token": "t"}"#).unwrap();
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.expires_at(Utc::now()), None);
        assert_eq!(response.token_type_or_default(), "Bearer");
    }

    #[tokio::test]
    async fn test_exchange_posts_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "the-code".into()),
                Matcher::UrlEncoded("client_id".into(), "cid".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"at","refresh_token":"rt","expires_in":3600}"#)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let tokens = exchange_code_for_token(
            &client,
            &format!("{}/token", server.url()),
            "the-code",
            "http://localhost/cb",
            "cid",
            "secret",
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt"));
    }

    #[tokio::test]
    async fn test_refresh_provider_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded(
                "grant_type".into(),
                "refresh_token".into(),
            ))
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let result = refresh_access_token(
            &client,
            &format!("{}/token", server.url()),
            "stale",
            "cid",
            "secret",
        )
        .await;

        match result {
            Err(ExchangeError::Provider { status, body }) => {
                assert_eq!(status, 400);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_revoke_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/revoke")
            .match_body(Matcher::UrlEncoded("token".into(), "at".into()))
            .with_status(200)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        revoke_token(&client, &format!("{}/revoke", server.url()), "at")
            .await
            .unwrap();
        mock.assert_async().await;
    }
}

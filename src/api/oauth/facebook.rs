//! Facebook-specific steps of the consent flow.
//!
//! Facebook answers the code exchange with a short-lived user token. It is
//! upgraded to a long-lived (about 60 days) token, which is then used to list
//! the pages the user manages.

use super::exchange::{parse_token_response, ExchangeError, TokenSet};
use serde::Deserialize;

/// A managed page as returned by `/me/accounts`. Tokens are plaintext here.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ManagedPage {
    pub id: String,
    pub name: String,
    pub access_token: String,
    #[serde(default)]
    pub instagram_business_account: Option<InstagramAccountRef>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct InstagramAccountRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    data: Vec<ManagedPage>,
}

/// Exchanges the authorization code for a short-lived user token.
pub async fn exchange_code(
    client: &reqwest::Client,
    token_url: &str,
    code: &str,
    redirect_uri: &str,
    app_id: &str,
    app_secret: &str,
) -> Result<TokenSet, ExchangeError> {
    tracing::debug!("Exchanging Facebook authorization code");

    let response = client
        .get(token_url)
        .query(&[
            ("client_id", app_id),
            ("redirect_uri", redirect_uri),
            ("client_secret", app_secret),
            ("code", code),
        ])
        .send()
        .await?;

    parse_token_response(response).await
}

/// Upgrades a short-lived user token to a long-lived one.
pub async fn exchange_long_lived_token(
    client: &reqwest::Client,
    token_url: &str,
    short_lived_token: &str,
    app_id: &str,
    app_secret: &str,
) -> Result<TokenSet, ExchangeError> {
    tracing::debug!("Upgrading Facebook token to long-lived");

    let response = client
        .get(token_url)
        .query(&[
            ("grant_type", "fb_exchange_token"),
            ("client_id", app_id),
            ("client_secret", app_secret),
            ("fb_exchange_token", short_lived_token),
        ])
        .send()
        .await?;

    parse_token_response(response).await
}

/// Lists the pages the user manages, with a page token for each.
pub async fn list_managed_pages(
    client: &reqwest::Client,
    graph_url: &str,
    user_token: &str,
) -> Result<Vec<ManagedPage>, ExchangeError> {
    let url = format!("{}/me/accounts", graph_url.trim_end_matches('/'));

    let response = client
        .get(&url)
        .query(&[
            ("fields", "id,name,access_token,instagram_business_account"),
            ("access_token", user_token),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ExchangeError::Provider { status, body });
    }

    let accounts: AccountsResponse = response
        .json()
        .await
        .map_err(|e| ExchangeError::Decode(e.to_string()))?;

    tracing::debug!(pages = accounts.data.len(), "Facebook pages discovered");

    Ok(accounts.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_long_lived_upgrade_sends_exchange_grant() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/oauth/access_token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "fb_exchange_token".into()),
                Matcher::UrlEncoded("fb_exchange_token".into(), "short".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"long","token_type":"bearer","expires_in":5183944}"#)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let tokens = exchange_long_lived_token(
            &client,
            &format!("{}/oauth/access_token", server.url()),
            "short",
            "app",
            "secret",
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(tokens.access_token, "long");
        assert_eq!(tokens.expires_in, Some(5183944));
    }

    #[tokio::test]
    async fn test_list_managed_pages() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/me/accounts")
            .match_query(Matcher::UrlEncoded("access_token".into(), "long".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":[
                    {"id":"111","name":"Bakery","access_token":"page-tok",
                     "instagram_business_account":{"id":"ig-1"}},
                    {"id":"222","name":"Cafe","access_token":"page-tok-2"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let pages = list_managed_pages(&client, &server.url(), "long").await.unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].name, "Bakery");
        assert_eq!(
            pages[0].instagram_business_account,
            Some(InstagramAccountRef { id: "ig-1".into() })
        );
        assert_eq!(pages[1].instagram_business_account, None);
    }

    #[tokio::test]
    async fn test_list_managed_pages_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/me/accounts")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"message":"Invalid OAuth access token","code":190}}"#)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let result = list_managed_pages(&client, &server.url(), "bad").await;
        assert!(matches!(result, Err(ExchangeError::Provider { status: 400, .. })));
    }
}

use crate::connectors::api_error::{check_graph_response, ApiError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Page insight metrics requested on every sync.
pub const PAGE_METRICS: [&str; 7] = [
    "page_impressions",
    "page_impressions_unique",
    "page_engaged_users",
    "page_post_engagements",
    "page_fans",
    "page_fan_adds",
    "page_views_total",
];

/// Instagram business account metrics requested on every sync.
pub const INSTAGRAM_METRICS: [&str; 5] = [
    "impressions",
    "reach",
    "profile_views",
    "follower_count",
    "website_clicks",
];

// Permission and configuration failures: the account is not usable for
// insights, which is not a sync failure.
const INSTAGRAM_UNAVAILABLE_CODES: [i64; 3] = [10, 100, 200];

/// One metric's time series as returned by the insights edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSeries {
    pub name: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub values: Vec<InsightValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightValue {
    /// Usually a number; breakdown metrics return an object.
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub end_time: Option<String>,
}

#[derive(Deserialize)]
struct InsightsResponse {
    #[serde(default)]
    data: Vec<InsightSeries>,
}

#[derive(Deserialize)]
struct FollowersResponse {
    followers_count: Option<f64>,
}

/// Graph API client bound to a page access token.
pub struct FacebookClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl FacebookClient {
    /// `base_url` is the versioned Graph root, e.g.
    /// `https://graph.facebook.com/v18.0`.
    pub fn new(http_client: Client, access_token: String, base_url: String) -> Self {
        Self {
            access_token,
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Daily page insights between `since` and `until` (`YYYY-MM-DD`).
    pub async fn get_page_insights(
        &self,
        page_id: &str,
        metrics: &[&str],
        since: &str,
        until: &str,
    ) -> Result<Vec<InsightSeries>, ApiError> {
        self.insights(page_id, metrics, since, until).await
    }

    /// Daily Instagram insights.
    ///
    /// Returns an empty list when Graph reports the account unusable for
    /// insights (error codes 10, 100, 200).
    pub async fn get_instagram_insights(
        &self,
        account_id: &str,
        metrics: &[&str],
        since: &str,
        until: &str,
    ) -> Result<Vec<InsightSeries>, ApiError> {
        match self.insights(account_id, metrics, since, until).await {
            Err(e) if e.graph_code().is_some_and(|c| INSTAGRAM_UNAVAILABLE_CODES.contains(&c)) => {
                warn!(account_id = %account_id, error = %e, "Instagram insights unavailable");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Current follower count of an Instagram business account.
    pub async fn get_instagram_followers_count(&self, account_id: &str) -> Result<Option<f64>, ApiError> {
        let url = format!("{}/{}", self.base_url, account_id);
        let response = self
            .http_client
            .get(&url)
            .query(&[("fields", "followers_count")])
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let response = check_graph_response(response).await?;
        let body = response
            .json::<FollowersResponse>()
            .await
            .map_err(|e| ApiError::Decode(format!("followers response: {}", e)))?;
        Ok(body.followers_count)
    }

    async fn insights(
        &self,
        object_id: &str,
        metrics: &[&str],
        since: &str,
        until: &str,
    ) -> Result<Vec<InsightSeries>, ApiError> {
        let url = format!("{}/{}/insights", self.base_url, object_id);
        let metric = metrics.join(",");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("metric", metric.as_str()),
                ("period", "day"),
                ("since", since),
                ("until", until),
            ])
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let response = check_graph_response(response).await?;
        let body = response
            .json::<InsightsResponse>()
            .await
            .map_err(|e| ApiError::Decode(format!("insights response: {}", e)))?;
        Ok(body.data)
    }
}

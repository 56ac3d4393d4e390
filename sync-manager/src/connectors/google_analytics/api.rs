use crate::connectors::api_error::{check_response, ApiError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Daily metrics reported for `getMetrics`, in report order.
const DAILY_METRICS: [&str; 5] = [
    "screenPageViews",
    "sessions",
    "totalUsers",
    "bounceRate",
    "averageSessionDuration",
];

/// One calendar day of property metrics.
///
/// `date` is whatever the report returned (usually `YYYYMMDD`);
/// `bounce_rate` is a percentage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaDailyMetrics {
    pub date: String,
    pub page_views: f64,
    pub sessions: f64,
    pub users: f64,
    pub bounce_rate: f64,
    pub avg_session_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPage {
    pub path: String,
    pub title: String,
    pub views: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSource {
    pub source: String,
    pub sessions: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportResponse {
    #[serde(default)]
    rows: Vec<ReportRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRow {
    #[serde(default)]
    dimension_values: Vec<ReportValue>,
    #[serde(default)]
    metric_values: Vec<ReportValue>,
}

#[derive(Debug, Deserialize)]
struct ReportValue {
    #[serde(default)]
    value: String,
}

impl ReportRow {
    fn dimension(&self, index: usize) -> String {
        self.dimension_values
            .get(index)
            .map(|v| v.value.clone())
            .unwrap_or_default()
    }

    /// Numeric metric value; absent or unparsable values read as 0.
    fn metric(&self, index: usize) -> f64 {
        self.metric_values
            .get(index)
            .and_then(|v| v.value.parse().ok())
            .unwrap_or(0.0)
    }
}

/// Client for the Analytics Data API, bound to one access token.
pub struct GoogleAnalyticsClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl GoogleAnalyticsClient {
    /// `base_url` is the Data API root, e.g.
    /// `https://analyticsdata.googleapis.com/v1beta`.
    pub fn new(http_client: Client, access_token: String, base_url: String) -> Self {
        Self {
            access_token,
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// One row per day in `[start_date, end_date]`, ascending by date.
    pub async fn get_metrics(
        &self,
        property_id: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<GaDailyMetrics>, ApiError> {
        let body = json!({
            "dateRanges": [{ "startDate": start_date, "endDate": end_date }],
            "dimensions": [{ "name": "date" }],
            "metrics": DAILY_METRICS.iter().map(|m| json!({ "name": m })).collect::<Vec<_>>(),
            "orderBys": [{ "dimension": { "dimensionName": "date" }, "desc": false }],
        });

        let report = self.run("runReport", property_id, &body).await?;

        Ok(report
            .rows
            .iter()
            .map(|row| GaDailyMetrics {
                date: row.dimension(0),
                page_views: row.metric(0),
                sessions: row.metric(1),
                users: row.metric(2),
                // The API reports a 0..1 fraction.
                bounce_rate: row.metric(3) * 100.0,
                avg_session_duration: row.metric(4),
            })
            .collect())
    }

    /// Users active in the last 30 minutes.
    pub async fn get_realtime_active_users(&self, property_id: &str) -> Result<f64, ApiError> {
        let body = json!({ "metrics": [{ "name": "activeUsers" }] });
        let report = self.run("runRealtimeReport", property_id, &body).await?;
        Ok(report.rows.first().map(|row| row.metric(0)).unwrap_or(0.0))
    }

    /// Most viewed pages over the last 30 days.
    pub async fn get_top_pages(&self, property_id: &str, limit: u32) -> Result<Vec<TopPage>, ApiError> {
        let body = json!({
            "dateRanges": [{ "startDate": "30daysAgo", "endDate": "today" }],
            "dimensions": [{ "name": "pagePath" }, { "name": "pageTitle" }],
            "metrics": [{ "name": "screenPageViews" }],
            "orderBys": [{ "metric": { "metricName": "screenPageViews" }, "desc": true }],
            "limit": limit,
        });

        let report = self.run("runReport", property_id, &body).await?;
        Ok(report
            .rows
            .iter()
            .map(|row| TopPage {
                path: row.dimension(0),
                title: row.dimension(1),
                views: row.metric(0),
            })
            .collect())
    }

    /// Session sources by volume over the last 30 days.
    pub async fn get_traffic_sources(
        &self,
        property_id: &str,
        limit: u32,
    ) -> Result<Vec<TrafficSource>, ApiError> {
        let body = json!({
            "dateRanges": [{ "startDate": "30daysAgo", "endDate": "today" }],
            "dimensions": [{ "name": "sessionSource" }],
            "metrics": [{ "name": "sessions" }],
            "orderBys": [{ "metric": { "metricName": "sessions" }, "desc": true }],
            "limit": limit,
        });

        let report = self.run("runReport", property_id, &body).await?;
        Ok(report
            .rows
            .iter()
            .map(|row| TrafficSource {
                source: row.dimension(0),
                sessions: row.metric(0),
            })
            .collect())
    }

    async fn run(&self, method: &str, property_id: &str, body: &Value) -> Result<ReportResponse, ApiError> {
        let url = format!(
            "{}/properties/{}:{}",
            self.base_url,
            property_number(property_id),
            method
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;

        let response = check_response(response).await?;
        response
            .json::<ReportResponse>()
            .await
            .map_err(|e| ApiError::Decode(format!("{} response: {}", method, e)))
    }
}

/// Accepts both `123456` and `properties/123456`.
pub fn property_number(property_id: &str) -> &str {
    property_id
        .trim()
        .strip_prefix("properties/")
        .unwrap_or(property_id.trim())
}

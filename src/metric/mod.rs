//! Unified metric records.
//!
//! Every platform's data ends up as a flat list of [`MetricRecord`]s: one
//! (user, source, metric type, date) observation each.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::source::UnknownVariant;

/// Closed set of metric types accepted by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    PageViews,
    Sessions,
    Users,
    BounceRate,
    AvgSessionDuration,
    PagesPerSession,
    EngagementRate,
    Impressions,
    Reach,
    Engagement,
    PostEngagements,
    Followers,
    NewFollowers,
    InstagramImpressions,
    InstagramReach,
    InstagramFollowers,
    InstagramNewFollowers,
    ProfileViews,
    WebsiteClicks,
}

impl MetricType {
    pub const ALL: [MetricType; 19] = [
        MetricType::PageViews,
        MetricType::Sessions,
        MetricType::Users,
        MetricType::BounceRate,
        MetricType::AvgSessionDuration,
        MetricType::PagesPerSession,
        MetricType::EngagementRate,
        MetricType::Impressions,
        MetricType::Reach,
        MetricType::Engagement,
        MetricType::PostEngagements,
        MetricType::Followers,
        MetricType::NewFollowers,
        MetricType::InstagramImpressions,
        MetricType::InstagramReach,
        MetricType::InstagramFollowers,
        MetricType::InstagramNewFollowers,
        MetricType::ProfileViews,
        MetricType::WebsiteClicks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::PageViews => "page_views",
            MetricType::Sessions => "sessions",
            MetricType::Users => "users",
            MetricType::BounceRate => "bounce_rate",
            MetricType::AvgSessionDuration => "avg_session_duration",
            MetricType::PagesPerSession => "pages_per_session",
            MetricType::EngagementRate => "engagement_rate",
            MetricType::Impressions => "impressions",
            MetricType::Reach => "reach",
            MetricType::Engagement => "engagement",
            MetricType::PostEngagements => "post_engagements",
            MetricType::Followers => "followers",
            MetricType::NewFollowers => "new_followers",
            MetricType::InstagramImpressions => "instagram_impressions",
            MetricType::InstagramReach => "instagram_reach",
            MetricType::InstagramFollowers => "instagram_followers",
            MetricType::InstagramNewFollowers => "instagram_new_followers",
            MetricType::ProfileViews => "profile_views",
            MetricType::WebsiteClicks => "website_clicks",
        }
    }

    /// Percentage metrics, capped at 100.
    pub fn is_percentage(&self) -> bool {
        matches!(self, MetricType::BounceRate | MetricType::EngagementRate)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "metric type",
                value: s.to_string(),
            })
    }
}

/// One metric observation.
///
/// `metric_type` stays a plain string until validation so that provider
/// names with no mapping can be reported instead of silently dropped.
/// Facebook and Instagram records also carry `metric_name` and a metadata
/// object with the provider's original metric name and reporting period.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub user_id: String,
    pub source_id: String,
    pub metric_type: String,
    pub value: f64,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl MetricRecord {
    pub fn new(
        user_id: impl Into<String>,
        source_id: impl Into<String>,
        metric_type: MetricType,
        value: f64,
        date: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            source_id: source_id.into(),
            metric_type: metric_type.as_str().to_string(),
            value,
            date: date.into(),
            metric_name: None,
            metadata: None,
        }
    }

    /// Parsed metric type, if it belongs to the closed set.
    pub fn kind(&self) -> Option<MetricType> {
        self.metric_type.parse().ok()
    }
}

use super::api::InsightSeries;
use crate::dates::{normalize_date, today};
use marketlens::metric::{MetricRecord, MetricType};
use serde_json::json;

/// Platform-neutral name for a Graph insight metric. Unknown names are
/// returned unchanged.
pub fn map_metric_name(name: &str) -> &str {
    match name {
        "page_impressions" => MetricType::Impressions.as_str(),
        "page_impressions_unique" => MetricType::Reach.as_str(),
        "page_engaged_users" => MetricType::Engagement.as_str(),
        "page_post_engagements" => MetricType::PostEngagements.as_str(),
        "page_fans" => MetricType::Followers.as_str(),
        "page_fan_adds" => MetricType::NewFollowers.as_str(),
        "page_views_total" => MetricType::PageViews.as_str(),
        "impressions" => MetricType::InstagramImpressions.as_str(),
        "reach" => MetricType::InstagramReach.as_str(),
        "profile_views" => MetricType::ProfileViews.as_str(),
        "follower_count" => MetricType::InstagramNewFollowers.as_str(),
        "website_clicks" => MetricType::WebsiteClicks.as_str(),
        "followers_count" => MetricType::InstagramFollowers.as_str(),
        other => other,
    }
}

pub fn transform_facebook_insights(
    user_id: &str,
    source_id: &str,
    series: &[InsightSeries],
) -> Vec<MetricRecord> {
    pivot(user_id, source_id, series, "facebook")
}

pub fn transform_instagram_insights(
    user_id: &str,
    source_id: &str,
    series: &[InsightSeries],
) -> Vec<MetricRecord> {
    pivot(user_id, source_id, series, "instagram")
}

/// Lifetime follower count, dated today.
pub fn followers_count_record(user_id: &str, source_id: &str, count: f64) -> MetricRecord {
    tagged_record(
        user_id,
        source_id,
        "followers_count",
        "lifetime",
        "instagram",
        count,
        today(),
    )
}

// One record per (metric, daily value). Non-numeric values are skipped.
fn pivot(user_id: &str, source_id: &str, series: &[InsightSeries], platform: &str) -> Vec<MetricRecord> {
    series
        .iter()
        .flat_map(|s| {
            s.values.iter().filter_map(move |point| {
                let value = point.value.as_f64()?;
                let date = point
                    .end_time
                    .as_deref()
                    .map(normalize_date)
                    .unwrap_or_else(today);
                Some(tagged_record(
                    user_id, source_id, &s.name, &s.period, platform, value, date,
                ))
            })
        })
        .collect()
}

fn tagged_record(
    user_id: &str,
    source_id: &str,
    original_metric: &str,
    period: &str,
    platform: &str,
    value: f64,
    date: String,
) -> MetricRecord {
    let metric = map_metric_name(original_metric).to_string();
    MetricRecord {
        user_id: user_id.to_string(),
        source_id: source_id.to_string(),
        metric_type: metric.clone(),
        value,
        date,
        metric_name: Some(metric),
        metadata: Some(json!({
            "original_metric": original_metric,
            "period": period,
            "platform": platform,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::facebook::api::InsightValue;
    use serde_json::Value;

    fn make_series(name: &str, points: &[(Value, &str)]) -> InsightSeries {
        InsightSeries {
            name: name.to_string(),
            period: "day".to_string(),
            values: points
                .iter()
                .map(|(value, end_time)| InsightValue {
                    value: value.clone(),
                    end_time: Some(end_time.to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_mapping_table() {
        assert_eq!(map_metric_name("page_impressions"), "impressions");
        assert_eq!(map_metric_name("page_fans"), "followers");
        assert_eq!(map_metric_name("reach"), "instagram_reach");
        assert_eq!(map_metric_name("follower_count"), "instagram_new_followers");
        assert_eq!(map_metric_name("page_video_views"), "page_video_views");
    }

    #[test]
    fn test_pivot_page_series() {
        let series = vec![
            make_series(
                "page_impressions",
                &[
                    (json!(120), "2024-01-02T08:00:00+0000"),
                    (json!(80), "2024-01-03T08:00:00+0000"),
                ],
            ),
            make_series("page_fans", &[(json!(1500), "2024-01-02T08:00:00+0000")]),
        ];

        let records = transform_facebook_insights("user-1", "source-1", &series);
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.metric_type, "impressions");
        assert_eq!(first.metric_name.as_deref(), Some("impressions"));
        assert_eq!(first.value, 120.0);
        assert_eq!(first.date, "2024-01-02");
        assert_eq!(
            first.metadata,
            Some(json!({
                "original_metric": "page_impressions",
                "period": "day",
                "platform": "facebook"
            }))
        );
        assert_eq!(records[2].metric_type, "followers");
    }

    #[test]
    fn test_non_numeric_values_skipped() {
        let series = vec![make_series(
            "page_fans_country",
            &[
                (json!({"US": 10, "DE": 3}), "2024-01-02T08:00:00+0000"),
                (Value::Null, "2024-01-03T08:00:00+0000"),
            ],
        )];
        assert!(transform_facebook_insights("u", "s", &series).is_empty());
    }

    #[test]
    fn test_instagram_records_are_tagged() {
        let series = vec![make_series("impressions", &[(json!(42), "2024-01-02T08:00:00+0000")])];
        let records = transform_instagram_insights("u", "s", &series);
        assert_eq!(records[0].metric_type, "instagram_impressions");
        assert_eq!(records[0].metadata.as_ref().unwrap()["platform"], "instagram");
    }

    #[test]
    fn test_followers_count_dated_today() {
        let record = followers_count_record("u", "s", 980.0);
        assert_eq!(record.metric_type, "instagram_followers");
        assert_eq!(record.date, today());
        assert_eq!(record.metadata.as_ref().unwrap()["period"], "lifetime");
    }
}

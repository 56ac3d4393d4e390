use super::api::GaDailyMetrics;
use crate::dates::normalize_date;
use marketlens::metric::{MetricRecord, MetricType};

/// Expands each daily row into seven records: the five reported metrics
/// plus `pages_per_session` and `engagement_rate`.
pub fn transform_ga_rows(user_id: &str, source_id: &str, rows: &[GaDailyMetrics]) -> Vec<MetricRecord> {
    rows.iter()
        .flat_map(|row| {
            let date = normalize_date(&row.date);
            let pages_per_session = if row.sessions > 0.0 {
                round2(row.page_views / row.sessions)
            } else {
                0.0
            };
            let engagement_rate = round2((1.0 - row.bounce_rate / 100.0) * 100.0);

            [
                (MetricType::PageViews, row.page_views),
                (MetricType::Sessions, row.sessions),
                (MetricType::Users, row.users),
                (MetricType::BounceRate, row.bounce_rate),
                (MetricType::AvgSessionDuration, row.avg_session_duration),
                (MetricType::PagesPerSession, pages_per_session),
                (MetricType::EngagementRate, engagement_rate),
            ]
            .into_iter()
            .map(move |(kind, value)| MetricRecord::new(user_id, source_id, kind, value, date.clone()))
        })
        .collect()
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

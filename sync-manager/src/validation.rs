//! Per-record checks run before metrics are persisted.
//!
//! A batch from a flaky provider keeps its good rows: invalid records are
//! reported and dropped, the rest go through.

use chrono::{Datelike, NaiveDate};
use marketlens::metric::{MetricRecord, MetricType};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

/// One problem found on a record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("unknown metric type '{0}'")]
    UnknownMetricType(String),

    #[error("value must be a finite number")]
    NonFinite,

    #[error("value must not be negative (got {0})")]
    Negative(f64),

    #[error("{metric} must be at most 100 (got {value})")]
    PercentageOutOfRange { metric: String, value: f64 },

    #[error("date '{0}' is not in YYYY-MM-DD format")]
    DateFormat(String),

    #[error("date '{0}' is not a calendar date")]
    InvalidCalendarDate(String),

    #[error("date '{0}' is outside 2000-2100")]
    DateOutOfRange(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordValidation {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

/// Partition of a batch into accepted and rejected records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchValidation {
    pub valid: Vec<MetricRecord>,
    pub invalid: Vec<InvalidRecord>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidRecord {
    pub record: MetricRecord,
    pub errors: Vec<String>,
}

pub fn validate_metric_record(record: &MetricRecord) -> RecordValidation {
    let mut errors = Vec::new();

    if record.user_id.trim().is_empty() {
        errors.push(ValidationError::MissingField("user_id"));
    }
    if record.source_id.trim().is_empty() {
        errors.push(ValidationError::MissingField("source_id"));
    }

    let kind = if record.metric_type.trim().is_empty() {
        errors.push(ValidationError::MissingField("metric_type"));
        None
    } else {
        match record.metric_type.parse::<MetricType>() {
            Ok(kind) => Some(kind),
            Err(_) => {
                errors.push(ValidationError::UnknownMetricType(
                    record.metric_type.clone(),
                ));
                None
            }
        }
    };

    if !record.value.is_finite() {
        errors.push(ValidationError::NonFinite);
    } else if record.value < 0.0 {
        errors.push(ValidationError::Negative(record.value));
    } else if let Some(kind) = kind.filter(MetricType::is_percentage) {
        if record.value > 100.0 {
            errors.push(ValidationError::PercentageOutOfRange {
                metric: kind.to_string(),
                value: record.value,
            });
        }
    }

    if record.date.trim().is_empty() {
        errors.push(ValidationError::MissingField("date"));
    } else if let Err(e) = check_date(&record.date) {
        errors.push(e);
    }

    RecordValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

fn check_date(date: &str) -> Result<(), ValidationError> {
    let bytes = date.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(ValidationError::DateFormat(date.to_string()));
    }

    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidCalendarDate(date.to_string()))?;

    if !(MIN_YEAR..=MAX_YEAR).contains(&parsed.year()) {
        return Err(ValidationError::DateOutOfRange(date.to_string()));
    }
    Ok(())
}

pub fn validate_metric_records(records: Vec<MetricRecord>) -> BatchValidation {
    let total = records.len();
    let mut valid = Vec::with_capacity(total);
    let mut invalid = Vec::new();

    for record in records {
        let result = validate_metric_record(&record);
        if result.is_valid {
            valid.push(record);
        } else {
            invalid.push(InvalidRecord {
                record,
                errors: result.errors.iter().map(ToString::to_string).collect(),
            });
        }
    }

    BatchValidation {
        valid,
        invalid,
        total,
    }
}

/// Keeps the valid subset, warning about the rest with a small sample.
pub fn filter_valid_records(records: Vec<MetricRecord>) -> Vec<MetricRecord> {
    let batch = validate_metric_records(records);

    if !batch.invalid.is_empty() {
        let sample: Vec<String> = batch
            .invalid
            .iter()
            .take(3)
            .map(|r| {
                format!(
                    "{} {}={}: {}",
                    r.record.date,
                    r.record.metric_type,
                    r.record.value,
                    r.errors.join("; ")
                )
            })
            .collect();
        warn!(
            invalid = batch.invalid.len(),
            total = batch.total,
            sample = ?sample,
            "Dropping invalid metric records"
        );
    }

    batch.valid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(metric_type: &str, value: f64, date: &str) -> MetricRecord {
        MetricRecord {
            user_id: "user-1".to_string(),
            source_id: "source-1".to_string(),
            metric_type: metric_type.to_string(),
            value,
            date: date.to_string(),
            metric_name: None,
            metadata: None,
        }
    }

    fn errors_of(record: &MetricRecord) -> Vec<ValidationError> {
        validate_metric_record(record).errors
    }

    #[test]
    fn test_valid_record() {
        let result = validate_metric_record(&make_record("sessions", 42.0, "2024-01-15"));
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_rejects_negative_and_non_finite() {
        assert_eq!(
            errors_of(&make_record("sessions", -1.0, "2024-01-15")),
            vec![ValidationError::Negative(-1.0)]
        );
        assert_eq!(
            errors_of(&make_record("sessions", f64::NAN, "2024-01-15")),
            vec![ValidationError::NonFinite]
        );
        assert_eq!(
            errors_of(&make_record("sessions", f64::INFINITY, "2024-01-15")),
            vec![ValidationError::NonFinite]
        );
    }

    #[test]
    fn test_percentage_limits() {
        assert!(validate_metric_record(&make_record("bounce_rate", 100.0, "2024-01-15")).is_valid);
        assert!(!validate_metric_record(&make_record("bounce_rate", 100.5, "2024-01-15")).is_valid);
        assert!(!validate_metric_record(&make_record("engagement_rate", 101.0, "2024-01-15")).is_valid);
        // Counts are not capped.
        assert!(validate_metric_record(&make_record("page_views", 5000.0, "2024-01-15")).is_valid);
    }

    #[test]
    fn test_rejects_unknown_metric_type() {
        assert_eq!(
            errors_of(&make_record("page_video_views", 1.0, "2024-01-15")),
            vec![ValidationError::UnknownMetricType("page_video_views".into())]
        );
    }

    #[test]
    fn test_date_checks() {
        assert_eq!(
            errors_of(&make_record("sessions", 1.0, "2024-02-30")),
            vec![ValidationError::InvalidCalendarDate("2024-02-30".into())]
        );
        assert_eq!(
            errors_of(&make_record("sessions", 1.0, "20240215")),
            vec![ValidationError::DateFormat("20240215".into())]
        );
        assert_eq!(
            errors_of(&make_record("sessions", 1.0, "1999-12-31")),
            vec![ValidationError::DateOutOfRange("1999-12-31".into())]
        );
        assert_eq!(
            errors_of(&make_record("sessions", 1.0, "2101-01-01")),
            vec![ValidationError::DateOutOfRange("2101-01-01".into())]
        );
        assert!(validate_metric_record(&make_record("sessions", 1.0, "2024-02-29")).is_valid);
    }

    #[test]
    fn test_missing_fields() {
        let mut record = make_record("", 1.0, "");
        record.user_id.clear();
        let errors = errors_of(&record);
        assert!(errors.contains(&ValidationError::MissingField("user_id")));
        assert!(errors.contains(&ValidationError::MissingField("metric_type")));
        assert!(errors.contains(&ValidationError::MissingField("date")));
    }

    #[test]
    fn test_batch_partition_and_filter() {
        let records = vec![
            make_record("sessions", 1.0, "2024-01-01"),
            make_record("sessions", -5.0, "2024-01-02"),
            make_record("users", 3.0, "2024-01-03"),
            make_record("nope", 3.0, "2024-01-03"),
        ];

        let batch = validate_metric_records(records.clone());
        assert_eq!(batch.total, 4);
        assert_eq!(batch.valid.len(), 2);
        assert_eq!(batch.invalid.len(), 2);
        assert_eq!(batch.invalid[0].record.date, "2024-01-02");

        let kept = filter_valid_records(records);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| r.value > 0.0));
    }
}

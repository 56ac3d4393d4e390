//! Calendar helpers shared by the platform services.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

const CANONICAL: &str = "%Y-%m-%d";

/// Longest range, in days, a single sync may cover.
pub const MAX_RANGE_DAYS: i64 = 3650;

/// Inclusive `YYYY-MM-DD` range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start.format(CANONICAL).to_string(),
            end: end.format(CANONICAL).to_string(),
        }
    }
}

/// Parses a date the providers may send: `YYYY-MM-DD`, compact `YYYYMMDD`,
/// or an RFC 3339 timestamp such as Graph's `end_time`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, CANONICAL) {
        return Some(date);
    }
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y%m%d") {
            return Some(date);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }
    // Graph timestamps carry a bare "+0000" offset.
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(ts.with_timezone(&Utc).date_naive());
    }
    None
}

/// Canonical `YYYY-MM-DD` form of `raw`.
///
/// Unparsable input falls back to today's date with a warning so one bad row
/// does not abort a batch.
pub fn normalize_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(date) => date.format(CANONICAL).to_string(),
        None => {
            warn!(raw = %raw, "Unparsable date, using today");
            today()
        }
    }
}

pub fn today() -> String {
    Utc::now().date_naive().format(CANONICAL).to_string()
}

/// Splits `[start, end]` into consecutive inclusive windows of at most
/// `chunk_days` days, in ascending order.
///
/// Returns an empty list when `end` precedes `start`.
pub fn split_date_range(start: NaiveDate, end: NaiveDate, chunk_days: i64) -> Vec<(NaiveDate, NaiveDate)> {
    let chunk_days = chunk_days.max(1);
    let mut chunks = Vec::new();
    let mut cursor = start;

    while cursor <= end {
        let chunk_end = Duration::try_days(chunk_days - 1)
            .and_then(|span| cursor.checked_add_signed(span))
            .map_or(end, |last| last.min(end));
        chunks.push((cursor, chunk_end));
        match chunk_end.succ_opt() {
            Some(next) => cursor = next,
            None => break,
        }
    }

    chunks
}

/// Days covered by the inclusive range `[start, end]`.
pub fn range_days(start: NaiveDate, end: NaiveDate) -> i64 {
    end.signed_duration_since(start).num_days() + 1
}

/// The `days`-long window ending `today`.
///
/// `None` when `days` is outside `1..=MAX_RANGE_DAYS`.
pub fn trailing_window(days: i64, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    if !(1..=MAX_RANGE_DAYS).contains(&days) {
        return None;
    }
    let start = today.checked_sub_signed(Duration::try_days(days - 1)?)?;
    Some((start, today))
}

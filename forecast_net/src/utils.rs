//! Utility functions for the forecast_net crate

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Parse a sampling frequency such as `daily`, `1h`, `15min`, `30s` or `2D`.
pub fn parse_frequency(frequency: &str) -> Result<Duration> {
    let trimmed = frequency.trim();
    let named = match trimmed.to_lowercase().as_str() {
        "daily" | "d" | "day" => Some(Duration::days(1)),
        "weekly" | "w" | "week" => Some(Duration::weeks(1)),
        "hourly" | "h" | "hour" => Some(Duration::hours(1)),
        "minute" | "min" | "t" => Some(Duration::minutes(1)),
        "second" | "s" | "sec" => Some(Duration::seconds(1)),
        _ => None,
    };
    if let Some(duration) = named {
        return Ok(duration);
    }

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| {
            ForecastError::ValidationError(format!("Unsupported frequency: {}", frequency))
        })?;
    let (count, unit) = trimmed.split_at(split);
    let count: i64 = count.parse().map_err(|_| {
        ForecastError::ValidationError(format!("Unsupported frequency: {}", frequency))
    })?;
    if count <= 0 {
        return Err(ForecastError::ValidationError(format!(
            "Frequency must be positive: {}",
            frequency
        )));
    }

    let duration = match unit.to_lowercase().as_str() {
        "d" | "day" | "days" => Duration::try_days(count),
        "w" | "week" | "weeks" => Duration::try_weeks(count),
        "h" | "hour" | "hours" => Duration::try_hours(count),
        "min" | "t" | "minute" | "minutes" => Duration::try_minutes(count),
        "s" | "sec" | "second" | "seconds" => Duration::try_seconds(count),
        _ => {
            return Err(ForecastError::ValidationError(format!(
                "Unsupported frequency: {}",
                frequency
            )))
        }
    };

    duration.ok_or_else(|| {
        ForecastError::ValidationError(format!("Frequency out of range: {}", frequency))
    })
}

/// Timestamps from `start` to `end` inclusive, spaced by `step`.
///
/// Returns an empty list when `end` is before `start`. The range stops at the
/// last representable timestamp.
pub fn date_range(start: NaiveDateTime, end: NaiveDateTime, step: Duration) -> Result<Vec<NaiveDateTime>> {
    if step <= Duration::zero() {
        return Err(ForecastError::ValidationError(
            "Date range step must be positive".to_string(),
        ));
    }

    let mut timestamps = Vec::new();
    let mut current = start;
    while current <= end {
        timestamps.push(current);
        current = match current.checked_add_signed(step) {
            Some(next) => next,
            None => break,
        };
    }

    Ok(timestamps)
}

/// Parse a timestamp in one of the common CSV layouts.
pub fn parse_datetime(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    const DATETIME_FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
    ];
    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            if let Some(parsed) = date.and_hms_opt(0, 0, 0) {
                return Ok(parsed);
            }
        }
    }
    // RFC 3339 with an offset, kept in UTC
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.naive_utc());
    }

    Err(ForecastError::DateError(format!(
        "Unrecognized date format: {}",
        text
    )))
}

//! # Date Formatting
//!
//! Human-readable dates (`January 15, 2024`), relative phrases
//! (`about 2 hours ago`) and lenient parsing of loosely typed input.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Relative phrases follow date-fns distance buckets
//! - 1.0.0: Initial release

use anyhow::{anyhow, bail, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use log::debug;
use serde_json::Value;
use std::fmt;

/// `January 15, 2024`
pub const DATE_PATTERN: &str = "%B %-d, %Y";
/// `Jan 15, 2024`
pub const SHORT_DATE_PATTERN: &str = "%b %-d, %Y";
/// `3:30 PM`
pub const TIME_PATTERN: &str = "%-I:%M %p";
/// `January 15, 2024 at 3:30 PM`
pub const DATE_TIME_PATTERN: &str = "%B %-d, %Y at %-I:%M %p";

const NAIVE_DATE_TIME_PATTERNS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

const MINUTES_IN_DAY: i64 = 1440;
const MINUTES_IN_MONTH: i64 = 43200;

pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    date.format(DATE_PATTERN).to_string()
}

pub fn format_short_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    date.format(SHORT_DATE_PATTERN).to_string()
}

pub fn format_time<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    date.format(TIME_PATTERN).to_string()
}

pub fn format_date_time<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    date.format(DATE_TIME_PATTERN).to_string()
}

/// Format with a strftime pattern, failing if the pattern is invalid
pub fn format_date_with<Tz: TimeZone>(date: &DateTime<Tz>, pattern: &str) -> Result<String>
where
    Tz::Offset: fmt::Display,
{
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        bail!("Invalid date format pattern: '{pattern}'");
    }

    let mut out = String::new();
    fmt::Write::write_fmt(&mut out, format_args!("{}", date.format(pattern)))
        .map_err(|_| anyhow!("Date could not be rendered with pattern '{pattern}'"))?;
    Ok(out)
}

/// Never fails: a missing date or bad pattern yields `fallback`
pub fn format_date_safely<Tz: TimeZone>(
    date: Option<&DateTime<Tz>>,
    pattern: &str,
    fallback: &str,
) -> String
where
    Tz::Offset: fmt::Display,
{
    match date.map(|d| format_date_with(d, pattern)) {
        Some(Ok(formatted)) => formatted,
        Some(Err(e)) => {
            debug!("Date formatting failed, using fallback: {e}");
            fallback.to_string()
        }
        None => fallback.to_string(),
    }
}

/// Relative phrase between `date` and `base`, e.g. `about 2 hours ago` or `in 3 days`
pub fn format_relative(date: &DateTime<Utc>, base: &DateTime<Utc>) -> String {
    if date > base {
        format!("in {}", distance_in_words(base, date))
    } else {
        format!("{} ago", distance_in_words(date, base))
    }
}

pub fn format_relative_to_now(date: &DateTime<Utc>) -> String {
    format_relative(date, &Utc::now())
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Whole calendar months from `earlier` to `later`
fn months_between(earlier: &DateTime<Utc>, later: &DateTime<Utc>) -> i64 {
    let mut months = i64::from(later.year() - earlier.year()) * 12 + i64::from(later.month())
        - i64::from(earlier.month());

    let later_rest = (later.day(), later.num_seconds_from_midnight());
    let earlier_rest = (earlier.day(), earlier.num_seconds_from_midnight());
    if months > 0 && later_rest < earlier_rest {
        months -= 1;
    }
    months
}

/// Distance buckets (`earlier <= later`)
fn distance_in_words(earlier: &DateTime<Utc>, later: &DateTime<Utc>) -> String {
    let seconds = (*later - *earlier).num_seconds();
    let minutes = (seconds as f64 / 60.0).round() as i64;

    if minutes < 2 {
        return if minutes == 0 {
            "less than a minute".to_string()
        } else {
            "1 minute".to_string()
        };
    }
    if minutes < 45 {
        return plural(minutes, "minute");
    }
    if minutes < 90 {
        return "about 1 hour".to_string();
    }
    if minutes < MINUTES_IN_DAY {
        let hours = (minutes as f64 / 60.0).round() as i64;
        return format!("about {}", plural(hours, "hour"));
    }
    if minutes < 2520 {
        return "1 day".to_string();
    }
    if minutes < MINUTES_IN_MONTH {
        let days = (minutes as f64 / MINUTES_IN_DAY as f64).round() as i64;
        return plural(days, "day");
    }
    if minutes < MINUTES_IN_MONTH * 2 {
        let months = (minutes as f64 / MINUTES_IN_MONTH as f64).round() as i64;
        return format!("about {}", plural(months, "month"));
    }

    let months = months_between(earlier, later);
    if months < 12 {
        let nearest = (minutes as f64 / MINUTES_IN_MONTH as f64).round() as i64;
        return plural(nearest, "month");
    }

    let years = months / 12;
    match months % 12 {
        0..=2 => format!("about {}", plural(years, "year")),
        3..=8 => format!("over {}", plural(years, "year")),
        _ => format!("almost {}", plural(years + 1, "year")),
    }
}

/// Parse loosely typed input into a UTC instant.
///
/// Accepts RFC 3339, RFC 2822, `YYYY-MM-DD`, naive `YYYY-MM-DDTHH:MM:SS`
/// (taken as UTC) and numbers as milliseconds since the Unix epoch.
pub fn parse_date(input: &Value) -> Result<DateTime<Utc>> {
    match input {
        Value::String(raw) => parse_date_str(raw),
        Value::Number(n) => {
            let millis = n
                .as_f64()
                .filter(|m| m.is_finite())
                .ok_or_else(|| anyhow!("Invalid timestamp: {n}"))?;
            DateTime::<Utc>::from_timestamp_millis(millis.trunc() as i64)
                .ok_or_else(|| anyhow!("Timestamp out of range: {n}"))
        }
        other => Err(anyhow!("Cannot parse a date from {other}")),
    }
}

fn parse_date_str(raw: &str) -> Result<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        bail!("Cannot parse a date from an empty string");
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for pattern in NAIVE_DATE_TIME_PATTERNS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, pattern) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }

    Err(anyhow!("Unrecognized date: '{s}'"))
}

/// Always returns a valid instant: the parsed input, else `default`, else now
pub fn safe_parse_date(input: &Value, default: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match parse_date(input) {
        Ok(date) => date,
        Err(e) => {
            debug!("Falling back from unparseable date: {e}");
            default.unwrap_or_else(Utc::now)
        }
    }
}

pub fn is_valid_date(input: &Value) -> bool {
    parse_date(input).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset};
    use serde_json::json;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_human_formats() {
        let date = utc(2024, 1, 15, 15, 30);
        assert_eq!(format_date(&date), "January 15, 2024");
        assert_eq!(format_short_date(&date), "Jan 15, 2024");
        assert_eq!(format_time(&date), "3:30 PM");
        assert_eq!(format_date_time(&date), "January 15, 2024 at 3:30 PM");
    }

    #[test]
    fn test_formats_respect_offset() {
        let manila = FixedOffset::east_opt(8 * 3600).unwrap();
        let date = utc(2024, 1, 15, 20, 0).with_timezone(&manila);
        assert_eq!(format_date(&date), "January 16, 2024");
    }

    #[test]
    fn test_custom_pattern_and_invalid_pattern() {
        let date = utc(2024, 3, 5, 9, 5);
        assert_eq!(format_date_with(&date, "%Y/%m/%d").unwrap(), "2024/03/05");
        assert!(format_date_with(&date, "%Q").is_err());
        assert_eq!(format_date_safely(Some(&date), "%Q", "unknown"), "unknown");
        assert_eq!(format_date_safely::<Utc>(None, DATE_PATTERN, "unknown"), "unknown");
    }

    #[test]
    fn test_relative_buckets_in_past() {
        let now = utc(2024, 6, 1, 12, 0);
        let ago = |d: Duration| format_relative(&(now - d), &now);

        assert_eq!(ago(Duration::seconds(20)), "less than a minute ago");
        assert_eq!(ago(Duration::seconds(70)), "1 minute ago");
        assert_eq!(ago(Duration::minutes(10)), "10 minutes ago");
        assert_eq!(ago(Duration::minutes(50)), "about 1 hour ago");
        assert_eq!(ago(Duration::hours(2)), "about 2 hours ago");
        assert_eq!(ago(Duration::hours(30)), "1 day ago");
        assert_eq!(ago(Duration::days(5)), "5 days ago");
        assert_eq!(ago(Duration::days(40)), "about 1 month ago");
        assert_eq!(ago(Duration::days(100)), "3 months ago");
    }

    #[test]
    fn test_relative_years() {
        let now = utc(2024, 6, 1, 12, 0);
        assert_eq!(format_relative(&utc(2023, 5, 1, 12, 0), &now), "about 1 year ago");
        assert_eq!(format_relative(&utc(2022, 1, 1, 12, 0), &now), "over 2 years ago");
        assert_eq!(format_relative(&utc(2021, 7, 1, 12, 0), &now), "almost 3 years ago");
    }

    #[test]
    fn test_relative_future() {
        let now = utc(2024, 6, 1, 12, 0);
        let later = now + Duration::days(3);
        assert_eq!(format_relative(&later, &now), "in 3 days");
    }

    #[test]
    fn test_months_between_counts_full_months_only() {
        assert_eq!(months_between(&utc(2024, 1, 31, 0, 0), &utc(2024, 2, 29, 0, 0)), 0);
        assert_eq!(months_between(&utc(2024, 1, 15, 0, 0), &utc(2024, 3, 15, 0, 0)), 2);
    }

    #[test]
    fn test_parse_supported_inputs() {
        let expected = utc(2024, 1, 15, 10, 30);
        assert_eq!(parse_date(&json!("2024-01-15T10:30:00Z")).unwrap(), expected);
        assert_eq!(parse_date(&json!("2024-01-15T18:30:00+08:00")).unwrap(), expected);
        assert_eq!(parse_date(&json!("2024-01-15T10:30:00")).unwrap(), expected);
        assert_eq!(parse_date(&json!("Mon, 15 Jan 2024 10:30:00 +0000")).unwrap(), expected);
        assert_eq!(parse_date(&json!(1705314600000_i64)).unwrap(), expected);
        assert_eq!(parse_date(&json!("2024-01-15")).unwrap(), utc(2024, 1, 15, 0, 0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_date(&json!("not a date")).is_err());
        assert!(parse_date(&json!("")).is_err());
        assert!(parse_date(&json!("2024-13-45")).is_err());
        assert!(parse_date(&json!(null)).is_err());
        assert!(parse_date(&json!(true)).is_err());
        assert!(parse_date(&json!({"year": 2024})).is_err());
        assert!(!is_valid_date(&json!("yesterday-ish")));
        assert!(is_valid_date(&json!("2024-01-15")));
    }

    #[test]
    fn test_safe_parse_falls_back_to_now() {
        let before = Utc::now();
        let parsed = safe_parse_date(&json!("not a date"), None);
        let after = Utc::now();
        assert!(parsed >= before && parsed <= after);
    }

    #[test]
    fn test_safe_parse_uses_supplied_default() {
        let default = utc(2000, 1, 1, 0, 0);
        assert_eq!(safe_parse_date(&json!(null), Some(default)), default);
        assert_eq!(
            safe_parse_date(&json!("2024-01-15"), Some(default)),
            utc(2024, 1, 15, 0, 0)
        );
    }

    #[test]
    fn test_safe_round_trip_matches_direct_format() {
        let iso = json!("2024-01-15T10:30:00Z");
        let direct = format_date(&parse_date(&iso).unwrap());
        let safe = format_date_safely(Some(&safe_parse_date(&iso, None)), DATE_PATTERN, "");
        assert_eq!(safe, direct);
        assert_eq!(safe, "January 15, 2024");
    }
}

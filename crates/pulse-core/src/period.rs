//! Period-key normalisation.
//!
//! Turns the date text found in studio spreadsheets into canonical `YYYY-MM`
//! or `YYYY` keys. Equality and lexicographic ordering of those keys double
//! as chronological ordering.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PulseError;

// ── Granularity ───────────────────────────────────────────────────────────────

/// Width of a reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Month,
    Year,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }

    /// Format `date` as this granularity's period key.
    pub fn key_for(&self, date: NaiveDate) -> String {
        match self {
            Granularity::Month => date.format("%Y-%m").to_string(),
            Granularity::Year => date.format("%Y").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "month" | "monthly" | "mom" => Ok(Granularity::Month),
            "year" | "yearly" | "yoy" => Ok(Granularity::Year),
            other => Err(PulseError::InvalidGranularity(other.to_string())),
        }
    }
}

// ── Date parsing ──────────────────────────────────────────────────────────────

/// Generic formats tried when the text has no `/`.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y.%m.%d",
    "%d-%m-%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%a, %d %b %Y",
];

fn year_month_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})").expect("regex is valid"))
}

/// Parse a sheet date into a calendar date.
///
/// 1. Text containing `/` is read day-first as `DD/MM/YYYY`. Anything after
///    the year (a time, a comma) is ignored; two-digit years are 20xx.
/// 2. Otherwise RFC 3339 and a list of common layouts are tried.
/// 3. Last resort: a leading `YYYY-MM` is taken as the first of that month.
///
/// Returns `None` on any failure; callers skip the record.
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if s.contains('/') {
        return parse_day_first(s);
    }

    parse_generic(s).or_else(|| parse_year_month_prefix(s))
}

fn parse_day_first(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() < 3 {
        return None;
    }

    let day: u32 = parts[0].trim().parse().ok()?;
    let month: u32 = parts[1].trim().parse().ok()?;
    let year_text = parts[2]
        .trim()
        .split(|c: char| c.is_whitespace() || c == ',' || c == 'T')
        .next()?;
    let mut year: i32 = year_text.parse().ok()?;
    if (0..100).contains(&year) && year_text.len() == 2 {
        year += 2000;
    }

    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_generic(s: &str) -> Option<NaiveDate> {
    let normalised = match s.strip_suffix('Z') {
        Some(stripped) => format!("{}+00:00", stripped),
        None => s.to_string(),
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
        return Some(dt.date_naive());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    None
}

fn parse_year_month_prefix(s: &str) -> Option<NaiveDate> {
    let caps = year_month_prefix().captures(s)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Normalise raw date text straight to a period key.
///
/// `None` input, empty text and unparseable text all yield `None`.
pub fn normalize_period_key(raw: Option<&str>, granularity: Granularity) -> Option<String> {
    raw.and_then(parse_record_date)
        .map(|date| granularity.key_for(date))
}

// ── DateSanity ────────────────────────────────────────────────────────────────

/// Policy that rejects dates which cannot belong to real studio activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSanity {
    /// Dates in years before this are rejected.
    pub floor_year: i32,
    /// Reject dates after `today`.
    pub reject_future: bool,
    /// The studio's current local date.
    pub today: NaiveDate,
}

/// Earliest year any studio data is expected from.
pub const DEFAULT_FLOOR_YEAR: i32 = 2020;

impl DateSanity {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            floor_year: DEFAULT_FLOOR_YEAR,
            reject_future: true,
            today,
        }
    }

    pub fn accepts(&self, date: NaiveDate) -> bool {
        if date.year() < self.floor_year {
            return false;
        }
        !(self.reject_future && date > self.today)
    }

    /// Parse and validate in one step.
    pub fn sane_date(&self, raw: Option<&str>) -> Option<NaiveDate> {
        raw.and_then(parse_record_date)
            .filter(|date| self.accepts(*date))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ── day-first slash dates ───────────────────────────────────────────────

    #[test]
    fn test_slash_date_is_day_first() {
        assert_eq!(parse_record_date("01/04/2025"), Some(ymd(2025, 4, 1)));
        assert_eq!(parse_record_date("13/02/2024"), Some(ymd(2024, 2, 13)));
    }

    #[test]
    fn test_slash_date_matches_constructed_key() {
        let expected = ymd(2025, 4, 2).format("%Y-%m").to_string();
        assert_eq!(
            normalize_period_key(Some("02/04/2025"), Granularity::Month),
            Some(expected)
        );
    }

    #[test]
    fn test_slash_date_with_trailing_time() {
        assert_eq!(parse_record_date("05/06/2024 18:30:00"), Some(ymd(2024, 6, 5)));
        assert_eq!(parse_record_date("05/06/2024, 07:15"), Some(ymd(2024, 6, 5)));
    }

    #[test]
    fn test_slash_date_two_digit_year() {
        assert_eq!(parse_record_date("05/06/24"), Some(ymd(2024, 6, 5)));
    }

    #[test]
    fn test_slash_date_rejects_short_or_non_numeric() {
        assert!(parse_record_date("04/2025").is_none());
        assert!(parse_record_date("aa/04/2025").is_none());
        assert!(parse_record_date("31/02/2025").is_none());
    }

    // ── generic parsing ─────────────────────────────────────────────────────

    #[test]
    fn test_iso_dates() {
        assert_eq!(parse_record_date("2024-03-09"), Some(ymd(2024, 3, 9)));
        assert_eq!(parse_record_date("2024-03-09T10:00:00Z"), Some(ymd(2024, 3, 9)));
        assert_eq!(parse_record_date("2024-03-09 10:00:00"), Some(ymd(2024, 3, 9)));
    }

    #[test]
    fn test_named_month_dates() {
        assert_eq!(parse_record_date("9 Mar 2024"), Some(ymd(2024, 3, 9)));
        assert_eq!(parse_record_date("March 9, 2024"), Some(ymd(2024, 3, 9)));
    }

    #[test]
    fn test_year_month_prefix_fallback() {
        assert_eq!(parse_record_date("2024-07 (partial)"), Some(ymd(2024, 7, 1)));
        assert!(parse_record_date("2024-13 bogus").is_none());
    }

    #[test]
    fn test_garbage_returns_none() {
        assert!(parse_record_date("not-a-date").is_none());
        assert!(parse_record_date("").is_none());
        assert!(normalize_period_key(None, Granularity::Month).is_none());
        assert!(normalize_period_key(Some("not-a-date"), Granularity::Month).is_none());
    }

    // ── granularity ─────────────────────────────────────────────────────────

    #[test]
    fn test_year_granularity_key() {
        assert_eq!(
            normalize_period_key(Some("01/04/2025"), Granularity::Year),
            Some("2025".to_string())
        );
    }

    #[test]
    fn test_keys_sort_chronologically() {
        let mut keys = vec!["2025-01", "2024-12", "2024-02"];
        keys.sort();
        assert_eq!(keys, vec!["2024-02", "2024-12", "2025-01"]);
    }

    #[test]
    fn test_granularity_from_str() {
        assert_eq!("month".parse::<Granularity>().unwrap(), Granularity::Month);
        assert_eq!("YEARLY".parse::<Granularity>().unwrap(), Granularity::Year);
        assert!("week".parse::<Granularity>().is_err());
    }

    // ── DateSanity ──────────────────────────────────────────────────────────

    #[test]
    fn test_sanity_rejects_before_floor() {
        let sanity = DateSanity::new(ymd(2025, 6, 1));
        assert!(!sanity.accepts(ymd(2019, 12, 31)));
        assert!(sanity.accepts(ymd(2020, 1, 1)));
    }

    #[test]
    fn test_sanity_rejects_future_by_default() {
        let sanity = DateSanity::new(ymd(2025, 6, 1));
        assert!(!sanity.accepts(ymd(2025, 6, 2)));
        assert!(sanity.accepts(ymd(2025, 6, 1)));
    }

    #[test]
    fn test_sanity_can_allow_future() {
        let sanity = DateSanity {
            reject_future: false,
            ..DateSanity::new(ymd(2025, 6, 1))
        };
        assert!(sanity.accepts(ymd(2026, 1, 1)));
    }

    #[test]
    fn test_sane_date_combines_parse_and_policy() {
        let sanity = DateSanity::new(ymd(2025, 6, 1));
        assert_eq!(sanity.sane_date(Some("01/04/2025")), Some(ymd(2025, 4, 1)));
        assert!(sanity.sane_date(Some("01/04/2015")).is_none());
        assert!(sanity.sane_date(Some("garbage")).is_none());
        assert!(sanity.sane_date(None).is_none());
    }
}

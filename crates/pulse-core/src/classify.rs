//! Record classification into group keys.
//!
//! Closed-set dimensions (class format) use ordered keyword rules where the
//! first match wins. Open-set dimensions (trainer, day, time, …) are
//! normalised text and never fail.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::PulseError;
use crate::models::{is_placeholder, RawRecord, UNKNOWN};
use crate::period::parse_record_date;

// ── ClassFormat ───────────────────────────────────────────────────────────────

/// Canonical class formats offered across the studio chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassFormat {
    PowerCycle,
    Barre,
    Strength,
    Other,
}

impl ClassFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassFormat::PowerCycle => "powercycle",
            ClassFormat::Barre => "barre",
            ClassFormat::Strength => "strength",
            ClassFormat::Other => "other",
        }
    }

    /// Classify a class label. Rule order matters: a label mentioning both
    /// cycle and barre is a powercycle class.
    pub fn classify(label: &str) -> ClassFormat {
        let lower = label.to_lowercase();
        if lower.contains("power") || lower.contains("cycle") {
            ClassFormat::PowerCycle
        } else if lower.contains("barre") {
            ClassFormat::Barre
        } else if lower.contains("strength") {
            ClassFormat::Strength
        } else {
            ClassFormat::Other
        }
    }
}

impl fmt::Display for ClassFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Open-set normalisers ──────────────────────────────────────────────────────

/// Normalise a day label (`mon`, `Tues.`, `WEDNESDAY`) to its full name.
///
/// Only whole day names and their usual abbreviations are recognised.
/// Anything else is returned with its first letter capitalised.
pub fn normalize_day(label: &str) -> String {
    let trimmed = label.trim();
    let lower = trimmed.trim_end_matches('.').to_lowercase();
    let full = match lower.as_str() {
        "mon" | "monday" => Some("Monday"),
        "tue" | "tues" | "tuesday" => Some("Tuesday"),
        "wed" | "weds" | "wednesday" => Some("Wednesday"),
        "thu" | "thur" | "thurs" | "thursday" => Some("Thursday"),
        "fri" | "friday" => Some("Friday"),
        "sat" | "saturday" => Some("Saturday"),
        "sun" | "sunday" => Some("Sunday"),
        _ => None,
    };
    match full {
        Some(day) => day.to_string(),
        None => capitalize_first(trimmed),
    }
}

/// Full English name of a weekday.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

const TIME_FORMATS: &[&str] = &["%I:%M %p", "%I:%M%p", "%H:%M:%S", "%H:%M", "%I %p", "%I%p"];

/// Normalise a class time to 24-hour `HH:MM` when it can be read, otherwise
/// return the trimmed text.
pub fn normalize_time_slot(label: &str) -> String {
    let trimmed = label.trim();
    let upper = trimmed.to_uppercase();
    for fmt in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(&upper, fmt) {
            return time.format("%H:%M").to_string();
        }
    }
    trimmed.to_string()
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Grouping ──────────────────────────────────────────────────────────────────

/// Dimension records are partitioned by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    #[default]
    Format,
    Trainer,
    Day,
    Time,
    Location,
    Source,
    Stage,
    /// Everything in one group.
    All,
}

/// Group key used by [`Grouping::All`].
pub const ALL_GROUP: &str = "All";

impl Grouping {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grouping::Format => "format",
            Grouping::Trainer => "trainer",
            Grouping::Day => "day",
            Grouping::Time => "time",
            Grouping::Location => "location",
            Grouping::Source => "source",
            Grouping::Stage => "stage",
            Grouping::All => "all",
        }
    }

    /// Group key for `record`, or `None` when the relevant field is empty or
    /// a placeholder. Format classification always succeeds because `other`
    /// is part of its closed set.
    pub fn group_key(&self, record: &RawRecord) -> Option<String> {
        match self {
            Grouping::Format => Some(ClassFormat::classify(&record.class_type).as_str().to_string()),
            Grouping::All => Some(ALL_GROUP.to_string()),
            Grouping::Trainer => open_key(&record.trainer, |s| s.trim().to_string()),
            Grouping::Location => open_key(&record.location, |s| s.trim().to_string()),
            Grouping::Source => open_key(&record.source, |s| s.trim().to_string()),
            Grouping::Stage => open_key(&record.stage, |s| s.trim().to_string()),
            Grouping::Time => open_key(&record.time_slot, normalize_time_slot),
            Grouping::Day => {
                if is_placeholder(&record.day_of_week) {
                    record
                        .date
                        .as_deref()
                        .and_then(parse_record_date)
                        .map(|d| weekday_name(d.weekday()).to_string())
                } else {
                    Some(normalize_day(&record.day_of_week))
                }
            }
        }
    }
}

fn open_key(value: &str, normalise: impl Fn(&str) -> String) -> Option<String> {
    if is_placeholder(value) {
        None
    } else {
        Some(normalise(value))
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grouping {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "format" | "class" | "class-format" => Ok(Grouping::Format),
            "trainer" | "staff" | "instructor" => Ok(Grouping::Trainer),
            "day" | "weekday" => Ok(Grouping::Day),
            "time" | "slot" => Ok(Grouping::Time),
            "location" | "studio" => Ok(Grouping::Location),
            "source" => Ok(Grouping::Source),
            "stage" => Ok(Grouping::Stage),
            "all" | "none" => Ok(Grouping::All),
            other => Err(PulseError::InvalidGrouping(other.to_string())),
        }
    }
}

// ── UnclassifiedPolicy ────────────────────────────────────────────────────────

/// What to do with records whose group key cannot be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnclassifiedPolicy {
    /// Route them to an explicit `"Unknown"` group so group totals reconcile
    /// with the grand total.
    #[default]
    Bucket,
    /// Drop them from the grouped view.
    Skip,
}

impl UnclassifiedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnclassifiedPolicy::Bucket => "bucket",
            UnclassifiedPolicy::Skip => "skip",
        }
    }

    /// Apply the policy to a classifier result.
    pub fn resolve(&self, key: Option<String>) -> Option<String> {
        match (key, self) {
            (Some(key), _) => Some(key),
            (None, UnclassifiedPolicy::Bucket) => Some(UNKNOWN.to_string()),
            (None, UnclassifiedPolicy::Skip) => None,
        }
    }
}

impl FromStr for UnclassifiedPolicy {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bucket" | "keep" => Ok(UnclassifiedPolicy::Bucket),
            "skip" | "drop" => Ok(UnclassifiedPolicy::Skip),
            other => Err(PulseError::Config(format!(
                "unknown unclassified policy \"{}\"",
                other
            ))),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

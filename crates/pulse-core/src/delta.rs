//! Period-over-period change calculation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::formatting::format_number;

/// How a metric's change is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Already a percentage (fill rate, conversion rate): change in points.
    Ratio,
    /// A count: relative change in percent.
    Count,
    /// A money amount: relative change in percent.
    Currency,
}

/// Signed change between two periods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "lowercase")]
pub enum Delta {
    /// Percentage-point difference.
    Points(f64),
    /// Relative change in percent.
    Percent(f64),
    /// No meaningful change exists (previous value was zero).
    Undefined,
}

impl Delta {
    /// Compute the change from `previous` to `current`.
    pub fn between(current: f64, previous: f64, kind: MetricKind) -> Delta {
        if !current.is_finite() || !previous.is_finite() {
            return Delta::Undefined;
        }
        match kind {
            MetricKind::Ratio => Delta::Points(current - previous),
            MetricKind::Count | MetricKind::Currency => {
                if previous == 0.0 {
                    Delta::Undefined
                } else {
                    Delta::Percent((current - previous) / previous * 100.0)
                }
            }
        }
    }

    /// Render with `decimals` places, e.g. `+2.5pp`, `-12.0%` or `-`.
    ///
    /// Positive values carry a `+`; negative values already show their sign.
    pub fn render(&self, decimals: u32) -> String {
        match self {
            Delta::Points(v) => format!("{}pp", signed(*v, decimals)),
            Delta::Percent(v) => format!("{}%", signed(*v, decimals)),
            Delta::Undefined => "-".to_string(),
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(1))
    }
}

fn signed(value: f64, decimals: u32) -> String {
    let text = format_number(value, decimals);
    if value > 0.0 && text.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("+{}", text)
    } else {
        text
    }
}

/// The two most recent keys of an ascending-sorted period list, as
/// `(previous, current)`.
///
/// Returns `None` with fewer than two periods.
pub fn latest_pair<S: AsRef<str>>(sorted_keys: &[S]) -> Option<(&str, &str)> {
    match sorted_keys {
        [.., previous, current] => Some((previous.as_ref(), current.as_ref())),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_delta_percent() {
        let d = Delta::between(100.0, 80.0, MetricKind::Count);
        assert_eq!(d, Delta::Percent(25.0));
        assert_eq!(d.render(1), "+25.0%");
    }

    #[test]
    fn test_count_delta_from_zero_is_undefined() {
        let d = Delta::between(100.0, 0.0, MetricKind::Count);
        assert_eq!(d, Delta::Undefined);
        assert_eq!(d.render(1), "-");
    }

    #[test]
    fn test_currency_delta_negative() {
        let d = Delta::between(750.0, 1000.0, MetricKind::Currency);
        assert_eq!(d.render(1), "-25.0%");
    }

    #[test]
    fn test_ratio_delta_is_points() {
        let d = Delta::between(42.5, 40.0, MetricKind::Ratio);
        assert_eq!(d, Delta::Points(2.5));
        assert_eq!(d.render(1), "+2.5pp");
    }

    #[test]
    fn test_ratio_delta_from_zero_is_defined() {
        let d = Delta::between(30.0, 0.0, MetricKind::Ratio);
        assert_eq!(d.render(1), "+30.0pp");
    }

    #[test]
    fn test_negative_ratio_delta_has_no_plus() {
        assert_eq!(Delta::between(35.0, 40.0, MetricKind::Ratio).render(1), "-5.0pp");
    }

    #[test]
    fn test_zero_change_has_no_sign() {
        assert_eq!(Delta::between(50.0, 50.0, MetricKind::Count).render(1), "0.0%");
        assert_eq!(Delta::between(40.0, 40.0, MetricKind::Ratio).render(1), "0.0pp");
    }

    #[test]
    fn test_non_finite_inputs_are_undefined() {
        assert_eq!(Delta::between(f64::NAN, 1.0, MetricKind::Ratio), Delta::Undefined);
    }

    #[test]
    fn test_display_uses_one_decimal() {
        assert_eq!(Delta::Percent(12.345).to_string(), "+12.3%");
    }

    #[test]
    fn test_latest_pair_takes_last_two() {
        let keys = vec!["2025-01", "2025-02", "2025-03"];
        assert_eq!(latest_pair(&keys), Some(("2025-02", "2025-03")));
    }

    #[test]
    fn test_latest_pair_needs_two() {
        assert!(latest_pair(&["2025-01"]).is_none());
        assert!(latest_pair::<&str>(&[]).is_none());
    }
}

use serde::{Deserialize, Serialize};

use crate::models::Bucket;

/// Anything carrying the raw sums derived metrics are computed from.
pub trait MetricSource {
    fn sessions(&self) -> u64;
    fn checkins(&self) -> u64;
    fn capacity(&self) -> u64;
    fn revenue(&self) -> f64;
    fn late_cancellations(&self) -> u64;
    fn empty_sessions(&self) -> u64;
    /// Contributing records.
    fn entries(&self) -> u64;
    fn conversions(&self) -> u64;
}

impl MetricSource for Bucket {
    fn sessions(&self) -> u64 {
        self.sessions
    }

    fn checkins(&self) -> u64 {
        self.checkins
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn revenue(&self) -> f64 {
        self.revenue
    }

    fn late_cancellations(&self) -> u64 {
        self.late_cancellations
    }

    fn empty_sessions(&self) -> u64 {
        self.empty_sessions
    }

    fn entries(&self) -> u64 {
        self.entries
    }

    fn conversions(&self) -> u64 {
        self.conversions
    }
}

// ── MetricCalculator ──────────────────────────────────────────────────────────

/// Stateless collection of derived-metric calculations.
///
/// Every method guards its own denominator and returns `0.0` rather than
/// NaN or infinity.
pub struct MetricCalculator;

impl MetricCalculator {
    /// Checked-in count as a percentage of capacity.
    pub fn fill_rate<M: MetricSource>(m: &M) -> f64 {
        ratio(m.checkins() as f64, m.capacity() as f64) * 100.0
    }

    /// Average check-ins per session.
    pub fn per_session_average<M: MetricSource>(m: &M) -> f64 {
        ratio(m.checkins() as f64, m.sessions() as f64)
    }

    /// Average check-ins per session that had at least one attendee.
    pub fn per_session_average_excluding_empty<M: MetricSource>(m: &M) -> f64 {
        let non_empty = m.sessions().saturating_sub(m.empty_sessions());
        ratio(m.checkins() as f64, non_empty as f64)
    }

    /// Revenue per scheduled session.
    pub fn revenue_per_session<M: MetricSource>(m: &M) -> f64 {
        ratio(m.revenue(), m.sessions() as f64)
    }

    /// Revenue per check-in.
    pub fn revenue_per_checkin<M: MetricSource>(m: &M) -> f64 {
        ratio(m.revenue(), m.checkins() as f64)
    }

    /// Late cancellations as a percentage of all bookings that were either
    /// attended or late-cancelled.
    pub fn late_cancellation_rate<M: MetricSource>(m: &M) -> f64 {
        let booked = m.checkins() + m.late_cancellations();
        ratio(m.late_cancellations() as f64, booked as f64) * 100.0
    }

    /// Converted leads as a percentage of all leads.
    pub fn conversion_rate<M: MetricSource>(m: &M) -> f64 {
        ratio(m.conversions() as f64, m.entries() as f64) * 100.0
    }

    /// `part` as a percentage of `whole`.
    pub fn share_of_total(part: f64, whole: f64) -> f64 {
        ratio(part, whole) * 100.0
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return 0.0;
    }
    numerator / denominator
}

// ── DerivedRow ────────────────────────────────────────────────────────────────

/// Read-only projection of one bucket's derived figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedRow {
    pub fill_rate: f64,
    pub per_session_average: f64,
    pub per_session_average_excluding_empty: f64,
    pub revenue_per_session: f64,
    pub revenue_per_checkin: f64,
    pub late_cancellation_rate: f64,
    pub conversion_rate: f64,
}

impl DerivedRow {
    pub fn from_source<M: MetricSource>(m: &M) -> Self {
        Self {
            fill_rate: MetricCalculator::fill_rate(m),
            per_session_average: MetricCalculator::per_session_average(m),
            per_session_average_excluding_empty:
                MetricCalculator::per_session_average_excluding_empty(m),
            revenue_per_session: MetricCalculator::revenue_per_session(m),
            revenue_per_checkin: MetricCalculator::revenue_per_checkin(m),
            late_cancellation_rate: MetricCalculator::late_cancellation_rate(m),
            conversion_rate: MetricCalculator::conversion_rate(m),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

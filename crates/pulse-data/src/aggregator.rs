//! Period bucket building.
//!
//! One linear pass over the records fills a nested
//! `period -> group -> Bucket` map. Buckets are created zeroed on first
//! touch and the whole table is rebuilt from scratch on every run.

use std::collections::{BTreeMap, BTreeSet};

use pulse_core::models::{Bucket, RawRecord};
use pulse_core::settings::EngineConfig;
use serde::Serialize;

// ── PeriodWindow ──────────────────────────────────────────────────────────────

/// The periods a report covers: every period key that actually appears among
/// records with a sane date, narrowed by the configured bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PeriodWindow {
    keys: BTreeSet<String>,
}

impl PeriodWindow {
    pub fn from_records<'r>(
        records: impl IntoIterator<Item = &'r RawRecord>,
        config: &EngineConfig,
    ) -> Self {
        let keys = records
            .into_iter()
            .filter_map(|r| config.sanity.sane_date(r.date.as_deref()))
            .map(|date| config.granularity.key_for(date))
            .filter(|key| config.within_bounds(key))
            .collect();
        Self { keys }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Keys in ascending (chronological) order.
    pub fn keys(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// ── PeriodTable ───────────────────────────────────────────────────────────────

/// Buckets keyed by group within one period.
pub type GroupBuckets = BTreeMap<String, Bucket>;

/// The nested `period -> group -> Bucket` result of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodTable {
    pub periods: BTreeMap<String, GroupBuckets>,
    /// Records without a usable (parseable and sane) date.
    pub skipped_dates: usize,
    /// Records dropped by the `skip` unclassified policy.
    pub skipped_unclassified: usize,
    /// Records dated outside the report window.
    pub skipped_outside_window: usize,
}

impl PeriodTable {
    pub fn get(&self, period: &str, group: &str) -> Option<&Bucket> {
        self.periods.get(period).and_then(|groups| groups.get(group))
    }

    /// Bucket for `(period, group)`, or an empty bucket when absent.
    pub fn bucket_or_empty(&self, period: &str, group: &str) -> Bucket {
        self.get(period, group).copied().unwrap_or_default()
    }

    /// Every group key seen in any period, sorted.
    pub fn group_keys(&self) -> BTreeSet<String> {
        self.periods
            .values()
            .flat_map(|groups| groups.keys().cloned())
            .collect()
    }

    /// Sum of all groups within `period`.
    pub fn period_total(&self, period: &str) -> Bucket {
        self.periods
            .get(period)
            .map(|groups| Bucket::sum(groups.values()))
            .unwrap_or_default()
    }

    /// Sum of every bucket in the table.
    pub fn grand_total(&self) -> Bucket {
        Bucket::sum(self.periods.values().flat_map(|groups| groups.values()))
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Add every bucket and skip counter of `other` into `self`.
    pub fn absorb(&mut self, other: &PeriodTable) {
        for (period, groups) in &other.periods {
            let out = self.periods.entry(period.clone()).or_default();
            for (group, bucket) in groups {
                out.entry(group.clone()).or_default().absorb(bucket);
            }
        }
        self.skipped_dates += other.skipped_dates;
        self.skipped_unclassified += other.skipped_unclassified;
        self.skipped_outside_window += other.skipped_outside_window;
    }
}

// ── BucketBuilder ─────────────────────────────────────────────────────────────

/// Single-pass bucket builder parameterised by an [`EngineConfig`].
pub struct BucketBuilder<'a> {
    config: &'a EngineConfig,
}

impl<'a> BucketBuilder<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Aggregate `records` into a period table restricted to `window`.
    pub fn build<'r>(
        &self,
        records: impl IntoIterator<Item = &'r RawRecord>,
        window: &PeriodWindow,
    ) -> PeriodTable {
        let mut table = PeriodTable::default();

        for record in records {
            let Some(date) = self.config.sanity.sane_date(record.date.as_deref()) else {
                table.skipped_dates += 1;
                continue;
            };
            let period = self.config.granularity.key_for(date);
            if !window.contains(&period) {
                table.skipped_outside_window += 1;
                continue;
            }
            let Some(group) = self
                .config
                .unclassified
                .resolve(self.config.grouping.group_key(record))
            else {
                table.skipped_unclassified += 1;
                continue;
            };

            table
                .periods
                .entry(period)
                .or_default()
                .entry(group)
                .or_default()
                .add_record(record);
        }

        table
    }
}

// ── Two-source merge ──────────────────────────────────────────────────────────

/// `secondary` when it is non-zero, otherwise `primary`.
pub fn prefer_non_zero<T: PartialEq + Default + Copy>(secondary: T, primary: T) -> T {
    if secondary != T::default() {
        secondary
    } else {
        primary
    }
}

/// Merge a bucket from the session sheet (`primary`) with the matching bucket
/// from the raw check-in feed (`secondary`).
///
/// Sessions and capacity always come from the primary source. Check-ins,
/// revenue and late cancellations take the feed's figure when it is non-zero
/// and fall back to the session sheet's figure otherwise, so gaps are filled
/// without counting anything twice.
///
/// Empty sessions follow the check-ins: when the feed supplies attendance the
/// sheet recorded none of, the sheet's empty count is dropped to 0, and a
/// bucket with check-ins always keeps at least one non-empty session.
pub fn merge_sources(primary: &Bucket, secondary: &Bucket) -> Bucket {
    let checkins = prefer_non_zero(secondary.checkins, primary.checkins);
    let mut empty_sessions = if primary.checkins == 0 && secondary.checkins > 0 {
        0
    } else {
        primary.empty_sessions
    };
    if checkins > 0 && primary.sessions > 0 {
        empty_sessions = empty_sessions.min(primary.sessions - 1);
    }

    Bucket {
        sessions: primary.sessions,
        capacity: primary.capacity,
        empty_sessions,
        checkins,
        revenue: prefer_non_zero(secondary.revenue, primary.revenue),
        late_cancellations: prefer_non_zero(
            secondary.late_cancellations,
            primary.late_cancellations,
        ),
        entries: primary.entries + secondary.entries,
        conversions: primary.conversions + secondary.conversions,
    }
}

/// Apply [`merge_sources`] to every `(period, group)` present in either
/// table.
pub fn merge_tables(primary: &PeriodTable, secondary: &PeriodTable) -> PeriodTable {
    let mut merged = PeriodTable {
        skipped_dates: primary.skipped_dates + secondary.skipped_dates,
        skipped_unclassified: primary.skipped_unclassified + secondary.skipped_unclassified,
        skipped_outside_window: primary.skipped_outside_window
            + secondary.skipped_outside_window,
        ..PeriodTable::default()
    };

    let periods: BTreeSet<&String> = primary
        .periods
        .keys()
        .chain(secondary.periods.keys())
        .collect();

    for period in periods {
        let empty = GroupBuckets::new();
        let p_groups = primary.periods.get(period).unwrap_or(&empty);
        let s_groups = secondary.periods.get(period).unwrap_or(&empty);
        let groups: BTreeSet<&String> = p_groups.keys().chain(s_groups.keys()).collect();

        let out = merged.periods.entry(period.clone()).or_default();
        for group in groups {
            let p = p_groups.get(group).copied().unwrap_or_default();
            let s = s_groups.get(group).copied().unwrap_or_default();
            out.insert(group.clone(), merge_sources(&p, &s));
        }
    }

    merged
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Main analysis pipeline for Studio Pulse.
//!
//! Turns a flat list of [`RawRecord`]s into a [`StudioReport`]: period window,
//! bucket tables, two-source merge, roll-up lines and comparisons between the
//! two most recent periods.

use chrono::NaiveDate;
use pulse_core::classify::Grouping;
use pulse_core::delta::{latest_pair, Delta, MetricKind};
use pulse_core::metrics::MetricCalculator;
use pulse_core::models::{Bucket, RawRecord, RecordKind};
use pulse_core::period::Granularity;
use pulse_core::settings::EngineConfig;
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregator::{merge_tables, BucketBuilder, PeriodTable, PeriodWindow};
use crate::rollup::{roll_up, sort_for_rollup, RollupLine, RollupRow};

// ── Metrics ───────────────────────────────────────────────────────────────────

/// A figure compared between two periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    FillRate,
    Sessions,
    Checkins,
    Revenue,
    Leads,
    Conversions,
    ConversionRate,
}

/// Metrics compared for the attendance section.
pub const ATTENDANCE_METRICS: &[Metric] = &[
    Metric::FillRate,
    Metric::Sessions,
    Metric::Checkins,
    Metric::Revenue,
];

/// Metrics compared for the leads section.
pub const LEAD_METRICS: &[Metric] = &[Metric::Leads, Metric::Conversions, Metric::ConversionRate];

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::FillRate => "Fill rate",
            Metric::Sessions => "Sessions",
            Metric::Checkins => "Check-ins",
            Metric::Revenue => "Revenue",
            Metric::Leads => "Leads",
            Metric::Conversions => "Conversions",
            Metric::ConversionRate => "Conversion rate",
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::FillRate | Metric::ConversionRate => MetricKind::Ratio,
            Metric::Revenue => MetricKind::Currency,
            Metric::Sessions | Metric::Checkins | Metric::Leads | Metric::Conversions => {
                MetricKind::Count
            }
        }
    }

    pub fn value(&self, bucket: &Bucket) -> f64 {
        match self {
            Metric::FillRate => MetricCalculator::fill_rate(bucket),
            Metric::Sessions => bucket.sessions as f64,
            Metric::Checkins => bucket.checkins as f64,
            Metric::Revenue => bucket.revenue,
            Metric::Leads => bucket.entries as f64,
            Metric::Conversions => bucket.conversions as f64,
            Metric::ConversionRate => MetricCalculator::conversion_rate(bucket),
        }
    }
}

// ── Public types ──────────────────────────────────────────────────────────────

/// One metric in two periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: Metric,
    pub kind: MetricKind,
    pub current: f64,
    pub previous: f64,
    pub delta: Delta,
}

impl MetricComparison {
    pub fn new(metric: Metric, current: &Bucket, previous: &Bucket) -> Self {
        let (cur, prev) = (metric.value(current), metric.value(previous));
        Self {
            metric,
            kind: metric.kind(),
            current: cur,
            previous: prev,
            delta: Delta::between(cur, prev, metric.kind()),
        }
    }
}

/// All compared metrics for one group (or the total).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupComparison {
    pub group: String,
    pub metrics: Vec<MetricComparison>,
}

impl GroupComparison {
    pub fn new(
        group: impl Into<String>,
        metrics: &[Metric],
        current: &Bucket,
        previous: &Bucket,
    ) -> Self {
        Self {
            group: group.into(),
            metrics: metrics
                .iter()
                .map(|m| MetricComparison::new(*m, current, previous))
                .collect(),
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<&MetricComparison> {
        self.metrics.iter().find(|m| m.metric == metric)
    }
}

/// Comparison of the two most recent periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub previous: String,
    pub current: String,
    pub groups: Vec<GroupComparison>,
    pub total: GroupComparison,
}

/// Roll-up lines plus the comparison for one family of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub lines: Vec<RollupLine>,
    /// `None` when fewer than two periods are present.
    pub comparison: Option<PeriodComparison>,
}

/// Metadata produced alongside the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    /// The date the sanity policy treated as today.
    pub generated_on: NaiveDate,
    pub granularity: Granularity,
    pub grouping: Grouping,
    pub records_processed: usize,
    /// Records with a missing, unparseable or insane date.
    pub skipped_records: usize,
    /// Records dropped by the `skip` unclassified policy.
    pub skipped_unclassified: usize,
    /// Records outside the `--from`/`--to` bounds.
    pub outside_window: usize,
}

/// The complete output of [`analyze_studio`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudioReport {
    pub metadata: ReportMetadata,
    /// Period keys in chronological order.
    pub periods: Vec<String>,
    /// Sessions merged with the check-in feed, plus sales revenue.
    pub attendance: ReportSection,
    /// Lead funnel, present only when lead records were loaded.
    pub leads: Option<ReportSection>,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full analysis pipeline.
///
/// 1. Derive the period window from records with sane dates.
/// 2. Build separate bucket tables for the session sheet, the check-in feed,
///    sales and leads in one pass each.
/// 3. Merge sessions with check-ins, then add sales revenue.
/// 4. Roll up one row per (period, group), subtotalled per period.
/// 5. Compare the two most recent periods of each section.
pub fn analyze_studio(records: &[RawRecord], config: &EngineConfig) -> StudioReport {
    let window = PeriodWindow::from_records(records, config);
    let periods = window.keys();
    info!(
        "Analysing {} records over {} {} periods grouped by {}",
        records.len(),
        periods.len(),
        config.granularity,
        config.grouping
    );

    let builder = BucketBuilder::new(config);
    let of_kind = |kind: RecordKind| records.iter().filter(move |r| r.kind == kind);

    let sessions = builder.build(of_kind(RecordKind::Session), &window);
    let checkins = builder.build(of_kind(RecordKind::Checkin), &window);
    let sales = builder.build(of_kind(RecordKind::Sale), &window);
    let leads = builder.build(of_kind(RecordKind::Lead), &window);

    let mut attendance = merge_tables(&sessions, &checkins);
    attendance.absorb(&sales);
    debug!(
        "Bucket tables: {} attendance periods, {} lead periods",
        attendance.periods.len(),
        leads.periods.len()
    );

    let metadata = ReportMetadata {
        generated_on: config.sanity.today,
        granularity: config.granularity,
        grouping: config.grouping,
        records_processed: records.len(),
        skipped_records: attendance.skipped_dates + leads.skipped_dates,
        skipped_unclassified: attendance.skipped_unclassified + leads.skipped_unclassified,
        outside_window: attendance.skipped_outside_window + leads.skipped_outside_window,
    };

    let attendance_section = build_section(&attendance, ATTENDANCE_METRICS);
    let leads_section = (!leads.is_empty()).then(|| build_section(&leads, LEAD_METRICS));

    info!(
        "Report ready: {} lines, {} records skipped for unusable dates",
        attendance_section.lines.len(),
        metadata.skipped_records
    );

    StudioReport {
        metadata,
        periods,
        attendance: attendance_section,
        leads: leads_section,
    }
}

/// Roll-up rows for `table`: one per (period, group), grouped by period.
pub fn rollup_rows(table: &PeriodTable) -> Vec<RollupRow> {
    let mut rows: Vec<RollupRow> = table
        .periods
        .iter()
        .flat_map(|(period, groups)| {
            groups
                .iter()
                .map(move |(group, bucket)| RollupRow::new(period.as_str(), group.as_str(), *bucket))
        })
        .collect();
    sort_for_rollup(&mut rows);
    rows
}

/// Compare every group of `table` between the two latest `periods`.
///
/// Groups missing from one of the periods compare against an empty bucket.
pub fn compare_latest(
    table: &PeriodTable,
    periods: &[String],
    metrics: &[Metric],
) -> Option<PeriodComparison> {
    let (previous, current) = latest_pair(periods)?;

    let groups = table
        .group_keys()
        .into_iter()
        .filter(|group| {
            table.get(previous, group).is_some() || table.get(current, group).is_some()
        })
        .map(|group| {
            let cur = table.bucket_or_empty(current, &group);
            let prev = table.bucket_or_empty(previous, &group);
            GroupComparison::new(group, metrics, &cur, &prev)
        })
        .collect();

    let total = GroupComparison::new(
        "Total",
        metrics,
        &table.period_total(current),
        &table.period_total(previous),
    );

    Some(PeriodComparison {
        previous: previous.to_string(),
        current: current.to_string(),
        groups,
        total,
    })
}

/// Roll-up and comparison for one table. The comparison runs over the
/// periods that table actually has, so a period only another feed reaches
/// never shows up as an empty "current" period.
fn build_section(table: &PeriodTable, metrics: &[Metric]) -> ReportSection {
    let periods: Vec<String> = table.periods.keys().cloned().collect();
    ReportSection {
        lines: roll_up(&rollup_rows(table)),
        comparison: compare_latest(table, &periods, metrics),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

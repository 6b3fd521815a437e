//! Plain-text rendering of a [`StudioReport`].
//!
//! Each section prints its roll-up lines (rows, period subtotals and a
//! highlighted TOTAL row) followed by a comparison block for the two most
//! recent periods.

use std::collections::HashMap;
use std::fmt::Write as _;

use pulse_core::delta::MetricKind;
use pulse_core::formatting::{format_currency, format_number, format_percent};
use pulse_core::metrics::MetricCalculator;
use pulse_core::models::Bucket;
use pulse_data::analysis::{MetricComparison, PeriodComparison, ReportSection, StudioReport};
use pulse_data::rollup::RollupLine;
use unicode_width::UnicodeWidthStr;

// ── TextTable ─────────────────────────────────────────────────────────────────

enum TableLine {
    Cells(Vec<String>),
    Rule,
}

/// Column-aligned table. The first `left_columns` columns are left-aligned,
/// the rest right-aligned. Widths are measured in terminal cells.
struct TextTable {
    headers: Vec<String>,
    lines: Vec<TableLine>,
    left_columns: usize,
}

impl TextTable {
    fn new(headers: &[&str], left_columns: usize) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            lines: Vec::new(),
            left_columns,
        }
    }

    fn push(&mut self, cells: Vec<String>) {
        self.lines.push(TableLine::Cells(cells));
    }

    fn rule(&mut self) {
        self.lines.push(TableLine::Rule);
    }

    fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.width()).collect();
        for line in &self.lines {
            if let TableLine::Cells(cells) = line {
                for (i, cell) in cells.iter().enumerate() {
                    if i < widths.len() {
                        widths[i] = widths[i].max(cell.width());
                    }
                }
            }
        }
        let total_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);

        let mut out = String::new();
        out.push_str(&self.render_cells(&self.headers, &widths));
        out.push_str(&"─".repeat(total_width));
        out.push('\n');
        for line in &self.lines {
            match line {
                TableLine::Cells(cells) => out.push_str(&self.render_cells(cells, &widths)),
                TableLine::Rule => {
                    out.push_str(&"─".repeat(total_width));
                    out.push('\n');
                }
            }
        }
        out
    }

    fn render_cells(&self, cells: &[String], widths: &[usize]) -> String {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                pad(cell, *width, i < self.left_columns)
            })
            .collect();
        let mut line = padded.join("  ");
        line.truncate(line.trim_end().len());
        line.push('\n');
        line
    }
}

fn pad(text: &str, width: usize, left: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.width()));
    if left {
        format!("{}{}", text, fill)
    } else {
        format!("{}{}", fill, text)
    }
}

// ── Value formatting ──────────────────────────────────────────────────────────

fn format_metric(value: f64, kind: MetricKind, currency: &str) -> String {
    match kind {
        MetricKind::Ratio => format_percent(value, 1),
        MetricKind::Count => format_number(value, 0),
        MetricKind::Currency => format_currency(value, currency),
    }
}

// ── Sections ──────────────────────────────────────────────────────────────────

const ATTENDANCE_HEADERS: &[&str] = &[
    "Period",
    "Group",
    "Sessions",
    "Check-ins",
    "Capacity",
    "Fill",
    "Avg",
    "Avg (non-empty)",
    "Empty",
    "Late cxl",
    "Revenue",
    "Rev/session",
    "Share",
];

const LEAD_HEADERS: &[&str] = &["Period", "Group", "Leads", "Conversions", "Conv. rate", "Share"];

fn attendance_cells(bucket: &Bucket, share: Option<f64>, currency: &str) -> Vec<String> {
    vec![
        format_number(bucket.sessions as f64, 0),
        format_number(bucket.checkins as f64, 0),
        format_number(bucket.capacity as f64, 0),
        format_percent(MetricCalculator::fill_rate(bucket), 1),
        format_number(MetricCalculator::per_session_average(bucket), 1),
        format_number(MetricCalculator::per_session_average_excluding_empty(bucket), 1),
        format_number(bucket.empty_sessions as f64, 0),
        format_percent(MetricCalculator::late_cancellation_rate(bucket), 1),
        format_currency(bucket.revenue, currency),
        format_currency(MetricCalculator::revenue_per_session(bucket), currency),
        share.map(|s| format_percent(s, 1)).unwrap_or_default(),
    ]
}

fn lead_cells(bucket: &Bucket, share: Option<f64>, _currency: &str) -> Vec<String> {
    vec![
        format_number(bucket.entries as f64, 0),
        format_number(bucket.conversions as f64, 0),
        format_percent(MetricCalculator::conversion_rate(bucket), 1),
        share.map(|s| format_percent(s, 1)).unwrap_or_default(),
    ]
}

type CellsFn = fn(&Bucket, Option<f64>, &str) -> Vec<String>;

/// Share figure of a row: its check-ins (or leads) as a percentage of its
/// period's subtotal.
fn share_basis(bucket: &Bucket, is_leads: bool) -> f64 {
    if is_leads {
        bucket.entries as f64
    } else {
        bucket.checkins as f64
    }
}

fn render_section(
    out: &mut String,
    title: &str,
    section: &ReportSection,
    headers: &[&str],
    cells: CellsFn,
    is_leads: bool,
    currency: &str,
) {
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out);

    let subtotals: HashMap<&str, f64> = section
        .lines
        .iter()
        .filter_map(|line| match line {
            RollupLine::Subtotal { group, bucket, .. } => {
                Some((group.as_str(), share_basis(bucket, is_leads)))
            }
            _ => None,
        })
        .collect();

    let mut table = TextTable::new(headers, 2);
    for line in &section.lines {
        match line {
            RollupLine::Row {
                group,
                label,
                bucket,
                ..
            } => {
                let whole = subtotals.get(group.as_str()).copied().unwrap_or(0.0);
                let share = MetricCalculator::share_of_total(share_basis(bucket, is_leads), whole);
                let mut row = vec![group.clone(), label.clone()];
                row.extend(cells(bucket, Some(share), currency));
                table.push(row);
            }
            RollupLine::Subtotal { group, bucket, .. } => {
                let mut row = vec![String::new(), format!("Subtotal {}", group)];
                row.extend(cells(bucket, None, currency));
                table.push(row);
                table.rule();
            }
            RollupLine::GrandTotal { bucket, .. } => {
                let mut row = vec!["TOTAL".to_string(), String::new()];
                row.extend(cells(bucket, None, currency));
                table.push(row);
            }
        }
    }
    out.push_str(&table.render());

    match &section.comparison {
        Some(cmp) => render_comparison(out, cmp, currency),
        None => {
            let _ = writeln!(out);
            let _ = writeln!(out, "Fewer than two periods: no comparison available.");
        }
    }
}

fn render_comparison(out: &mut String, cmp: &PeriodComparison, currency: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{} vs {}", cmp.current, cmp.previous);
    let _ = writeln!(out);

    let mut headers = vec!["Group"];
    headers.extend(cmp.total.metrics.iter().map(|m| m.metric.label()));
    let mut table = TextTable::new(&headers, 1);

    let row = |group: &str, metrics: &[MetricComparison]| {
        let mut cells = vec![group.to_string()];
        cells.extend(metrics.iter().map(|m| {
            format!(
                "{} ({})",
                format_metric(m.current, m.kind, currency),
                m.delta.render(1)
            )
        }));
        cells
    };

    for group in &cmp.groups {
        table.push(row(&group.group, &group.metrics));
    }
    table.rule();
    table.push(row("TOTAL", &cmp.total.metrics));
    out.push_str(&table.render());
}

// ── Public entry point ────────────────────────────────────────────────────────

/// Render the whole report as aligned text.
pub fn render_report(report: &StudioReport, currency: &str) -> String {
    let mut out = String::new();
    let meta = &report.metadata;

    let _ = writeln!(
        out,
        "Studio Pulse: {} view grouped by {} ({} periods, as of {})",
        meta.granularity,
        meta.grouping,
        report.periods.len(),
        meta.generated_on
    );
    let _ = writeln!(
        out,
        "{} records processed, {} skipped for unusable dates",
        format_number(meta.records_processed as f64, 0),
        format_number(meta.skipped_records as f64, 0)
    );
    if meta.skipped_unclassified > 0 {
        let _ = writeln!(out, "{} unclassified records hidden", meta.skipped_unclassified);
    }
    let _ = writeln!(out);

    render_section(
        &mut out,
        "Attendance",
        &report.attendance,
        ATTENDANCE_HEADERS,
        attendance_cells,
        false,
        currency,
    );

    if let Some(leads) = &report.leads {
        let _ = writeln!(out);
        render_section(&mut out, "Leads", leads, LEAD_HEADERS, lead_cells, true, currency);
    }

    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────

//! Subtotal / grand-total roll-up over a grouped row list.

use pulse_core::metrics::DerivedRow;
use pulse_core::models::Bucket;
use serde::Serialize;

/// One detail row entering the roll-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupRow {
    /// Roll-up group key; a subtotal is emitted whenever it changes.
    pub group: String,
    /// Row label within the group.
    pub label: String,
    pub bucket: Bucket,
}

impl RollupRow {
    pub fn new(group: impl Into<String>, label: impl Into<String>, bucket: Bucket) -> Self {
        Self {
            group: group.into(),
            label: label.into(),
            bucket,
        }
    }
}

/// A line of roll-up output. Every line carries its figures re-derived from
/// its own sums.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "line", rename_all = "snake_case")]
pub enum RollupLine {
    Row {
        group: String,
        label: String,
        bucket: Bucket,
        derived: DerivedRow,
    },
    Subtotal {
        group: String,
        bucket: Bucket,
        derived: DerivedRow,
    },
    GrandTotal {
        bucket: Bucket,
        derived: DerivedRow,
    },
}

impl RollupLine {
    pub fn bucket(&self) -> &Bucket {
        match self {
            RollupLine::Row { bucket, .. }
            | RollupLine::Subtotal { bucket, .. }
            | RollupLine::GrandTotal { bucket, .. } => bucket,
        }
    }

    pub fn derived(&self) -> &DerivedRow {
        match self {
            RollupLine::Row { derived, .. }
            | RollupLine::Subtotal { derived, .. }
            | RollupLine::GrandTotal { derived, .. } => derived,
        }
    }

    fn subtotal(group: String, bucket: Bucket) -> Self {
        RollupLine::Subtotal {
            group,
            derived: DerivedRow::from_source(&bucket),
            bucket,
        }
    }
}

/// Sort rows by group key, ties broken by descending check-ins then label.
pub fn sort_for_rollup(rows: &mut [RollupRow]) {
    rows.sort_by(|a, b| {
        a.group
            .cmp(&b.group)
            .then_with(|| b.bucket.checkins.cmp(&a.bucket.checkins))
            .then_with(|| a.label.cmp(&b.label))
    });
}

/// Interleave subtotal lines at each group boundary of a pre-sorted row list
/// and append one grand total.
///
/// Empty input yields only a zeroed grand total.
pub fn roll_up(rows: &[RollupRow]) -> Vec<RollupLine> {
    let mut lines = Vec::with_capacity(rows.len() * 2 + 1);
    let mut current_group: Option<&str> = None;
    let mut group_acc = Bucket::default();
    let mut grand_acc = Bucket::default();

    for row in rows {
        if let Some(group) = current_group {
            if group != row.group {
                lines.push(RollupLine::subtotal(group.to_string(), group_acc));
                group_acc = Bucket::default();
            }
        }
        current_group = Some(&row.group);

        group_acc.absorb(&row.bucket);
        grand_acc.absorb(&row.bucket);
        lines.push(RollupLine::Row {
            group: row.group.clone(),
            label: row.label.clone(),
            bucket: row.bucket,
            derived: DerivedRow::from_source(&row.bucket),
        });
    }

    if let Some(group) = current_group {
        lines.push(RollupLine::subtotal(group.to_string(), group_acc));
    }
    lines.push(RollupLine::GrandTotal {
        derived: DerivedRow::from_source(&grand_acc),
        bucket: grand_acc,
    });

    lines
}

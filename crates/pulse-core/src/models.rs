use serde::{Deserialize, Serialize};

/// Placeholder for absent descriptive text (class, trainer, location, …).
pub const UNKNOWN: &str = "Unknown";

/// Placeholder for absent identifiers and slot labels.
pub const MISSING: &str = "-";

/// Which spreadsheet feed a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// One scheduled class, with its capacity and attendance.
    Session,
    /// One member check-in from the raw attendance feed.
    Checkin,
    /// One sale or payment line.
    Sale,
    /// One prospective member.
    Lead,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Session => "session",
            RecordKind::Checkin => "checkin",
            RecordKind::Sale => "sale",
            RecordKind::Lead => "lead",
        }
    }
}

/// A flat record in the single canonical shape the engine understands.
///
/// Produced by the adapter at the loading boundary; the engine never reads
/// source-specific field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub kind: RecordKind,
    /// Raw date text as it appeared in the sheet.
    #[serde(default)]
    pub date: Option<String>,
    pub class_type: String,
    pub trainer: String,
    pub location: String,
    pub source: String,
    pub stage: String,
    pub day_of_week: String,
    pub time_slot: String,
    pub id: String,
    #[serde(default)]
    pub capacity: u64,
    #[serde(default)]
    pub checked_in: u64,
    #[serde(default)]
    pub late_cancellations: u64,
    #[serde(default)]
    pub revenue: f64,
}

impl RawRecord {
    /// A record of `kind` with every field at its placeholder or zero.
    pub fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            date: None,
            class_type: UNKNOWN.to_string(),
            trainer: UNKNOWN.to_string(),
            location: UNKNOWN.to_string(),
            source: UNKNOWN.to_string(),
            stage: UNKNOWN.to_string(),
            day_of_week: MISSING.to_string(),
            time_slot: MISSING.to_string(),
            id: MISSING.to_string(),
            capacity: 0,
            checked_in: 0,
            late_cancellations: 0,
            revenue: 0.0,
        }
    }

    /// Whether the lead has progressed to a paying member.
    pub fn is_converted_lead(&self) -> bool {
        if self.kind != RecordKind::Lead {
            return false;
        }
        let stage = self.stage.to_lowercase().replace('\u{2019}', "'");
        let words: Vec<&str> = stage
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();
        if words.iter().any(|w| NEGATED_STAGE_WORDS.contains(w)) {
            return false;
        }
        words
            .iter()
            .any(|w| w.starts_with("convert") || CONVERTED_STAGE_WORDS.contains(w))
    }
}

const CONVERTED_STAGE_WORDS: &[&str] = &["won", "member", "joined"];
const NEGATED_STAGE_WORDS: &[&str] = &["not", "non", "no", "never", "won't", "lost", "unconverted"];

/// Returns `true` for empty text and the two placeholders.
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == UNKNOWN || trimmed == MISSING
}

// ── Bucket ────────────────────────────────────────────────────────────────────

/// Per-(period, group) accumulator of counts and sums.
///
/// Created zeroed on first contribution and only ever grown during one
/// aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub sessions: u64,
    pub checkins: u64,
    pub capacity: u64,
    pub revenue: f64,
    pub late_cancellations: u64,
    pub empty_sessions: u64,
    /// Number of records that contributed to this bucket.
    pub entries: u64,
    /// Leads that reached a converted stage.
    pub conversions: u64,
}

impl Bucket {
    /// Accumulate one record according to its kind.
    pub fn add_record(&mut self, record: &RawRecord) {
        self.entries += 1;
        match record.kind {
            RecordKind::Session => {
                self.sessions += 1;
                self.capacity += record.capacity;
                self.checkins += record.checked_in;
                self.late_cancellations += record.late_cancellations;
                self.revenue += record.revenue;
                if record.checked_in == 0 {
                    self.empty_sessions += 1;
                }
            }
            RecordKind::Checkin => {
                self.checkins += record.checked_in;
                self.late_cancellations += record.late_cancellations;
                self.revenue += record.revenue;
            }
            RecordKind::Sale => {
                self.revenue += record.revenue;
            }
            RecordKind::Lead => {
                if record.is_converted_lead() {
                    self.conversions += 1;
                }
            }
        }
    }

    /// Add every field of `other` into `self`.
    pub fn absorb(&mut self, other: &Bucket) {
        self.sessions += other.sessions;
        self.checkins += other.checkins;
        self.capacity += other.capacity;
        self.revenue += other.revenue;
        self.late_cancellations += other.late_cancellations;
        self.empty_sessions += other.empty_sessions;
        self.entries += other.entries;
        self.conversions += other.conversions;
    }

    /// Sum a list of buckets into one.
    pub fn sum<'a>(buckets: impl IntoIterator<Item = &'a Bucket>) -> Bucket {
        let mut total = Bucket::default();
        for bucket in buckets {
            total.absorb(bucket);
        }
        total
    }

    /// Whether nothing has been accumulated yet.
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

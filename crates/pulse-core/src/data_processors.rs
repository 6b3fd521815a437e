use std::sync::OnceLock;

use chrono::Datelike;
use regex::Regex;
use serde_json::{Map, Value};

use crate::classify::weekday_name;
use crate::models::{is_placeholder, RawRecord, RecordKind};
use crate::period::parse_record_date;

// ── Numeric cleanup ───────────────────────────────────────────────────────────

fn numeric_decoration() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9.\-]").expect("regex is valid"))
}

/// Parse a spreadsheet amount such as `"₹1,200.50"`, `" 45 "` or `"-"`.
///
/// Currency symbols, separators and whitespace are stripped first. Anything
/// that still fails to parse is `0.0`; a single bad cell must never abort an
/// aggregation.
pub fn parse_amount(text: &str) -> f64 {
    let cleaned = numeric_decoration().replace_all(text, "");
    if cleaned.is_empty() || cleaned == "-" || cleaned == "." {
        return 0.0;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Read a spreadsheet flag cell such as `"TRUE"`, `"no"` or `"Y"`.
pub fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" => Some(true),
        "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Numeric value of a JSON cell. Booleans, including textual flags exported
/// by the sheets API, count as 1 / 0.
pub fn value_as_f64(value: &Value) -> f64 {
    let flag_value = |b: bool| if b { 1.0 } else { 0.0 };
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::Bool(b) => flag_value(*b),
        Value::String(s) => parse_flag(s).map(flag_value).unwrap_or_else(|| parse_amount(s)),
        _ => 0.0,
    }
}

/// Non-negative whole count of a JSON cell.
pub fn value_as_count(value: &Value) -> u64 {
    let v = value_as_f64(value);
    if v <= 0.0 {
        0
    } else {
        v.round() as u64
    }
}

/// Trimmed, non-empty text of a scalar JSON cell.
pub fn value_as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// ── FieldExtractor ────────────────────────────────────────────────────────────

/// Lower-case a header and drop everything that is not a letter or digit,
/// so `Date (IST)`, `dateIST` and `date_ist` compare equal.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Looks up canonical fields in a row object whose headers vary between
/// source sheets.
pub struct FieldExtractor<'a> {
    fields: Vec<(String, &'a Value)>,
}

impl<'a> FieldExtractor<'a> {
    pub fn new(row: &'a Map<String, Value>) -> Self {
        let fields = row
            .iter()
            .map(|(key, value)| (normalize_key(key), value))
            .collect();
        Self { fields }
    }

    /// The first alias (in alias order) whose cell is present and non-empty.
    pub fn find(&self, aliases: &[&str]) -> Option<&'a Value> {
        aliases.iter().find_map(|alias| {
            self.fields
                .iter()
                .find(|(key, value)| key == alias && !is_blank(value))
                .map(|(_, value)| *value)
        })
    }

    pub fn text(&self, aliases: &[&str]) -> Option<String> {
        self.find(aliases).and_then(value_as_text)
    }

    pub fn count(&self, aliases: &[&str]) -> Option<u64> {
        self.find(aliases).map(value_as_count)
    }

    pub fn amount(&self, aliases: &[&str]) -> Option<f64> {
        self.find(aliases).map(value_as_f64)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

// ── RecordAdapter ─────────────────────────────────────────────────────────────

const DATE_KEYS: &[&str] = &[
    "date",
    "dateist",
    "classdate",
    "sessiondate",
    "checkindate",
    "paymentdate",
    "createdat",
    "createdon",
    "timestamp",
];
const CLASS_KEYS: &[&str] = &[
    "classtype",
    "cleanedclass",
    "class",
    "classname",
    "sessionname",
    "format",
    "category",
    "cleanedproduct",
    "product",
];
const TRAINER_KEYS: &[&str] = &[
    "trainer",
    "trainername",
    "teachername",
    "instructor",
    "coach",
    "staff",
    "soldby",
    "associate",
];
const LOCATION_KEYS: &[&str] = &["location", "calculatedlocation", "studio", "center", "branch"];
const SOURCE_KEYS: &[&str] = &["source", "leadsource", "channel"];
const STAGE_KEYS: &[&str] = &["stage", "leadstage", "conversionstatus", "status"];
const DAY_KEYS: &[&str] = &["dayofweek", "day", "weekday"];
const TIME_KEYS: &[&str] = &["time", "classtime", "sessiontime", "timeslot", "slot"];
const ID_KEYS: &[&str] = &[
    "uniqueid",
    "id",
    "sessionid",
    "paymentid",
    "transactionid",
    "leadid",
    "memberid",
];
const CAPACITY_KEYS: &[&str] = &["capacity", "maxcapacity", "totalcapacity", "spots"];
const CHECKIN_KEYS: &[&str] = &[
    "checkedincount",
    "checkedin",
    "checkins",
    "attendance",
    "attended",
];
const LATE_KEYS: &[&str] = &[
    "latecancellations",
    "latecancelled",
    "islatecancelled",
    "latecancels",
    "latecancellation",
];
const REVENUE_KEYS: &[&str] = &[
    "totalpaid",
    "revenue",
    "paymentvalue",
    "paidamount",
    "paid",
    "amount",
    "netrevenue",
    "value",
];

/// Maps rows from any of the known studio sheet layouts onto [`RawRecord`].
pub struct RecordAdapter;

impl RecordAdapter {
    /// Adapt one row object. Non-object values produce a placeholder record.
    pub fn adapt(kind: RecordKind, row: &Value) -> RawRecord {
        let mut record = RawRecord::new(kind);
        let Some(map) = row.as_object() else {
            return record;
        };
        let fields = FieldExtractor::new(map);

        record.date = fields.text(DATE_KEYS);
        if let Some(v) = fields.text(CLASS_KEYS) {
            record.class_type = v;
        }
        if let Some(v) = fields.text(TRAINER_KEYS) {
            record.trainer = v;
        }
        if let Some(v) = fields.text(LOCATION_KEYS) {
            record.location = v;
        }
        if let Some(v) = fields.text(SOURCE_KEYS) {
            record.source = v;
        }
        if let Some(v) = fields.text(STAGE_KEYS) {
            record.stage = v;
        }
        match fields.text(DAY_KEYS) {
            Some(v) => record.day_of_week = v,
            None => {
                if let Some(date) = record.date.as_deref().and_then(parse_record_date) {
                    record.day_of_week = weekday_name(date.weekday()).to_string();
                }
            }
        }
        if let Some(v) = fields.text(TIME_KEYS) {
            record.time_slot = v;
        }
        if let Some(v) = fields.text(ID_KEYS) {
            record.id = v;
        }

        record.capacity = fields.count(CAPACITY_KEYS).unwrap_or(0);
        record.late_cancellations = fields.count(LATE_KEYS).unwrap_or(0);
        record.revenue = fields.amount(REVENUE_KEYS).unwrap_or(0.0);
        record.checked_in = match fields.count(CHECKIN_KEYS) {
            Some(n) => n,
            // A check-in feed row is itself one attendance unless it was a
            // late cancellation.
            None if kind == RecordKind::Checkin && record.late_cancellations == 0 => 1,
            None => 0,
        };

        record
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MISSING, UNKNOWN};
    use serde_json::json;

    // ── parse_amount ────────────────────────────────────────────────────────

    #[test]
    fn test_parse_amount_strips_decoration() {
        assert!((parse_amount("₹1,200.50") - 1200.5).abs() < 1e-9);
        assert!((parse_amount(" 45 ") - 45.0).abs() < 1e-9);
        assert!((parse_amount("$-12.25") + 12.25).abs() < 1e-9);
    }

    #[test]
    fn test_parse_amount_failures_are_zero() {
        assert_eq!(parse_amount("-"), 0.0);
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("n/a"), 0.0);
        assert_eq!(parse_amount("12-34"), 0.0);
        assert_eq!(parse_amount("1.2.3"), 0.0);
    }

    #[test]
    fn test_value_as_count() {
        assert_eq!(value_as_count(&json!(8)), 8);
        assert_eq!(value_as_count(&json!("12")), 12);
        assert_eq!(value_as_count(&json!(true)), 1);
        assert_eq!(value_as_count(&json!(-3)), 0);
        assert_eq!(value_as_count(&json!(null)), 0);
        assert_eq!(value_as_count(&json!("7.6")), 8);
    }

    #[test]
    fn test_value_as_text() {
        assert_eq!(value_as_text(&json!("  Barre ")), Some("Barre".to_string()));
        assert_eq!(value_as_text(&json!(2025)), Some("2025".to_string()));
        assert!(value_as_text(&json!("   ")).is_none());
        assert!(value_as_text(&json!(null)).is_none());
        assert!(value_as_text(&json!([1, 2])).is_none());
    }

    // ── FieldExtractor ──────────────────────────────────────────────────────

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Date (IST)"), "dateist");
        assert_eq!(normalize_key("dateIST"), "dateist");
        assert_eq!(normalize_key("date_ist"), "dateist");
    }

    #[test]
    fn test_extractor_alias_order_and_blank_skip() {
        let row = json!({"Date (IST)": "", "classDate": "01/04/2025", "date": null});
        let map = row.as_object().unwrap();
        let fields = FieldExtractor::new(map);
        assert_eq!(fields.text(DATE_KEYS), Some("01/04/2025".to_string()));
    }

    // ── RecordAdapter ───────────────────────────────────────────────────────

    #[test]
    fn test_adapt_session_row() {
        let row = json!({
            "Date": "01/04/2025",
            "Class Type": "Barre Intro",
            "Teacher Name": "Anisha",
            "Checked In Count": "8",
            "Capacity": 10,
            "Total Paid": "₹1,000",
            "Location": "Kwality House",
        });
        let r = RecordAdapter::adapt(RecordKind::Session, &row);

        assert_eq!(r.kind, RecordKind::Session);
        assert_eq!(r.date.as_deref(), Some("01/04/2025"));
        assert_eq!(r.class_type, "Barre Intro");
        assert_eq!(r.trainer, "Anisha");
        assert_eq!(r.location, "Kwality House");
        assert_eq!(r.checked_in, 8);
        assert_eq!(r.capacity, 10);
        assert!((r.revenue - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_adapt_missing_fields_use_placeholders() {
        let r = RecordAdapter::adapt(RecordKind::Session, &json!({"Capacity": "-"}));
        assert_eq!(r.class_type, UNKNOWN);
        assert_eq!(r.trainer, UNKNOWN);
        assert_eq!(r.id, MISSING);
        assert_eq!(r.capacity, 0);
        assert_eq!(r.checked_in, 0);
        assert!(r.date.is_none());
    }

    #[test]
    fn test_adapt_derives_missing_day_from_date() {
        let r = RecordAdapter::adapt(RecordKind::Session, &json!({"Date": "01/04/2025"}));
        assert_eq!(r.day_of_week, "Tuesday");

        let r = RecordAdapter::adapt(
            RecordKind::Session,
            &json!({"Date": "01/04/2025", "Day of Week": "Mon"}),
        );
        assert_eq!(r.day_of_week, "Mon");

        let r = RecordAdapter::adapt(RecordKind::Session, &json!({"Date": "soon"}));
        assert!(is_placeholder(&r.day_of_week));
    }

    #[test]
    fn test_adapt_checkin_row_defaults_to_one_attendance() {
        let r = RecordAdapter::adapt(RecordKind::Checkin, &json!({"dateIST": "2025-04-01"}));
        assert_eq!(r.checked_in, 1);
    }

    #[test]
    fn test_adapt_late_cancelled_checkin_row() {
        let row = json!({"dateIST": "2025-04-01", "Is Late Cancelled": true});
        let r = RecordAdapter::adapt(RecordKind::Checkin, &row);
        assert_eq!(r.checked_in, 0);
        assert_eq!(r.late_cancellations, 1);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag("n"), Some(false));
        assert_eq!(parse_flag("FALSE"), Some(false));
        assert_eq!(parse_flag("12"), None);
    }

    #[test]
    fn test_value_as_count_reads_text_flags() {
        assert_eq!(value_as_count(&json!("TRUE")), 1);
        assert_eq!(value_as_count(&json!("Yes")), 1);
        assert_eq!(value_as_count(&json!("FALSE")), 0);
        assert_eq!(value_as_count(&json!("no")), 0);
    }

    #[test]
    fn test_adapt_text_late_cancel_flag_is_not_attendance() {
        let row = json!({"dateIST": "2025-04-01", "Is Late Cancelled": "TRUE"});
        let r = RecordAdapter::adapt(RecordKind::Checkin, &row);
        assert_eq!(r.late_cancellations, 1);
        assert_eq!(r.checked_in, 0);

        let row = json!({"dateIST": "2025-04-01", "Is Late Cancelled": "FALSE"});
        let r = RecordAdapter::adapt(RecordKind::Checkin, &row);
        assert_eq!(r.late_cancellations, 0);
        assert_eq!(r.checked_in, 1);
    }

    #[test]
    fn test_adapt_text_checked_in_flag() {
        let r = RecordAdapter::adapt(RecordKind::Checkin, &json!({"Checked In": "TRUE"}));
        assert_eq!(r.checked_in, 1);
        let r = RecordAdapter::adapt(RecordKind::Checkin, &json!({"Checked In": "No"}));
        assert_eq!(r.checked_in, 0);
    }

    #[test]
    fn test_adapt_non_object_is_placeholder() {
        let r = RecordAdapter::adapt(RecordKind::Sale, &json!("garbage"));
        assert_eq!(r, RawRecord::new(RecordKind::Sale));
    }
}

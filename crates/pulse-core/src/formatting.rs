/// Default currency symbol for studio revenue.
pub const DEFAULT_CURRENCY_SYMBOL: &str = "₹";

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use pulse_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Nudge by an epsilon scaled to the target precision so exact binary
    // midpoints such as 1.005 round away from zero.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();

    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        // "0.50" -> ".50"
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative && rounded != 0.0 {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format a revenue amount with `symbol`, two decimals and thousands
/// separators.
///
/// # Examples
///
/// ```
/// use pulse_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56, "₹"), "₹1,234.56");
/// assert_eq!(format_currency(0.0, "$"), "$0.00");
/// assert_eq!(format_currency(-9.99, "₹"), "-₹9.99");
/// ```
pub fn format_currency(amount: f64, symbol: &str) -> String {
    if amount < 0.0 {
        format!("-{}{}", symbol, format_number(amount.abs(), 2))
    } else {
        format!("{}{}", symbol, format_number(amount, 2))
    }
}

/// Format an already-computed percentage, e.g. `40.0%`.
///
/// ```
/// use pulse_core::formatting::format_percent;
///
/// assert_eq!(format_percent(40.0, 1), "40.0%");
/// assert_eq!(format_percent(f64::NAN, 1), "-");
/// ```
pub fn format_percent(value: f64, decimals: u32) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    format!("{}%", format_number(value, decimals))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

// ============================================================
// CELL VALUE EXTRACTION
// ============================================================
// Canonical text for a cell of unknown declared type. Never fails:
// anything unreadable becomes "" and the caller skips the row.

use crate::domain::dataset::RawCell;

const MAX_FRACTION_DIGITS: usize = 9;

/// Canonical text for one cell.
pub fn extract_text(cell: &RawCell) -> String {
    match cell {
        RawCell::Text(text) => text.clone(),
        RawCell::Numeric(value) => format_number(*value),
        RawCell::Boolean(flag) => flag.to_string(),
        RawCell::Formula(Some(cached)) => extract_text(cached),
        RawCell::Formula(None) | RawCell::Blank => String::new(),
    }
}

/// Decimal text without exponent or grouping.
///
/// Whole numbers print as integers, fractions as fixed-point with at most
/// nine fractional digits and no trailing zeros.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 {
        return format!("{:.0}", value);
    }

    let fixed = format!("{:.*}", MAX_FRACTION_DIGITS, value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Integer label for a numeric group-name cell. The fraction is dropped.
pub fn integer_label(cell: &RawCell) -> Option<String> {
    match cell {
        RawCell::Numeric(value) if value.is_finite() => Some(format_number(value.trunc())),
        RawCell::Formula(Some(cached)) => integer_label(cached),
        _ => None,
    }
}

// ============================================================
// LOCALE NUMBER PARSER
// ============================================================
// Spreadsheets produced in different regions mix "1.234,56",
// "1234,56" and "1234.56". Patterns are tried in a fixed order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::{AppError, Result};

/// `1.234.567,89`: 1-3 leading digits, period-grouped thousands, optional decimal comma.
static GROUPED_COMMA_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d{1,3}(\.\d{3})*(,\d+)?$").unwrap());

/// `1234,56`: decimal comma, no grouping.
static COMMA_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+,\d+$").unwrap());

/// Separators used by the last-resort lenient parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberLocale {
    pub grouping: char,
    pub decimal: char,
}

impl Default for NumberLocale {
    fn default() -> Self {
        Self::EN_US
    }
}

impl NumberLocale {
    pub const EN_US: NumberLocale = NumberLocale {
        grouping: ',',
        decimal: '.',
    };

    pub const CONTINENTAL: NumberLocale = NumberLocale {
        grouping: '.',
        decimal: ',',
    };

    pub const FRENCH: NumberLocale = NumberLocale {
        grouping: '\u{a0}',
        decimal: ',',
    };

    /// Resolve a BCP 47 style tag such as `en-US` or `id_ID`. Unknown tags fall back to en-US.
    pub fn from_tag(tag: &str) -> Self {
        let language = tag
            .split(|c| c == '-' || c == '_')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        match language.as_str() {
            "id" | "de" | "nl" | "es" | "it" | "pt" | "da" | "tr" => Self::CONTINENTAL,
            "fr" | "ru" | "pl" | "cs" | "sv" | "nb" | "fi" => Self::FRENCH,
            _ => Self::EN_US,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocaleNumberParser {
    locale: NumberLocale,
}

impl LocaleNumberParser {
    pub fn with_locale(locale: NumberLocale) -> Self {
        Self { locale }
    }

    /// Parse trimmed text into a float. NaN and infinities are returned as-is.
    pub fn parse(&self, text: &str) -> Result<f64> {
        if let Some(value) = parse_grouped_comma_decimal(text) {
            return Ok(value);
        }

        if COMMA_DECIMAL.is_match(text) {
            if let Ok(value) = text.replace(',', ".").parse::<f64>() {
                return Ok(value);
            }
        }

        if let Ok(value) = text.parse::<f64>() {
            return Ok(value);
        }

        self.parse_lenient(text)
            .ok_or_else(|| AppError::NumberParse(text.to_string()))
    }

    /// Leading sign, digits with grouping separators, optional fraction.
    /// Stops at the first character that can't continue the number.
    fn parse_lenient(&self, text: &str) -> Option<f64> {
        let chars: Vec<char> = text.chars().collect();
        let mut normalized = String::with_capacity(chars.len());
        let mut i = 0;

        if let Some(&sign) = chars.first() {
            if sign == '-' || sign == '+' {
                normalized.push(sign);
                i += 1;
            }
        }

        let mut integer_digits = 0;
        while i < chars.len() {
            let c = chars[i];
            if c.is_ascii_digit() {
                normalized.push(c);
                integer_digits += 1;
            } else if c == self.locale.grouping
                && integer_digits > 0
                && chars.get(i + 1).map_or(false, |n| n.is_ascii_digit())
            {
                // grouping separator between digits: dropped
            } else {
                break;
            }
            i += 1;
        }

        if integer_digits == 0 {
            return None;
        }

        if i < chars.len() && chars[i] == self.locale.decimal {
            let fraction: String = chars[i + 1..]
                .iter()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if !fraction.is_empty() {
                normalized.push('.');
                normalized.push_str(&fraction);
            }
        }

        normalized.parse::<f64>().ok()
    }
}

/// Rule 1. A single period with no comma (`1.234`) is ambiguous and is left
/// to standard parsing.
fn parse_grouped_comma_decimal(text: &str) -> Option<f64> {
    if !GROUPED_COMMA_DECIMAL.is_match(text) {
        return None;
    }

    let has_comma = text.contains(',');
    let group_count = text.matches('.').count();
    if !has_comma && group_count < 2 {
        return None;
    }

    let (integer, fraction) = match text.split_once(',') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (text, None),
    };

    let mut normalized = integer.replace('.', "");
    if let Some(fraction) = fraction {
        normalized.push('.');
        normalized.push_str(fraction);
    }
    normalized.parse::<f64>().ok()
}

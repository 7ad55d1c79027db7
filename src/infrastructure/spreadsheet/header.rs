// ============================================================
// HEADER METADATA
// ============================================================
// Row 0 may name the case and the variables. Anything that is not
// a non-empty text cell, or that is a column placeholder, is ignored
// and the caller-supplied value stays.

use crate::domain::analysis::{AnovaInput, CorrelationInput};
use crate::domain::dataset::RawCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    CaseName,
    DependentName,
    IndependentName,
    XName,
    YName,
}

/// A header cell that may override one metadata field.
#[derive(Debug, Clone, Copy)]
pub struct HeaderSlot {
    pub column: usize,
    pub field: MetadataField,
    /// Literal column titles that carry no information (compared case-insensitively).
    pub placeholders: &'static [&'static str],
}

/// Column A: group label, column B: observed value.
pub const GROUPED_HEADER: &[HeaderSlot] = &[
    HeaderSlot {
        column: 0,
        field: MetadataField::IndependentName,
        placeholders: &["Group"],
    },
    HeaderSlot {
        column: 1,
        field: MetadataField::DependentName,
        placeholders: &["Value"],
    },
];

/// Column A: row number, column B: X, column C: Y. Any text in B1 or C1 names the variable.
pub const PAIRED_HEADER: &[HeaderSlot] = &[
    HeaderSlot {
        column: 0,
        field: MetadataField::CaseName,
        placeholders: &["No"],
    },
    HeaderSlot {
        column: 1,
        field: MetadataField::XName,
        placeholders: &[],
    },
    HeaderSlot {
        column: 2,
        field: MetadataField::YName,
        placeholders: &[],
    },
];

/// Caller-supplied metadata that the header row may refine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderHints {
    pub case_name: Option<String>,
    pub dependent_name: Option<String>,
    pub independent_name: Option<String>,
    pub x_name: Option<String>,
    pub y_name: Option<String>,
    pub alpha: Option<f64>,
}

impl HeaderHints {
    fn set(&mut self, field: MetadataField, value: String) {
        let target = match field {
            MetadataField::CaseName => &mut self.case_name,
            MetadataField::DependentName => &mut self.dependent_name,
            MetadataField::IndependentName => &mut self.independent_name,
            MetadataField::XName => &mut self.x_name,
            MetadataField::YName => &mut self.y_name,
        };
        *target = Some(value);
    }
}

impl From<&AnovaInput> for HeaderHints {
    fn from(input: &AnovaInput) -> Self {
        Self {
            case_name: input.case_name.clone(),
            dependent_name: input.dependent_name.clone(),
            independent_name: input.independent_name.clone(),
            alpha: input.alpha,
            ..Default::default()
        }
    }
}

impl From<&CorrelationInput> for HeaderHints {
    fn from(input: &CorrelationInput) -> Self {
        Self {
            case_name: input.case_name.clone(),
            x_name: input.x_name.clone(),
            y_name: input.y_name.clone(),
            alpha: input.alpha,
            ..Default::default()
        }
    }
}

/// Resolve metadata from the header row, falling back to `fallback` slot by slot.
pub fn resolve_header(
    header_row: Option<&[RawCell]>,
    slots: &[HeaderSlot],
    fallback: &HeaderHints,
) -> HeaderHints {
    let mut resolved = fallback.clone();
    let Some(row) = header_row else {
        return resolved;
    };

    for slot in slots {
        let Some(cell) = row.get(slot.column) else {
            continue;
        };
        if let Some(text) = header_text(cell, slot) {
            resolved.set(slot.field, text);
        }
    }

    resolved
}

fn header_text(cell: &RawCell, slot: &HeaderSlot) -> Option<String> {
    let RawCell::Text(text) = cell else {
        return None;
    };
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if slot
        .placeholders
        .iter()
        .any(|placeholder| placeholder.eq_ignore_ascii_case(text))
    {
        return None;
    }
    Some(text.to_string())
}

// ============================================================
// WORKBOOK LOADING
// ============================================================
// Open uploaded bytes as a spreadsheet (xlsx, xls, xlsb, ods) and
// copy the first worksheet into a SheetGrid.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use tracing::{debug, warn};

use super::table_reader::SheetGrid;
use crate::domain::dataset::RawCell;
use crate::domain::error::{AppError, Result};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// Whether `file_name` carries one of the accepted spreadsheet extensions.
pub fn has_supported_extension(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

/// Map a calamine cell onto a raw cell. Error cells only arise from failed formulas.
pub fn raw_cell(data: &Data) -> RawCell {
    match data {
        Data::Int(value) => RawCell::Numeric(*value as f64),
        Data::Float(value) => RawCell::Numeric(*value),
        Data::DateTime(value) => RawCell::Numeric(value.as_f64()),
        Data::String(value) | Data::DateTimeIso(value) | Data::DurationIso(value) => {
            RawCell::Text(value.clone())
        }
        Data::Bool(value) => RawCell::Boolean(*value),
        Data::Error(_) => RawCell::Formula(None),
        Data::Empty => RawCell::Blank,
    }
}

/// Open `bytes` and read the first worksheet.
///
/// The buffer is owned by this call and released on every exit path.
pub fn read_first_sheet(bytes: Vec<u8>) -> Result<SheetGrid> {
    let size = bytes.len();
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| {
        warn!(error = %e, size, "Failed to open uploaded workbook");
        AppError::CorruptFile(format!(
            "The Excel file is corrupt or not a valid spreadsheet: {}",
            e
        ))
    })?;

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        debug!("Workbook has no worksheets");
        return Ok(SheetGrid::default());
    };

    let values = workbook.worksheet_range(&sheet_name).map_err(|e| {
        warn!(error = %e, sheet = %sheet_name, "Failed to read worksheet");
        AppError::CorruptFile(format!(
            "The Excel file is corrupt or not a valid spreadsheet: {}",
            e
        ))
    })?;

    // Not every format exposes formulas; cached values are still usable without them.
    let formulas = workbook.worksheet_formula(&sheet_name).ok();

    let grid = grid_from_ranges(&values, formulas.as_ref());
    debug!(sheet = %sheet_name, rows = grid.row_count(), "Worksheet loaded");
    Ok(grid)
}

/// Build an A1-anchored grid; cells with a formula wrap their cached value.
pub fn grid_from_ranges(values: &Range<Data>, formulas: Option<&Range<String>>) -> SheetGrid {
    let Some((end_row, end_col)) = values.end() else {
        return SheetGrid::default();
    };

    let rows = (0..=end_row)
        .map(|row| {
            (0..=end_col)
                .map(|col| {
                    let cached = values
                        .get_value((row, col))
                        .map(raw_cell)
                        .unwrap_or(RawCell::Blank);
                    let is_formula = formulas
                        .and_then(|f| f.get_value((row, col)))
                        .map_or(false, |formula| !formula.is_empty());

                    if is_formula {
                        match cached {
                            RawCell::Formula(None) => RawCell::Formula(None),
                            other => RawCell::formula(other),
                        }
                    } else {
                        cached
                    }
                })
                .collect()
        })
        .collect();

    SheetGrid::new(rows)
}

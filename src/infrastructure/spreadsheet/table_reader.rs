// ============================================================
// SPREADSHEET TABLE READER
// ============================================================
// Walk the first sheet row by row and build a grouped or paired
// dataset. Malformed rows are skipped with a warning; only an empty
// or too-small result aborts the import.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::cell_value::{extract_text, integer_label};
use super::header::{resolve_header, HeaderHints, GROUPED_HEADER, PAIRED_HEADER};
use super::locale_number::LocaleNumberParser;
use crate::domain::analysis::{AnovaInput, CorrelationInput};
use crate::domain::dataset::{Group, GroupedDataset, PairedDataset, RawCell, ValidationPolicy};
use crate::domain::error::{AppError, Result};

pub const EXCEL_INPUT_METHOD: &str = "excel";

const EMPTY_DATASET: &str = "Spreadsheet data is empty or invalid (empty dataset).";

static BLANK: RawCell = RawCell::Blank;

/// Cells of one sheet, addressed from A1. Missing cells read as blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetGrid {
    rows: Vec<Vec<RawCell>>,
}

impl SheetGrid {
    pub fn new(rows: Vec<Vec<RawCell>>) -> Self {
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, index: usize) -> Option<&[RawCell]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    pub fn cell(&self, row: usize, column: usize) -> &RawCell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&BLANK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupedColumns {
    pub group: usize,
    pub value: usize,
}

impl Default for GroupedColumns {
    fn default() -> Self {
        Self { group: 0, value: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairedColumns {
    pub x: usize,
    pub y: usize,
}

impl Default for PairedColumns {
    fn default() -> Self {
        Self { x: 1, y: 2 }
    }
}

/// A dataset read from a sheet, with the metadata the header resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetImport<D> {
    pub dataset: D,
    pub metadata: HeaderHints,
    pub skipped_rows: usize,
}

impl SheetImport<GroupedDataset> {
    pub fn into_input(self) -> AnovaInput {
        let (names, values): (Vec<Option<String>>, Vec<Option<Vec<Option<f64>>>>) = self
            .dataset
            .groups
            .into_iter()
            .map(|g| (Some(g.name), Some(g.values.into_iter().map(Some).collect())))
            .unzip();

        AnovaInput {
            case_name: self.metadata.case_name,
            dependent_name: self.metadata.dependent_name,
            independent_name: self.metadata.independent_name,
            alpha: self.metadata.alpha,
            input_method: Some(EXCEL_INPUT_METHOD.to_string()),
            group_names: Some(names),
            group_values: Some(values),
        }
    }
}

impl SheetImport<PairedDataset> {
    pub fn into_input(self) -> CorrelationInput {
        CorrelationInput {
            case_name: self.metadata.case_name,
            x_name: self.metadata.x_name,
            y_name: self.metadata.y_name,
            alpha: self.metadata.alpha,
            input_method: Some(EXCEL_INPUT_METHOD.to_string()),
            x_values: Some(self.dataset.x.into_iter().map(Some).collect()),
            y_values: Some(self.dataset.y.into_iter().map(Some).collect()),
        }
    }
}

enum RowCells {
    Empty,
    Partial,
    Filled(String, String),
}

#[derive(Debug, Clone, Default)]
pub struct SpreadsheetTableReader {
    parser: LocaleNumberParser,
    policy: ValidationPolicy,
}

impl SpreadsheetTableReader {
    pub fn new(parser: LocaleNumberParser, policy: ValidationPolicy) -> Self {
        Self { parser, policy }
    }

    /// Read `(group, value)` rows. Groups keep the order in which they first appear.
    pub fn read_grouped(
        &self,
        grid: &SheetGrid,
        columns: GroupedColumns,
        fallback: &HeaderHints,
    ) -> Result<SheetImport<GroupedDataset>> {
        let metadata = resolve_header(grid.row(0), GROUPED_HEADER, fallback);

        let mut groups: Vec<Group> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut skipped_rows = 0;

        for row in 1..grid.row_count() {
            let name_cell = grid.cell(row, columns.group);
            let value_cell = grid.cell(row, columns.value);

            let (name_text, value_text) = match classify(name_cell, value_cell) {
                RowCells::Empty => continue,
                RowCells::Partial => {
                    warn!(
                        row = row + 1,
                        "Skipping row with a missing group or value cell"
                    );
                    skipped_rows += 1;
                    continue;
                }
                RowCells::Filled(name, value) => (name, value),
            };

            let Some(value) = self.parse_value(row, "value", &value_text) else {
                skipped_rows += 1;
                continue;
            };

            let name = integer_label(name_cell).unwrap_or(name_text);
            match index.get(&name) {
                Some(&position) => groups[position].values.push(value),
                None => {
                    index.insert(name.clone(), groups.len());
                    groups.push(Group {
                        name,
                        values: vec![value],
                    });
                }
            }
        }

        if groups.is_empty() {
            return Err(AppError::ShapeViolation(EMPTY_DATASET.to_string()));
        }
        if groups.len() < self.policy.min_groups {
            return Err(AppError::ShapeViolation(format!(
                "The spreadsheet must contain at least {} groups (insufficient groups: found {}).",
                self.policy.min_groups,
                groups.len()
            )));
        }

        let dataset = GroupedDataset { groups };
        debug!(
            groups = dataset.k(),
            values = dataset.n(),
            skipped_rows,
            "Grouped sheet read"
        );

        Ok(SheetImport {
            dataset,
            metadata,
            skipped_rows,
        })
    }

    /// Read `(x, y)` rows.
    pub fn read_paired(
        &self,
        grid: &SheetGrid,
        columns: PairedColumns,
        fallback: &HeaderHints,
    ) -> Result<SheetImport<PairedDataset>> {
        let metadata = resolve_header(grid.row(0), PAIRED_HEADER, fallback);

        let mut dataset = PairedDataset::default();
        let mut skipped_rows = 0;

        for row in 1..grid.row_count() {
            let x_cell = grid.cell(row, columns.x);
            let y_cell = grid.cell(row, columns.y);

            let (x_text, y_text) = match classify(x_cell, y_cell) {
                RowCells::Empty => continue,
                RowCells::Partial => {
                    warn!(row = row + 1, "Skipping row with a missing X or Y cell");
                    skipped_rows += 1;
                    continue;
                }
                RowCells::Filled(x, y) => (x, y),
            };

            let (Some(x), Some(y)) = (
                self.parse_value(row, "X", &x_text),
                self.parse_value(row, "Y", &y_text),
            ) else {
                skipped_rows += 1;
                continue;
            };

            dataset.x.push(x);
            dataset.y.push(y);
        }

        if dataset.x.is_empty() || dataset.y.is_empty() {
            return Err(AppError::ShapeViolation(EMPTY_DATASET.to_string()));
        }

        debug!(pairs = dataset.n(), skipped_rows, "Paired sheet read");

        Ok(SheetImport {
            dataset,
            metadata,
            skipped_rows,
        })
    }

    fn parse_value(&self, row: usize, label: &str, text: &str) -> Option<f64> {
        match self.parser.parse(text) {
            Ok(value) if value.is_finite() => Some(value),
            Ok(value) => {
                warn!(
                    row = row + 1,
                    column = label,
                    %value,
                    "Skipping non-finite value"
                );
                None
            }
            Err(err) => {
                warn!(
                    row = row + 1,
                    column = label,
                    error = %err,
                    "Skipping unparseable value"
                );
                None
            }
        }
    }
}

fn classify(first: &RawCell, second: &RawCell) -> RowCells {
    let first = extract_text(first).trim().to_string();
    let second = extract_text(second).trim().to_string();

    match (first.is_empty(), second.is_empty()) {
        (true, true) => RowCells::Empty,
        (false, false) => RowCells::Filled(first, second),
        _ => RowCells::Partial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> RawCell {
        RawCell::text(value)
    }

    fn num(value: f64) -> RawCell {
        RawCell::Numeric(value)
    }

    fn hints() -> HeaderHints {
        HeaderHints {
            case_name: Some("Plant growth".to_string()),
            dependent_name: Some("Height".to_string()),
            independent_name: Some("Fertilizer".to_string()),
            x_name: Some("Hours".to_string()),
            y_name: Some("Score".to_string()),
            alpha: Some(0.05),
        }
    }

    fn reader() -> SpreadsheetTableReader {
        SpreadsheetTableReader::default()
    }

    fn group_names(dataset: &GroupedDataset) -> Vec<&str> {
        dataset.groups.iter().map(|g| g.name.as_str()).collect()
    }

    fn grouped_grid() -> SheetGrid {
        SheetGrid::new(vec![
            vec![text("Group"), text("Value")],
            vec![text("A"), num(1.0)],
            vec![text("A"), text("2,5")],
            vec![text("B"), num(3.0)],
            vec![text("B"), RawCell::Blank],
            vec![RawCell::Blank, RawCell::Blank],
            vec![text("C"), RawCell::formula(num(4.0))],
            vec![text("B"), text("1.234,5")],
            vec![text("C"), text("n/a")],
            vec![text("C"), num(f64::NAN)],
            vec![text("C"), num(6.0)],
        ])
    }

    #[test]
    fn test_read_grouped_skips_bad_rows() {
        let import = reader()
            .read_grouped(&grouped_grid(), GroupedColumns::default(), &hints())
            .unwrap();

        assert_eq!(group_names(&import.dataset), vec!["A", "B", "C"]);
        assert_eq!(import.dataset.groups[0].values, vec![1.0, 2.5]);
        assert_eq!(import.dataset.groups[1].values, vec![3.0, 1234.5]);
        assert_eq!(import.dataset.groups[2].values, vec![4.0, 6.0]);
        // partial row, unparseable value, NaN value; the blank row is not counted
        assert_eq!(import.skipped_rows, 3);
        assert_eq!(import.dataset.n(), 6);
    }

    #[test]
    fn test_read_grouped_keeps_fallback_for_placeholder_header() {
        let import = reader()
            .read_grouped(&grouped_grid(), GroupedColumns::default(), &hints())
            .unwrap();
        assert_eq!(
            import.metadata.independent_name.as_deref(),
            Some("Fertilizer")
        );
        assert_eq!(import.metadata.dependent_name.as_deref(), Some("Height"));
    }

    #[test]
    fn test_read_grouped_numeric_group_labels() {
        let grid = SheetGrid::new(vec![
            vec![text("Dose"), text("Response")],
            vec![num(1.0), num(10.0)],
            vec![num(2.0), num(20.0)],
            vec![num(3.0), num(30.0)],
            vec![num(1.0), num(11.0)],
        ]);
        let import = reader()
            .read_grouped(&grid, GroupedColumns::default(), &hints())
            .unwrap();

        assert_eq!(group_names(&import.dataset), vec!["1", "2", "3"]);
        assert_eq!(import.dataset.groups[0].values, vec![10.0, 11.0]);
        assert_eq!(import.metadata.independent_name.as_deref(), Some("Dose"));
        assert_eq!(import.metadata.dependent_name.as_deref(), Some("Response"));
    }

    #[test]
    fn test_read_grouped_empty_sheet() {
        let grid = SheetGrid::new(vec![vec![text("Group"), text("Value")]]);
        let err = reader()
            .read_grouped(&grid, GroupedColumns::default(), &hints())
            .unwrap_err();
        assert_eq!(err, AppError::ShapeViolation(EMPTY_DATASET.to_string()));
    }

    #[test]
    fn test_read_grouped_insufficient_groups() {
        let grid = SheetGrid::new(vec![
            vec![text("Group"), text("Value")],
            vec![text("A"), num(1.0)],
            vec![text("B"), num(2.0)],
        ]);
        let err = reader()
            .read_grouped(&grid, GroupedColumns::default(), &hints())
            .unwrap_err();
        assert!(
            matches!(err, AppError::ShapeViolation(ref msg) if msg.contains("insufficient groups"))
        );
    }

    #[test]
    fn test_read_paired() {
        let grid = SheetGrid::new(vec![
            vec![text("No"), text("Study hours"), text("Y")],
            vec![num(1.0), num(2.0), num(60.0)],
            vec![num(2.0), text("3,5"), num(65.0)],
            vec![num(3.0), RawCell::Blank, num(70.0)],
            vec![num(4.0), RawCell::Blank, RawCell::Blank],
            vec![num(5.0), num(5.0), RawCell::Formula(None)],
            vec![num(6.0), num(6.0), RawCell::formula(num(80.0))],
            vec![num(7.0), text("x"), num(81.0)],
        ]);
        let import = reader()
            .read_paired(&grid, PairedColumns::default(), &hints())
            .unwrap();

        assert_eq!(import.dataset.x, vec![2.0, 3.5, 6.0]);
        assert_eq!(import.dataset.y, vec![60.0, 65.0, 80.0]);
        assert_eq!(import.skipped_rows, 3);
        assert_eq!(import.metadata.x_name.as_deref(), Some("Study hours"));
        assert_eq!(import.metadata.y_name.as_deref(), Some("Y"));
        assert_eq!(import.metadata.case_name.as_deref(), Some("Plant growth"));
    }

    #[test]
    fn test_read_paired_empty() {
        let grid = SheetGrid::new(vec![
            vec![text("No"), text("X"), text("Y")],
            vec![num(1.0), text("abc"), num(3.0)],
        ]);
        let err = reader()
            .read_paired(&grid, PairedColumns::default(), &hints())
            .unwrap_err();
        assert_eq!(err, AppError::ShapeViolation(EMPTY_DATASET.to_string()));
    }

    #[test]
    fn test_into_input_marks_excel() {
        let import = reader()
            .read_grouped(&grouped_grid(), GroupedColumns::default(), &hints())
            .unwrap();
        let input = import.into_input();
        assert_eq!(input.input_method.as_deref(), Some(EXCEL_INPUT_METHOD));
        assert_eq!(input.alpha, Some(0.05));
        assert_eq!(input.group_names.as_ref().map(|n| n.len()), Some(3));
        assert_eq!(
            input.group_values.unwrap()[0],
            Some(vec![Some(1.0), Some(2.5)])
        );
    }
}

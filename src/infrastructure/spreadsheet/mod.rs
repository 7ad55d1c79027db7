pub mod cell_value;
pub mod header;
pub mod locale_number;
pub mod table_reader;
pub mod workbook;

pub use locale_number::{LocaleNumberParser, NumberLocale};
pub use table_reader::{GroupedColumns, PairedColumns, SheetGrid, SpreadsheetTableReader};
pub use workbook::{has_supported_extension, read_first_sheet};

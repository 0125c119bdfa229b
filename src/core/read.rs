//! Purpose: Single-range reads passed straight through to the backend.
//! Exports: `read_range`.
//! Invariants: The backend's `range` is echoed back; missing values become an empty list.

use super::backend::SheetsBackend;
use super::error::{Error, ErrorKind};
use super::model::ValueRange;
use super::reference::SpreadsheetRef;

pub fn read_range(
    backend: &dyn SheetsBackend,
    spreadsheet: &SpreadsheetRef,
    range: &str,
) -> Result<ValueRange, Error> {
    let range = range.trim();
    if range.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("range must not be empty")
            .with_hint("Use A1 notation such as Sheet1!A1:C10."));
    }
    backend
        .get_values(spreadsheet, range)
        .map_err(|err| err.with_spreadsheet(spreadsheet.as_str()))
}

//! Purpose: Define the gateway contract the export and paste engines consume.
//! Exports: `SheetsBackend`.
//! Role: Seam between pure orchestration and network transport.
//! Invariants: `batch_mutate` applies all ops or none.
//! Invariants: Implementations own auth, pooling, and timeouts; callers never retry.

use super::error::Error;
use super::model::{FileList, FileQuery, MutationOp, SpreadsheetMeta, ValueRange};
use super::reference::SpreadsheetRef;

pub trait SheetsBackend: Send + Sync {
    fn get_metadata(&self, spreadsheet: &SpreadsheetRef) -> Result<SpreadsheetMeta, Error>;

    fn get_values(&self, spreadsheet: &SpreadsheetRef, range: &str) -> Result<ValueRange, Error>;

    fn batch_mutate(&self, spreadsheet: &SpreadsheetRef, ops: &[MutationOp]) -> Result<(), Error>;

    fn search_files(&self, query: &FileQuery) -> Result<FileList, Error>;
}

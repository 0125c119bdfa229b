//! Purpose: Define the public Rust API boundary for sheetport.
//! Exports: Core types and operations needed by the MCP tools, the CLI, and embedders.
//! Role: Public, additive-only surface over the `core` modules and the HTTP backend.
//! Invariants: This module is the only public path to core types.

mod client;
mod google;

pub use crate::core::backend::SheetsBackend;
pub use crate::core::encode::{ExportFormat, encode, encode_rows};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::export::{
    ExportOptions, FailedSheetPolicy, SheetRead, read_sheets, render_export, sheet_range,
};
pub use crate::core::model::{
    FileEntry, FileList, FileQuery, MutationOp, PasteMode, Row, SheetDescriptor,
    SpreadsheetMeta, TabularBlock, ValueRange,
};
pub use crate::core::paste::{MAX_GRID_INDEX, PasteReport, PasteRequest, plan_upsert};
pub use crate::core::reference::SpreadsheetRef;
pub use crate::core::resolve::{MAX_SHEET_ID, Resolution, resolve, resolve_with};
pub use client::{DEFAULT_PAGE_SIZE, FindOptions, MAX_PAGE_SIZE, SheetsClient};
pub use google::{
    DEFAULT_DRIVE_URL, DEFAULT_SHEETS_URL, GoogleBackend, SPREADSHEET_MIME_TYPE,
    batch_update_body, drive_query,
};

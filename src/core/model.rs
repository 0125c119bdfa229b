//! Purpose: Plain data types shared by the exporter, resolver, paster, and backends.
//! Exports: `SpreadsheetMeta`, `SheetDescriptor`, `Row`, `TabularBlock`, `ValueRange`,
//! `FileQuery`, `FileList`, `FileEntry`, `MutationOp`, `PasteMode`.
//! Role: Snapshot values; nothing here outlives a single call or talks to the network.
//! Invariants: Sheet order in `SpreadsheetMeta::sheets` is the spreadsheet's tab order.
//! Invariants: Serialized field names are camelCase to match the tool payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of cell values. Cells are strings, numbers, booleans, or null; rows may be ragged.
pub type Row = Vec<Value>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetDescriptor {
    pub sheet_id: i32,
    pub title: String,
    pub index: i32,
    pub row_count: u32,
    pub column_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetMeta {
    pub spreadsheet_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    pub sheets: Vec<SheetDescriptor>,
}

impl SpreadsheetMeta {
    pub fn sheet_by_title(&self, title: &str) -> Option<&SheetDescriptor> {
        self.sheets.iter().find(|sheet| sheet.title == title)
    }

    pub fn has_sheet_id(&self, sheet_id: i32) -> bool {
        self.sheets.iter().any(|sheet| sheet.sheet_id == sheet_id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TabularBlock {
    pub sheet_title: String,
    pub rows: Vec<Row>,
}

impl TabularBlock {
    pub fn new(sheet_title: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            sheet_title: sheet_title.into(),
            rows,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub range: String,
    #[serde(default)]
    pub values: Vec<Row>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileQuery {
    pub mime_type: String,
    pub text: String,
    pub page_token: Option<String>,
    pub page_size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Paste semantics for `MutationOp::PasteData`.
///
/// `Normal` overwrites the target cells in place without shifting neighbours.
/// What happens to cells beyond the pasted block is up to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasteMode {
    Normal,
}

/// One structural or content change inside an atomic batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationOp {
    CreateSheet {
        title: String,
        sheet_id: i32,
    },
    PasteData {
        sheet_id: i32,
        row_index: u32,
        column_index: u32,
        data: String,
        delimiter: char,
        mode: PasteMode,
    },
}

impl MutationOp {
    pub fn sheet_id(&self) -> i32 {
        match self {
            MutationOp::CreateSheet { sheet_id, .. } | MutationOp::PasteData { sheet_id, .. } => {
                *sheet_id
            }
        }
    }
}

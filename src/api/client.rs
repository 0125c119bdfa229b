//! Purpose: Caller-facing facade over a `SheetsBackend`.
//! Exports: `SheetsClient`, `FindOptions`.
//! Role: One entry point per operation, shared by the MCP tools and the CLI.
//! Invariants: Methods take already-parsed `SpreadsheetRef`s and never retry.
//! Invariants: Search page sizes are clamped to `1..=MAX_PAGE_SIZE`.
#![allow(clippy::result_large_err)]

use std::sync::Arc;

use super::google::SPREADSHEET_MIME_TYPE;
use crate::core::backend::SheetsBackend;
use crate::core::error::Error;
use crate::core::export::{ExportOptions, export_all};
use crate::core::model::{FileList, FileQuery, SpreadsheetMeta, ValueRange};
use crate::core::paste::{PasteReport, PasteRequest, upsert_paste};
use crate::core::read::read_range;
use crate::core::reference::SpreadsheetRef;

pub type ApiResult<T> = Result<T, Error>;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub page_token: Option<String>,
    pub page_size: Option<u32>,
}

#[derive(Clone)]
pub struct SheetsClient {
    backend: Arc<dyn SheetsBackend>,
}

impl SheetsClient {
    pub fn new(backend: impl SheetsBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_shared(backend: Arc<dyn SheetsBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn SheetsBackend {
        self.backend.as_ref()
    }

    pub fn export(&self, spreadsheet: &SpreadsheetRef, options: ExportOptions) -> ApiResult<String> {
        export_all(self.backend(), spreadsheet, options)
    }

    pub fn read_range(&self, spreadsheet: &SpreadsheetRef, range: &str) -> ApiResult<ValueRange> {
        read_range(self.backend(), spreadsheet, range)
    }

    pub fn metadata(&self, spreadsheet: &SpreadsheetRef) -> ApiResult<SpreadsheetMeta> {
        self.backend
            .get_metadata(spreadsheet)
            .map_err(|err| err.with_spreadsheet(spreadsheet.as_str()))
    }

    pub fn find(&self, text: &str, options: FindOptions) -> ApiResult<FileList> {
        let query = FileQuery {
            mime_type: SPREADSHEET_MIME_TYPE.to_string(),
            text: text.to_string(),
            page_token: options.page_token.filter(|token| !token.is_empty()),
            page_size: options
                .page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        };
        self.backend.search_files(&query)
    }

    pub fn paste_csv(
        &self,
        spreadsheet: &SpreadsheetRef,
        request: &PasteRequest,
    ) -> ApiResult<PasteReport> {
        upsert_paste(self.backend(), spreadsheet, request)
    }
}

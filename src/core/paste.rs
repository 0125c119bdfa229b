//! Purpose: Write CSV data into a named sheet, creating the sheet when it is missing.
//! Exports: `PasteRequest`, `PasteReport`, `plan_upsert`, `upsert_paste`, `MAX_GRID_INDEX`.
//! Role: Builds one ordered mutation batch and hands it to the backend.
//! Invariants: A batch holds at most one `CreateSheet`, always before the single `PasteData`.
//! Invariants: Both ops in a batch reference the same sheet ID.
//! Invariants: No retries and no local rollback; atomicity is the backend's job.

use tracing::{debug, info};

use super::backend::SheetsBackend;
use super::error::{Error, ErrorKind};
use super::model::{MutationOp, PasteMode};
use super::reference::SpreadsheetRef;
use super::resolve::{Resolution, resolve};

pub const PASTE_DELIMITER: char = ',';
/// Largest row/column index the backend grid accepts (int32).
pub const MAX_GRID_INDEX: u32 = i32::MAX as u32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasteRequest {
    pub title: String,
    pub csv_data: String,
    pub start_row: u32,
    pub start_column: u32,
}

impl PasteRequest {
    pub fn new(title: impl Into<String>, csv_data: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            csv_data: csv_data.into(),
            start_row: 0,
            start_column: 0,
        }
    }

    pub fn at(mut self, start_row: u32, start_column: u32) -> Self {
        self.start_row = start_row;
        self.start_column = start_column;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasteReport {
    pub title: String,
    pub sheet_id: i32,
    pub created: bool,
}

impl PasteReport {
    pub fn message(&self) -> String {
        if self.created {
            format!("Created new sheet \"{}\" and populated with data", self.title)
        } else {
            format!("Updated existing sheet \"{}\" with data", self.title)
        }
    }
}

pub fn plan_upsert(resolution: &Resolution, request: &PasteRequest) -> Vec<MutationOp> {
    let mut ops = Vec::with_capacity(2);
    if let Resolution::Create { title, sheet_id } = resolution {
        ops.push(MutationOp::CreateSheet {
            title: title.clone(),
            sheet_id: *sheet_id,
        });
    }
    ops.push(MutationOp::PasteData {
        sheet_id: resolution.sheet_id(),
        row_index: request.start_row,
        column_index: request.start_column,
        data: request.csv_data.clone(),
        delimiter: PASTE_DELIMITER,
        mode: PasteMode::Normal,
    });
    ops
}

pub fn upsert_paste(
    backend: &dyn SheetsBackend,
    spreadsheet: &SpreadsheetRef,
    request: &PasteRequest,
) -> Result<PasteReport, Error> {
    if request.title.trim().is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("sheet title must not be empty"));
    }
    for (name, index) in [("row", request.start_row), ("column", request.start_column)] {
        if index > MAX_GRID_INDEX {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("start {name} must be at most {MAX_GRID_INDEX}"))
                .with_sheet(request.title.clone()));
        }
    }
    let meta = backend
        .get_metadata(spreadsheet)
        .map_err(|err| err.with_spreadsheet(spreadsheet.as_str()))?;
    let resolution = resolve(&meta, &request.title)?;
    let ops = plan_upsert(&resolution, request);
    debug!(
        spreadsheet = %spreadsheet,
        sheet = %request.title,
        ops = ops.len(),
        "submitting paste batch"
    );
    backend.batch_mutate(spreadsheet, &ops).map_err(|err| {
        err.with_spreadsheet(spreadsheet.as_str())
            .with_sheet(request.title.clone())
    })?;

    let report = PasteReport {
        title: request.title.clone(),
        sheet_id: resolution.sheet_id(),
        created: resolution.is_new(),
    };
    if report.created {
        info!(
            spreadsheet = %spreadsheet,
            sheet = %report.title,
            sheet_id = report.sheet_id,
            "created sheet"
        );
    }
    Ok(report)
}

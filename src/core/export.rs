//! Purpose: Export every sheet of a spreadsheet into one text, CSV, or JSON body.
//! Exports: `ExportOptions`, `FailedSheetPolicy`, `SheetRead`, `export_all`, `read_sheets`,
//! `render_export`.
//! Role: Orchestrates metadata fetch, sequential per-sheet reads, and the final fold.
//! Invariants: Sheets are read one at a time, in spreadsheet order.
//! Invariants: A failed sheet never fails the export; only metadata failure does.
//! Invariants: JSON output keys follow sheet order.

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::backend::SheetsBackend;
use super::encode::{ExportFormat, encode_rows};
use super::error::{Error, ErrorKind};
use super::model::{Row, SpreadsheetMeta};
use super::reference::SpreadsheetRef;

pub const SHEET_ERROR_MARKER: &str = "(Error reading sheet)";

/// What to do with a sheet whose range could not be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailedSheetPolicy {
    /// Keep the sheet in the output with an error marker in place of its rows.
    Inline,
    /// Leave the sheet out of the output entirely.
    Omit,
}

impl FailedSheetPolicy {
    pub fn default_for(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Text | ExportFormat::Csv => FailedSheetPolicy::Inline,
            // Error markers would otherwise show up as sheet data.
            ExportFormat::Json => FailedSheetPolicy::Omit,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub failed_sheets: FailedSheetPolicy,
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            failed_sheets: FailedSheetPolicy::default_for(format),
        }
    }

    pub fn with_failed_sheets(mut self, policy: FailedSheetPolicy) -> Self {
        self.failed_sheets = policy;
        self
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::new(ExportFormat::default())
    }
}

/// Outcome of reading one sheet's full range.
#[derive(Debug)]
pub struct SheetRead {
    pub title: String,
    pub rows: Result<Vec<Row>, Error>,
}

pub fn export_all(
    backend: &dyn SheetsBackend,
    spreadsheet: &SpreadsheetRef,
    options: ExportOptions,
) -> Result<String, Error> {
    let meta = backend
        .get_metadata(spreadsheet)
        .map_err(|err| err.with_spreadsheet(spreadsheet.as_str()))?;
    let reads = read_sheets(backend, spreadsheet, &meta);
    render_export(&meta.title, &reads, options)
}

pub fn read_sheets(
    backend: &dyn SheetsBackend,
    spreadsheet: &SpreadsheetRef,
    meta: &SpreadsheetMeta,
) -> Vec<SheetRead> {
    meta.sheets
        .iter()
        .map(|sheet| {
            let rows = backend
                .get_values(spreadsheet, &sheet_range(&sheet.title))
                .map(|range| range.values);
            match &rows {
                Ok(rows) => debug!(sheet = %sheet.title, rows = rows.len(), "read sheet"),
                Err(err) => warn!(
                    spreadsheet = %spreadsheet,
                    sheet = %sheet.title,
                    error = %err,
                    "failed to read sheet; continuing export"
                ),
            }
            SheetRead {
                title: sheet.title.clone(),
                rows,
            }
        })
        .collect()
}

pub fn render_export(
    spreadsheet_title: &str,
    reads: &[SheetRead],
    options: ExportOptions,
) -> Result<String, Error> {
    match options.format {
        ExportFormat::Json => render_json(reads, options.failed_sheets),
        ExportFormat::Text | ExportFormat::Csv => Ok(render_sections(
            spreadsheet_title,
            reads,
            options.format,
            options.failed_sheets,
        )),
    }
}

fn render_sections(
    spreadsheet_title: &str,
    reads: &[SheetRead],
    format: ExportFormat,
    policy: FailedSheetPolicy,
) -> String {
    let mut out = format!("Spreadsheet: {spreadsheet_title}\n\n");
    for read in reads {
        let body = match (&read.rows, policy) {
            (Ok(rows), _) => encode_rows(rows, format),
            (Err(_), FailedSheetPolicy::Inline) => SHEET_ERROR_MARKER.to_string(),
            (Err(_), FailedSheetPolicy::Omit) => continue,
        };
        out.push_str("Sheet Name: ");
        out.push_str(&read.title);
        out.push('\n');
        out.push_str(&body);
        out.push_str("\n\n");
    }
    out.truncate(out.trim_end().len());
    out
}

fn render_json(reads: &[SheetRead], policy: FailedSheetPolicy) -> Result<String, Error> {
    let mut sheets = Map::new();
    for read in reads {
        match (&read.rows, policy) {
            (Ok(rows), _) => {
                sheets.insert(read.title.clone(), json!(rows));
            }
            (Err(_), FailedSheetPolicy::Inline) => {
                sheets.insert(read.title.clone(), json!({ "error": SHEET_ERROR_MARKER }));
            }
            (Err(_), FailedSheetPolicy::Omit) => {}
        }
    }
    serde_json::to_string_pretty(&Value::Object(sheets)).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode export json")
            .with_source(err)
    })
}

/// A1 range covering a whole sheet. Titles are always quoted so names with
/// spaces, `!`, or a leading digit resolve to the sheet and not a cell.
pub fn sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::{
        ExportOptions, FailedSheetPolicy, SHEET_ERROR_MARKER, SheetRead, export_all,
        render_export, sheet_range,
    };
    use crate::core::backend::SheetsBackend;
    use crate::core::encode::ExportFormat;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::model::{
        FileList, FileQuery, MutationOp, Row, SheetDescriptor, SpreadsheetMeta, ValueRange,
    };
    use crate::core::reference::SpreadsheetRef;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeBackend {
        meta: Option<SpreadsheetMeta>,
        values: HashMap<String, Vec<Row>>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn new(titles: &[&str]) -> Self {
            let sheets = titles
                .iter()
                .enumerate()
                .map(|(index, title)| SheetDescriptor {
                    sheet_id: index as i32 * 10,
                    title: title.to_string(),
                    index: index as i32,
                    row_count: 100,
                    column_count: 10,
                })
                .collect();
            Self {
                meta: Some(SpreadsheetMeta {
                    spreadsheet_id: "doc".to_string(),
                    title: "Budget".to_string(),
                    locale: None,
                    time_zone: None,
                    sheets,
                }),
                values: HashMap::new(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn with_rows(mut self, title: &str, rows: Value) -> Self {
            let rows: Vec<Row> = serde_json::from_value(rows).expect("rows");
            self.values.insert(sheet_range(title), rows);
            self
        }
    }

    impl SheetsBackend for FakeBackend {
        fn get_metadata(&self, _spreadsheet: &SpreadsheetRef) -> Result<SpreadsheetMeta, Error> {
            self.meta.clone().ok_or_else(|| {
                Error::new(ErrorKind::NotFound).with_message("Requested entity was not found.")
            })
        }

        fn get_values(
            &self,
            _spreadsheet: &SpreadsheetRef,
            range: &str,
        ) -> Result<ValueRange, Error> {
            self.requested.lock().expect("lock").push(range.to_string());
            self.values
                .get(range)
                .map(|rows| ValueRange {
                    range: range.to_string(),
                    values: rows.clone(),
                })
                .ok_or_else(|| Error::new(ErrorKind::Transport).with_message("boom"))
        }

        fn batch_mutate(
            &self,
            _spreadsheet: &SpreadsheetRef,
            _ops: &[MutationOp],
        ) -> Result<(), Error> {
            unreachable!("export never mutates")
        }

        fn search_files(&self, _query: &FileQuery) -> Result<FileList, Error> {
            unreachable!("export never searches")
        }
    }

    fn doc() -> SpreadsheetRef {
        SpreadsheetRef::parse("doc").expect("ref")
    }

    #[test]
    fn csv_export_matches_documented_layout() {
        let backend =
            FakeBackend::new(&["Sheet1"]).with_rows("Sheet1", json!([["a", "b"], ["c, d", "e\"f"]]));
        let body = export_all(&backend, &doc(), ExportOptions::new(ExportFormat::Csv)).expect("ok");
        assert_eq!(
            body,
            "Spreadsheet: Budget\n\nSheet Name: Sheet1\na,b\n\"c, d\",\"e\"\"f\""
        );
    }

    #[test]
    fn text_export_marks_empty_and_failed_sheets() {
        let backend = FakeBackend::new(&["Empty", "Broken", "Data"])
            .with_rows("Empty", json!([]))
            .with_rows("Data", json!([["x", 1]]));
        let body = export_all(&backend, &doc(), ExportOptions::new(ExportFormat::Text)).expect("ok");
        assert!(body.contains("Sheet Name: Empty\n(Empty sheet)\n\n"));
        assert!(body.contains(&format!("Sheet Name: Broken\n{SHEET_ERROR_MARKER}\n\n")));
        assert!(body.ends_with("Sheet Name: Data\nx | 1"));
        assert_eq!(
            *backend.requested.lock().expect("lock"),
            vec!["'Empty'", "'Broken'", "'Data'"]
        );
    }

    #[test]
    fn json_export_drops_failed_sheets_and_keeps_order() {
        let backend = FakeBackend::new(&["Zeta", "Broken", "Alpha"])
            .with_rows("Zeta", json!([["z"]]))
            .with_rows("Alpha", json!([["a", 2], []]));
        let body = export_all(&backend, &doc(), ExportOptions::new(ExportFormat::Json)).expect("ok");
        let value: Value = serde_json::from_str(&body).expect("json");
        let object = value.as_object().expect("object");
        assert_eq!(object.keys().collect::<Vec<_>>(), vec!["Zeta", "Alpha"]);
        assert_eq!(value["Alpha"], json!([["a", 2], []]));
        assert!(!body.starts_with("Spreadsheet:"));
    }

    #[test]
    fn metadata_failure_fails_the_export() {
        let mut backend = FakeBackend::new(&[]);
        backend.meta = None;
        let err = export_all(&backend, &doc(), ExportOptions::default()).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.spreadsheet(), Some("doc"));
    }

    #[test]
    fn policy_switch_overrides_format_default() {
        let reads = vec![
            SheetRead {
                title: "Ok".to_string(),
                rows: Ok(vec![vec![json!("v")]]),
            },
            SheetRead {
                title: "Bad".to_string(),
                rows: Err(Error::new(ErrorKind::Transport)),
            },
        ];
        let text = render_export(
            "T",
            &reads,
            ExportOptions::new(ExportFormat::Text).with_failed_sheets(FailedSheetPolicy::Omit),
        )
        .expect("text");
        assert_eq!(text, "Spreadsheet: T\n\nSheet Name: Ok\nv");

        let json_body = render_export(
            "T",
            &reads,
            ExportOptions::new(ExportFormat::Json).with_failed_sheets(FailedSheetPolicy::Inline),
        )
        .expect("json");
        let value: Value = serde_json::from_str(&json_body).expect("json");
        assert_eq!(value["Bad"]["error"], json!(SHEET_ERROR_MARKER));
    }

    #[test]
    fn spreadsheet_without_sheets_renders_title_only() {
        let backend = FakeBackend::new(&[]);
        let body = export_all(&backend, &doc(), ExportOptions::default()).expect("ok");
        assert_eq!(body, "Spreadsheet: Budget");
        let json_body =
            export_all(&backend, &doc(), ExportOptions::new(ExportFormat::Json)).expect("ok");
        assert_eq!(json_body, "{}");
    }

    #[test]
    fn sheet_range_quotes_titles() {
        assert_eq!(sheet_range("Q1 2024"), "'Q1 2024'");
        assert_eq!(sheet_range("Bob's"), "'Bob''s'");
    }
}

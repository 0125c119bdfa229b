//! Purpose: Render rows of cell values as text, CSV, or JSON.
//! Exports: `ExportFormat`, `encode`, `encode_rows`, `cell_text`.
//! Role: Pure formatting used by the multi-sheet exporter.
//! Invariants: Encoding never fails; odd cell values are coerced to strings.
//! Invariants: Output is deterministic for a given input.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::error::{Error, ErrorKind};
use super::model::{Row, TabularBlock};

pub const EMPTY_SHEET_MARKER: &str = "(Empty sheet)";
const TEXT_CELL_SEPARATOR: &str = " | ";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Text,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Text => "text",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(ExportFormat::Text),
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported format: {other}"))
                .with_hint("Use one of: text, csv, json.")),
        }
    }
}

pub fn encode(block: &TabularBlock, format: ExportFormat) -> String {
    encode_rows(&block.rows, format)
}

pub fn encode_rows(rows: &[Row], format: ExportFormat) -> String {
    match format {
        ExportFormat::Text => encode_text(rows),
        ExportFormat::Csv => encode_csv(rows),
        // Rows are plain JSON values, so pretty printing cannot fail.
        ExportFormat::Json => serde_json::to_string_pretty(rows).unwrap_or_default(),
    }
}

fn encode_text(rows: &[Row]) -> String {
    if rows.is_empty() {
        return EMPTY_SHEET_MARKER.to_string();
    }
    rows.iter()
        .map(|row| {
            row.iter()
                .map(cell_text)
                .collect::<Vec<_>>()
                .join(TEXT_CELL_SEPARATOR)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn encode_csv(rows: &[Row]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|cell| csv_field(&cell_text(cell)))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// String form of a single cell as shown in text and CSV output.
pub fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        nested => nested.to_string(),
    }
}

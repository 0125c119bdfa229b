//! Purpose: Expose the spreadsheet operations as MCP tools.
//! Exports: `SheetsMcpHandler`, tool name constants.
//! Role: Argument parsing and result envelopes between `mcp` and `api::SheetsClient`.
//! Invariants: Every known tool call yields exactly one text content item.
//! Invariants: Operation and argument failures become `isError` results with `{"error": ...}` text.
//! Invariants: Unknown tool names are protocol errors, not execution errors.

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::api::{
    Error, ErrorKind, ExportFormat, ExportOptions, FindOptions, MAX_GRID_INDEX, PasteRequest,
    SheetsClient, SpreadsheetRef,
};
use crate::mcp::{McpHandler, RpcError, ToolAnnotations, ToolCall, ToolDescriptor, ToolOutput};

pub const GET_TEXT: &str = "getText";
pub const GET_RANGE: &str = "getRange";
pub const FIND: &str = "find";
pub const GET_METADATA: &str = "getMetadata";
pub const PASTE_CSV_DATA: &str = "pasteCSVData";

pub struct SheetsMcpHandler {
    client: SheetsClient,
}

impl SheetsMcpHandler {
    pub fn new(client: SheetsClient) -> Self {
        Self { client }
    }

    fn run(&self, name: &str, args: &Map<String, Value>) -> Result<String, Error> {
        match name {
            GET_TEXT => self.get_text(args),
            GET_RANGE => self.get_range(args),
            FIND => self.find(args),
            GET_METADATA => self.get_metadata(args),
            PASTE_CSV_DATA => self.paste_csv_data(args),
            other => Err(Error::new(ErrorKind::Internal)
                .with_message(format!("tool dispatch reached unknown tool: {other}"))),
        }
    }

    fn get_text(&self, args: &Map<String, Value>) -> Result<String, Error> {
        let spreadsheet = spreadsheet_arg(args)?;
        let format = match optional_str(args, "format")? {
            Some(value) => value.parse::<ExportFormat>()?,
            None => ExportFormat::default(),
        };
        self.client.export(&spreadsheet, ExportOptions::new(format))
    }

    fn get_range(&self, args: &Map<String, Value>) -> Result<String, Error> {
        let spreadsheet = spreadsheet_arg(args)?;
        let range = required_str(args, "range")?;
        let values = self.client.read_range(&spreadsheet, range)?;
        pretty_json(&values)
    }

    fn find(&self, args: &Map<String, Value>) -> Result<String, Error> {
        let query = required_str(args, "query")?;
        let options = FindOptions {
            page_token: optional_str(args, "pageToken")?.map(ToString::to_string),
            page_size: optional_u32(args, "pageSize")?,
        };
        let files = self.client.find(query, options)?;
        pretty_json(&files)
    }

    fn get_metadata(&self, args: &Map<String, Value>) -> Result<String, Error> {
        let spreadsheet = spreadsheet_arg(args)?;
        let meta = self.client.metadata(&spreadsheet)?;
        pretty_json(&meta)
    }

    fn paste_csv_data(&self, args: &Map<String, Value>) -> Result<String, Error> {
        let spreadsheet = spreadsheet_arg(args)?;
        let csv_data = required_str(args, "csvData")?;
        let title = required_str(args, "title")?;
        let start_row = optional_grid_index(args, "startRow")?.unwrap_or(0);
        let start_column = optional_grid_index(args, "startColumn")?.unwrap_or(0);
        let request = PasteRequest::new(title, csv_data).at(start_row, start_column);
        let report = self.client.paste_csv(&spreadsheet, &request)?;
        pretty_json(&json!({
            "status": "success",
            "message": report.message(),
            "sheetId": report.sheet_id,
        }))
    }
}

impl McpHandler for SheetsMcpHandler {
    fn tools(&self) -> Vec<ToolDescriptor> {
        tool_catalog()
    }

    fn call_tool(&mut self, call: ToolCall) -> Result<ToolOutput, RpcError> {
        if !is_known_tool(&call.name) {
            return Err(RpcError::invalid_params(format!(
                "unknown tool: {}",
                call.name
            )));
        }
        debug!(tool = %call.name, "tool call");
        match self.run(&call.name, &call.arguments) {
            Ok(text) => Ok(ToolOutput::text(text)),
            Err(err) => {
                debug!(tool = %call.name, error = %err, "tool call failed");
                Ok(error_result(&err))
            }
        }
    }

    fn instructions(&self) -> Option<&str> {
        Some(INSTRUCTIONS)
    }
}

const INSTRUCTIONS: &str = "Spreadsheets are addressed by ID or by their docs.google.com URL. \
Use find to locate a spreadsheet, getMetadata to list its sheets, then getText for a whole \
export or getRange for one A1 range. pasteCSVData writes CSV into the sheet with the given \
title, creating that sheet when no title matches exactly.";

/// Envelope for a failed operation: `{"error": "<message>"}` flagged as an error.
pub fn error_result(err: &Error) -> ToolOutput {
    ToolOutput::error(json!({ "error": err.describe() }).to_string())
}

fn is_known_tool(name: &str) -> bool {
    matches!(
        name,
        GET_TEXT | GET_RANGE | FIND | GET_METADATA | PASTE_CSV_DATA
    )
}

pub fn tool_catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: GET_TEXT,
            description: "Export every sheet of a spreadsheet as text, csv, or json.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "spreadsheetId": {
                        "type": "string",
                        "description": "Spreadsheet ID or URL."
                    },
                    "format": {
                        "type": "string",
                        "enum": ["text", "csv", "json"],
                        "default": "text"
                    }
                },
                "required": ["spreadsheetId"]
            }),
            annotations: ToolAnnotations::READ_ONLY,
        },
        ToolDescriptor {
            name: GET_RANGE,
            description: "Read the values of one A1-notation range.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "spreadsheetId": {
                        "type": "string",
                        "description": "Spreadsheet ID or URL."
                    },
                    "range": {
                        "type": "string",
                        "description": "A1 range such as 'Sheet1'!A1:C10."
                    }
                },
                "required": ["spreadsheetId", "range"]
            }),
            annotations: ToolAnnotations::READ_ONLY,
        },
        ToolDescriptor {
            name: FIND,
            description: "Search spreadsheets by full text.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "pageToken": { "type": "string" },
                    "pageSize": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 1000,
                        "default": 10
                    }
                },
                "required": ["query"]
            }),
            annotations: ToolAnnotations::READ_ONLY,
        },
        ToolDescriptor {
            name: GET_METADATA,
            description: "Describe a spreadsheet and its sheets.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "spreadsheetId": {
                        "type": "string",
                        "description": "Spreadsheet ID or URL."
                    }
                },
                "required": ["spreadsheetId"]
            }),
            annotations: ToolAnnotations::READ_ONLY,
        },
        ToolDescriptor {
            name: PASTE_CSV_DATA,
            description: "Paste CSV data into a sheet, creating the sheet if it does not exist.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "spreadsheetId": {
                        "type": "string",
                        "description": "Spreadsheet ID or URL."
                    },
                    "csvData": { "type": "string" },
                    "title": {
                        "type": "string",
                        "description": "Target sheet title (exact, case-sensitive)."
                    },
                    "startRow": {
                        "type": "integer",
                        "minimum": 0,
                        "maximum": MAX_GRID_INDEX,
                        "default": 0
                    },
                    "startColumn": {
                        "type": "integer",
                        "minimum": 0,
                        "maximum": MAX_GRID_INDEX,
                        "default": 0
                    }
                },
                "required": ["spreadsheetId", "csvData", "title"]
            }),
            annotations: ToolAnnotations::WRITES,
        },
    ]
}

fn spreadsheet_arg(args: &Map<String, Value>) -> Result<SpreadsheetRef, Error> {
    SpreadsheetRef::parse(required_str(args, "spreadsheetId")?)
}

fn required_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str, Error> {
    optional_str(args, key)?.ok_or_else(|| {
        Error::new(ErrorKind::Usage).with_message(format!("missing required argument: {key}"))
    })
}

fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<Option<&'a str>, Error> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(_) => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("argument {key} must be a string"))),
    }
}

fn optional_u32(args: &Map<String, Value>, key: &str) -> Result<Option<u32>, Error> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|value| u32::try_from(value).ok())
            .map(Some)
            .ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("argument {key} must be a non-negative integer"))
            }),
    }
}

/// Zero-based row/column position; the backend grid indexes are int32.
fn optional_grid_index(args: &Map<String, Value>, key: &str) -> Result<Option<u32>, Error> {
    match optional_u32(args, key)? {
        Some(index) if index > MAX_GRID_INDEX => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("argument {key} must be at most {MAX_GRID_INDEX}"))),
        index => Ok(index),
    }
}

fn pretty_json<T: Serialize>(value: &T) -> Result<String, Error> {
    serde_json::to_string_pretty(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode tool result")
            .with_source(err)
    })
}

//! Purpose: Resolve user-supplied spreadsheet references into document IDs.
//! Exports: `SpreadsheetRef`.
//! Role: Single parsing point shared by the tool surface and the CLI.
//! Invariants: A resolved ref holds only `[A-Za-z0-9_-]` characters and is never empty.
//! Invariants: URLs must be http(s) and carry a `/spreadsheets/d/<id>` path.

use std::fmt;

use url::Url;

use super::error::{Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SpreadsheetRef(String);

impl SpreadsheetRef {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("spreadsheet id must not be empty"));
        }
        if trimmed.contains("://") {
            return parse_spreadsheet_url(trimmed);
        }
        ensure_document_id(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpreadsheetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn parse_spreadsheet_url(input: &str) -> Result<SpreadsheetRef, Error> {
    let url = Url::parse(input).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid spreadsheet url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("spreadsheet url must use http or https scheme"));
    }
    let segments: Vec<_> = url
        .path_segments()
        .map(|segments| segments.collect::<Vec<_>>())
        .unwrap_or_default();
    // Account-scoped URLs insert `/u/<n>` between `spreadsheets` and `d`.
    let id = segments
        .iter()
        .position(|segment| *segment == "spreadsheets")
        .and_then(|start| {
            segments[start..]
                .iter()
                .position(|segment| *segment == "d")
                .map(|offset| start + offset + 1)
        })
        .and_then(|index| segments.get(index).copied())
        .ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("spreadsheet url path must include /spreadsheets/d/<id>")
        })?;
    ensure_document_id(id)?;
    Ok(SpreadsheetRef(id.to_string()))
}

fn ensure_document_id(id: &str) -> Result<(), Error> {
    if id.is_empty() {
        return Err(Error::new(ErrorKind::Usage).with_message("spreadsheet id must not be empty"));
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("invalid spreadsheet id: {id}"))
            .with_hint("Pass the document id or the full spreadsheet URL."));
    }
    Ok(())
}

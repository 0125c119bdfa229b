//! Purpose: HTTP backend speaking the Sheets v4 and Drive v3 REST surfaces.
//! Exports: `GoogleBackend`, `SPREADSHEET_MIME_TYPE`, `DEFAULT_SHEETS_URL`, `DEFAULT_DRIVE_URL`.
//! Role: Concrete `SheetsBackend`; owns the HTTP agent, bearer token, and error mapping.
//! Invariants: Base URLs are http(s) with no path; endpoints are appended segment by segment.
//! Invariants: Non-2xx responses map to `ErrorKind` via the API error `status`, then HTTP code.
//! Invariants: Batch requests are sent as one `batchUpdate` call, never split.
#![allow(clippy::result_large_err)]

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::core::backend::SheetsBackend;
use crate::core::error::{Error, ErrorKind};
use crate::core::model::{
    FileList, FileQuery, MutationOp, PasteMode, SheetDescriptor, SpreadsheetMeta, ValueRange,
};
use crate::core::reference::SpreadsheetRef;

type ApiResult<T> = Result<T, Error>;

pub const DEFAULT_SHEETS_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_DRIVE_URL: &str = "https://www.googleapis.com";
pub const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

const METADATA_FIELDS: &str = "spreadsheetId,properties(title,locale,timeZone),\
sheets(properties(sheetId,title,index,gridProperties(rowCount,columnCount)))";
const FILE_LIST_FIELDS: &str = "nextPageToken,files(id,name)";

#[derive(Clone)]
pub struct GoogleBackend {
    inner: Arc<GoogleBackendInner>,
}

struct GoogleBackendInner {
    sheets_url: Url,
    drive_url: Url,
    token: Option<String>,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteSpreadsheet {
    spreadsheet_id: String,
    #[serde(default)]
    properties: RemoteSpreadsheetProperties,
    #[serde(default)]
    sheets: Vec<RemoteSheet>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RemoteSpreadsheetProperties {
    #[serde(default)]
    title: String,
    locale: Option<String>,
    time_zone: Option<String>,
}

#[derive(Deserialize)]
struct RemoteSheet {
    properties: RemoteSheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteSheetProperties {
    #[serde(default)]
    sheet_id: i32,
    #[serde(default)]
    title: String,
    #[serde(default)]
    index: i32,
    #[serde(default)]
    grid_properties: RemoteGridProperties,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RemoteGridProperties {
    #[serde(default)]
    row_count: u32,
    #[serde(default)]
    column_count: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    message: Option<String>,
    status: Option<String>,
}

impl GoogleBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GoogleBackendInner {
                sheets_url: Url::parse(DEFAULT_SHEETS_URL).expect("static sheets url"),
                drive_url: Url::parse(DEFAULT_DRIVE_URL).expect("static drive url"),
                token: None,
                agent: ureq::AgentBuilder::new().build(),
            }),
        }
    }

    pub fn with_sheets_url(self, url: impl Into<String>) -> ApiResult<Self> {
        let sheets_url = normalize_base_url(url.into())?;
        Ok(self.map_inner(|inner| inner.sheets_url = sheets_url))
    }

    pub fn with_drive_url(self, url: impl Into<String>) -> ApiResult<Self> {
        let drive_url = normalize_base_url(url.into())?;
        Ok(self.map_inner(|inner| inner.drive_url = drive_url))
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.map_inner(|inner| inner.token = Some(token))
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        self.map_inner(|inner| inner.agent = agent)
    }

    pub fn with_tls_ca_file(self, path: impl AsRef<Path>, timeout: Duration) -> ApiResult<Self> {
        let path = path.as_ref();
        let cert_bytes = std::fs::read(path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!(
                    "failed to read TLS CA/certificate file {}",
                    path.display()
                ))
                .with_source(err)
        })?;
        let mut cert_reader = Cursor::new(cert_bytes);
        let certs = rustls_pemfile::certs(&mut cert_reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("failed to parse TLS CA/certificate file")
                    .with_source(err)
            })?;
        if certs.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("TLS CA/certificate file contains no certificates"));
        }

        let _ = ureq::rustls::crypto::aws_lc_rs::default_provider().install_default();
        let mut root_store = ureq::rustls::RootCertStore::empty();
        let (added, _) = root_store.add_parsable_certificates(certs);
        if added == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("TLS CA/certificate file contains no parsable certificates"));
        }

        let tls_config = ureq::rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        let agent = ureq::builder()
            .tls_config(Arc::new(tls_config))
            .timeout(timeout)
            .build();
        Ok(self.map_inner(|inner| inner.agent = agent))
    }

    pub fn sheets_url(&self) -> &Url {
        &self.inner.sheets_url
    }

    pub fn drive_url(&self) -> &Url {
        &self.inner.drive_url
    }

    fn map_inner(mut self, apply: impl FnOnce(&mut GoogleBackendInner)) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            apply(inner);
            return self;
        }
        let mut inner = GoogleBackendInner {
            sheets_url: self.inner.sheets_url.clone(),
            drive_url: self.inner.drive_url.clone(),
            token: self.inner.token.clone(),
            agent: self.inner.agent.clone(),
        };
        apply(&mut inner);
        self.inner = Arc::new(inner);
        self
    }

    fn spreadsheet_url(&self, spreadsheet: &SpreadsheetRef, rest: &[&str]) -> ApiResult<Url> {
        let mut segments = vec!["v4", "spreadsheets", spreadsheet.as_str()];
        segments.extend_from_slice(rest);
        build_url(&self.inner.sheets_url, &segments)
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        let mut request = self
            .inner
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        if let Some(token) = &self.inner.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request
    }

    fn get_json<R>(&self, url: &Url) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        debug!(method = "GET", url = %url, "backend request");
        let response = self.request("GET", url).call();
        handle_response(response)
    }

    fn post_json<R>(&self, url: &Url, body: &Value) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        debug!(method = "POST", url = %url, "backend request");
        let payload = serde_json::to_string(body).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request json")
                .with_source(err)
        })?;
        let response = self
            .request("POST", url)
            .set("Content-Type", "application/json")
            .send_string(&payload);
        handle_response(response)
    }
}

impl Default for GoogleBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetsBackend for GoogleBackend {
    fn get_metadata(&self, spreadsheet: &SpreadsheetRef) -> ApiResult<SpreadsheetMeta> {
        let mut url = self.spreadsheet_url(spreadsheet, &[])?;
        url.query_pairs_mut().append_pair("fields", METADATA_FIELDS);
        let remote: RemoteSpreadsheet = self.get_json(&url)?;
        Ok(meta_from_remote(remote))
    }

    fn get_values(&self, spreadsheet: &SpreadsheetRef, range: &str) -> ApiResult<ValueRange> {
        let url = self.spreadsheet_url(spreadsheet, &["values", range])?;
        self.get_json(&url)
    }

    fn batch_mutate(&self, spreadsheet: &SpreadsheetRef, ops: &[MutationOp]) -> ApiResult<()> {
        let endpoint = format!("{}:batchUpdate", spreadsheet.as_str());
        let url = build_url(&self.inner.sheets_url, &["v4", "spreadsheets", &endpoint])?;
        let _reply: Value = self.post_json(&url, &batch_update_body(ops))?;
        Ok(())
    }

    fn search_files(&self, query: &FileQuery) -> ApiResult<FileList> {
        let mut url = build_url(&self.inner.drive_url, &["drive", "v3", "files"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", &drive_query(&query.mime_type, &query.text));
            pairs.append_pair("pageSize", &query.page_size.to_string());
            pairs.append_pair("fields", FILE_LIST_FIELDS);
            if let Some(page_token) = &query.page_token {
                pairs.append_pair("pageToken", page_token);
            }
        }
        self.get_json(&url)
    }
}

/// Drive `q` expression matching files of `mime_type` whose content or name contains `text`.
pub fn drive_query(mime_type: &str, text: &str) -> String {
    let mut query = format!("mimeType='{}'", escape_query_literal(mime_type));
    let text = text.trim();
    if !text.is_empty() {
        query.push_str(&format!(
            " and fullText contains '{}'",
            escape_query_literal(text)
        ));
    }
    query.push_str(" and trashed=false");
    query
}

fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn batch_update_body(ops: &[MutationOp]) -> Value {
    let requests = ops.iter().map(mutation_request).collect::<Vec<_>>();
    json!({ "requests": requests })
}

fn mutation_request(op: &MutationOp) -> Value {
    match op {
        MutationOp::CreateSheet { title, sheet_id } => json!({
            "addSheet": {
                "properties": {
                    "sheetId": sheet_id,
                    "title": title,
                }
            }
        }),
        MutationOp::PasteData {
            sheet_id,
            row_index,
            column_index,
            data,
            delimiter,
            mode,
        } => json!({
            "pasteData": {
                "coordinate": {
                    "sheetId": sheet_id,
                    "rowIndex": row_index,
                    "columnIndex": column_index,
                },
                "data": data,
                "delimiter": delimiter.to_string(),
                "type": paste_type(*mode),
            }
        }),
    }
}

fn paste_type(mode: PasteMode) -> &'static str {
    match mode {
        PasteMode::Normal => "PASTE_NORMAL",
    }
}

fn meta_from_remote(remote: RemoteSpreadsheet) -> SpreadsheetMeta {
    let mut sheets = remote
        .sheets
        .into_iter()
        .map(|sheet| SheetDescriptor {
            sheet_id: sheet.properties.sheet_id,
            title: sheet.properties.title,
            index: sheet.properties.index,
            row_count: sheet.properties.grid_properties.row_count,
            column_count: sheet.properties.grid_properties.column_count,
        })
        .collect::<Vec<_>>();
    sheets.sort_by_key(|sheet| sheet.index);
    SpreadsheetMeta {
        spreadsheet_id: remote.spreadsheet_id,
        title: remote.properties.title,
        locale: remote.properties.locale,
        time_zone: remote.properties.time_zone,
        sheets,
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid backend base url: {raw}"))
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("backend base url must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("backend base url must not include a path")
        );
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("backend base url cannot be a base")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn handle_response<R>(response: Result<ureq::Response, ureq::Error>) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    match response {
        Ok(resp) => read_json_response(resp),
        Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
        Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Transport)
            .with_message(format!("request failed: {err}"))
            .with_source(err)),
    }
}

fn read_json_response<R>(response: ureq::Response) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Transport)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    let remote = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .map(|envelope| envelope.error);
    let kind = remote
        .as_ref()
        .and_then(|error| error.status.as_deref())
        .and_then(error_kind_from_api_status)
        .unwrap_or_else(|| error_kind_from_status(status));
    let message = remote
        .and_then(|error| error.message)
        .unwrap_or_else(|| format!("backend error status {status}"));
    let mut err = Error::new(kind).with_message(message).with_status(status);
    if kind == ErrorKind::Permission && status == 401 {
        err = err.with_hint("Pass a valid access token with --token or --token-file.");
    }
    err
}

fn error_kind_from_api_status(status: &str) -> Option<ErrorKind> {
    match status {
        "NOT_FOUND" => Some(ErrorKind::NotFound),
        "PERMISSION_DENIED" | "UNAUTHENTICATED" => Some(ErrorKind::Permission),
        "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "OUT_OF_RANGE" | "ALREADY_EXISTS" => {
            Some(ErrorKind::InvalidRequest)
        }
        "UNAVAILABLE" | "RESOURCE_EXHAUSTED" | "DEADLINE_EXCEEDED" | "ABORTED" | "INTERNAL"
        | "UNKNOWN" => Some(ErrorKind::Transport),
        _ => None,
    }
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 409 | 413 => ErrorKind::InvalidRequest,
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        _ => ErrorKind::Transport,
    }
}

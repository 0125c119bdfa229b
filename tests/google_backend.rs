//! Purpose: Exercise `GoogleBackend` against a loopback stub of the REST surfaces.
//! Exports: None (integration test module).
//! Role: Validate request shapes (paths, queries, auth, bodies) and error mapping over TCP.
//! Invariants: The stub serves canned responses in order and records every request.
//! Invariants: Every test binds an ephemeral loopback port.

mod support;

use std::net::TcpListener;
use std::time::Duration;

use serde_json::{Value, json};
use sheetport::api::{
    ErrorKind, FileQuery, GoogleBackend, MutationOp, PasteMode, SPREADSHEET_MIME_TYPE,
    SheetsBackend, SpreadsheetRef,
};
use support::StubServer;

fn backend(server: &StubServer) -> GoogleBackend {
    GoogleBackend::new()
        .with_sheets_url(server.base_url.clone())
        .expect("sheets url")
        .with_drive_url(server.base_url.clone())
        .expect("drive url")
        .with_timeout(Duration::from_secs(5))
        .with_token("tok-123")
}

fn doc() -> SpreadsheetRef {
    SpreadsheetRef::parse("doc_123").expect("ref")
}

#[test]
fn metadata_request_and_sheet_order() {
    let server = StubServer::start(vec![(
        200,
        json!({
            "spreadsheetId": "doc_123",
            "properties": {"title": "Budget", "locale": "en_US", "timeZone": "Europe/Paris"},
            "sheets": [
                {"properties": {"sheetId": 7, "title": "Second", "index": 1,
                    "gridProperties": {"rowCount": 10, "columnCount": 3}}},
                {"properties": {"sheetId": 0, "title": "First", "index": 0,
                    "gridProperties": {"rowCount": 1000, "columnCount": 26}}}
            ]
        }),
    )]);
    let meta = backend(&server).get_metadata(&doc()).expect("metadata");
    let requests = server.requests();

    assert_eq!(meta.title, "Budget");
    assert_eq!(meta.time_zone.as_deref(), Some("Europe/Paris"));
    let titles: Vec<&str> = meta.sheets.iter().map(|sheet| sheet.title.as_str()).collect();
    assert_eq!(titles, vec!["First", "Second"]);
    assert_eq!(meta.sheets[1].sheet_id, 7);
    assert_eq!(meta.sheets[1].column_count, 3);

    let request = &requests[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.url().path(), "/v4/spreadsheets/doc_123");
    assert!(request.query()["fields"].contains("gridProperties(rowCount,columnCount)"));
    assert_eq!(request.headers["authorization"], "Bearer tok-123");
}

#[test]
fn values_request_encodes_range_and_defaults_values() {
    let server = StubServer::start(vec![
        (
            200,
            json!({"range": "'Q1 / 24'!A1:B2", "majorDimension": "ROWS",
                "values": [["a", "b"], ["1"]]}),
        ),
        (200, json!({"range": "Empty!A1:Z1000", "majorDimension": "ROWS"})),
    ]);
    let backend = backend(&server);
    let range = backend
        .get_values(&doc(), "'Q1 / 24'!A1:B2")
        .expect("values");
    let empty = backend.get_values(&doc(), "Empty").expect("values");
    let requests = server.requests();

    assert_eq!(range.values, vec![vec![json!("a"), json!("b")], vec![json!("1")]]);
    assert!(empty.values.is_empty());
    assert_eq!(
        requests[0].target,
        "/v4/spreadsheets/doc_123/values/'Q1%20%2F%2024'!A1:B2"
    );
    assert_eq!(requests[1].target, "/v4/spreadsheets/doc_123/values/Empty");
}

#[test]
fn batch_update_sends_one_ordered_request() {
    let server = StubServer::start(vec![(200, json!({"spreadsheetId": "doc_123", "replies": []}))]);
    let ops = vec![
        MutationOp::CreateSheet {
            title: "NewData".to_string(),
            sheet_id: 42,
        },
        MutationOp::PasteData {
            sheet_id: 42,
            row_index: 2,
            column_index: 1,
            data: "x,y\n1,2".to_string(),
            delimiter: ',',
            mode: PasteMode::Normal,
        },
    ];
    backend(&server).batch_mutate(&doc(), &ops).expect("batch");
    let requests = server.requests();

    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/v4/spreadsheets/doc_123:batchUpdate");
    assert_eq!(request.headers["content-type"], "application/json");
    let body: Value = serde_json::from_str(&request.body).expect("json body");
    assert_eq!(
        body,
        json!({
            "requests": [
                {"addSheet": {"properties": {"sheetId": 42, "title": "NewData"}}},
                {"pasteData": {
                    "coordinate": {"sheetId": 42, "rowIndex": 2, "columnIndex": 1},
                    "data": "x,y\n1,2",
                    "delimiter": ",",
                    "type": "PASTE_NORMAL"
                }}
            ]
        })
    );
}

#[test]
fn search_builds_drive_query() {
    let server = StubServer::start(vec![(
        200,
        json!({"nextPageToken": "p2", "files": [{"id": "f1", "name": "Bob's budget"}]}),
    )]);
    let files = backend(&server)
        .search_files(&FileQuery {
            mime_type: SPREADSHEET_MIME_TYPE.to_string(),
            text: "Bob's budget".to_string(),
            page_token: Some("p1".to_string()),
            page_size: 25,
        })
        .expect("search");
    let requests = server.requests();

    assert_eq!(files.files[0].id, "f1");
    assert_eq!(files.next_page_token.as_deref(), Some("p2"));

    let request = &requests[0];
    assert_eq!(request.url().path(), "/drive/v3/files");
    let query = request.query();
    assert_eq!(
        query["q"],
        "mimeType='application/vnd.google-apps.spreadsheet' and fullText contains 'Bob\\'s budget' and trashed=false"
    );
    assert_eq!(query["pageSize"], "25");
    assert_eq!(query["pageToken"], "p1");
    assert_eq!(query["fields"], "nextPageToken,files(id,name)");
}

#[test]
fn api_errors_map_to_kinds() {
    let server = StubServer::start(vec![
        (
            404,
            json!({"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}),
        ),
        (
            403,
            json!({"error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}}),
        ),
        (
            400,
            json!({"error": {"code": 400, "message": "Unable to parse range: Nope!A1", "status": "INVALID_ARGUMENT"}}),
        ),
        (429, json!({"error": {"code": 429, "message": "Quota exceeded"}})),
        (401, json!({"unexpected": true})),
    ]);
    let backend = backend(&server);

    let err = backend.get_metadata(&doc()).expect_err("404");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.message(), Some("Requested entity was not found."));
    assert_eq!(err.status(), Some(404));

    let err = backend.get_metadata(&doc()).expect_err("403");
    assert_eq!(err.kind(), ErrorKind::Permission);

    let err = backend.get_values(&doc(), "Nope!A1").expect_err("400");
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(err.message(), Some("Unable to parse range: Nope!A1"));

    let err = backend.get_values(&doc(), "A1").expect_err("429");
    assert_eq!(err.kind(), ErrorKind::Transport);

    let err = backend.get_values(&doc(), "A1").expect_err("401");
    assert_eq!(err.kind(), ErrorKind::Permission);
    assert_eq!(err.message(), Some("backend error status 401"));
    assert!(err.hint().is_some());

    assert_eq!(server.requests().len(), 5);
}

#[test]
fn unreachable_backend_is_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let backend = GoogleBackend::new()
        .with_sheets_url(format!("http://127.0.0.1:{port}"))
        .expect("url")
        .with_timeout(Duration::from_secs(2));
    let err = backend.get_metadata(&doc()).expect_err("refused");
    assert_eq!(err.kind(), ErrorKind::Transport);
}

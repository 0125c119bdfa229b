//! Purpose: Round-trip JSON-RPC over the `sheetport mcp` stdio transport.
//! Exports: None (integration test module).
//! Role: Validate line framing, notifications, parse errors, and clean EOF shutdown.
//! Invariants: No backend traffic; only protocol-level methods are exercised.

use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::{Value, json};

fn run_session(lines: &[&str]) -> (Vec<Value>, std::process::ExitStatus) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_sheetport"))
        .arg("mcp")
        .env_remove("SHEETPORT_TOKEN")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn mcp");
    {
        let mut stdin = child.stdin.take().expect("stdin");
        for line in lines {
            stdin.write_all(line.as_bytes()).expect("write");
            stdin.write_all(b"\n").expect("newline");
        }
    }
    let output = child.wait_with_output().expect("wait");
    let responses = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    (responses, output.status)
}

#[test]
fn initialize_list_tools_and_ping() {
    let (responses, status) = run_session(&[
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-11-25","capabilities":{},"clientInfo":{"name":"test","version":"0"}}}"#,
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        r#"{"jsonrpc":"2.0","id":"p","method":"ping"}"#,
    ]);
    assert!(status.success());
    assert_eq!(responses.len(), 3);

    assert_eq!(responses[0]["id"], json!(1));
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], json!("sheetport"));
    assert!(responses[0]["result"]["instructions"].is_string());

    let tools: Vec<&str> = responses[1]["result"]["tools"]
        .as_array()
        .expect("tools")
        .iter()
        .map(|tool| tool["name"].as_str().expect("name"))
        .collect();
    assert_eq!(
        tools,
        vec!["getText", "getRange", "find", "getMetadata", "pasteCSVData"]
    );
    assert_eq!(
        responses[1]["result"]["tools"][4]["annotations"]["readOnlyHint"],
        json!(false)
    );

    assert_eq!(responses[2]["id"], json!("p"));
    assert_eq!(responses[2]["result"], json!({}));
}

#[test]
fn malformed_lines_get_error_responses() {
    let (responses, status) = run_session(&[
        "{not json",
        r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#,
        r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"getText","arguments":{}}}"#,
    ]);
    assert!(status.success());
    assert_eq!(responses.len(), 3);

    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(responses[0]["error"]["code"], json!(-32700));

    assert_eq!(responses[1]["error"]["code"], json!(-32601));

    assert_eq!(responses[2]["result"]["isError"], json!(true));
    let text = responses[2]["result"]["content"][0]["text"]
        .as_str()
        .expect("text");
    assert_eq!(
        serde_json::from_str::<Value>(text).expect("error json"),
        json!({"error": "missing required argument: spreadsheetId"})
    );
}

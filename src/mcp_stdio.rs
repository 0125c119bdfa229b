//! Purpose: Run the sheetport MCP tools over stdin/stdout.
//! Exports: `serve`.
//! Role: Line framing around `McpDispatcher`; one JSON-RPC message per line in each direction.
//! Invariants: stdout carries only JSON-RPC responses; logs go to stderr.
//! Invariants: EOF on stdin ends the session with success.
//! Invariants: Local stream failures are `Internal`, never `Transport`.

use std::io::{self, BufRead, Write};

use sheetport::api::{Error, ErrorKind, SheetsClient};
use sheetport::mcp::{McpDispatcher, McpHandler, RpcResponse};
use sheetport::tools::SheetsMcpHandler;
use tracing::{debug, info};

pub(super) fn serve(client: SheetsClient) -> Result<(), Error> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    info!("mcp stdio server ready");
    run_session(
        stdin.lock(),
        stdout.lock(),
        McpDispatcher::new(SheetsMcpHandler::new(client)),
    )
}

fn run_session<H: McpHandler>(
    input: impl BufRead,
    mut output: impl Write,
    mut dispatcher: McpDispatcher<H>,
) -> Result<(), Error> {
    for line in input.lines() {
        let line = line.map_err(|err| stream_error("failed to read MCP request", err))?;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = dispatcher.handle_line(&line) {
            write_response(&mut output, &response)?;
        }
    }
    debug!("stdin closed; stopping mcp server");
    Ok(())
}

fn write_response(output: &mut impl Write, response: &RpcResponse) -> Result<(), Error> {
    let mut frame = serde_json::to_vec(response).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode MCP response")
            .with_source(err)
    })?;
    frame.push(b'\n');
    output
        .write_all(&frame)
        .and_then(|()| output.flush())
        .map_err(|err| stream_error("failed to write MCP response", err))
}

fn stream_error(message: &str, err: io::Error) -> Error {
    Error::new(ErrorKind::Internal)
        .with_message(message)
        .with_source(err)
}

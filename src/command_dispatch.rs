//! Purpose: Hold top-level CLI command dispatch for `sheetport`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: `text` prints the export body verbatim; other data commands print JSON.
//! Invariants: Backend construction happens only for commands that talk to the API.

use super::*;
use sheetport::api::{ExportOptions, FindOptions, PasteRequest, SpreadsheetRef};

pub(super) fn dispatch_command(
    command: Command,
    backend: BackendArgs,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "sheetport", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Text {
            spreadsheet,
            format,
            failed_sheets,
        } => {
            let spreadsheet = SpreadsheetRef::parse(&spreadsheet)?;
            let client = build_client(backend)?;
            let mut options = ExportOptions::new(format.into());
            if let Some(policy) = failed_sheets {
                options = options.with_failed_sheets(policy.into());
            }
            let body = client.export(&spreadsheet, options)?;
            println!("{body}");
            Ok(RunOutcome::ok())
        }
        Command::Range { spreadsheet, range } => {
            let spreadsheet = SpreadsheetRef::parse(&spreadsheet)?;
            let client = build_client(backend)?;
            let values = client.read_range(&spreadsheet, &range)?;
            emit_json(to_json_value(&values)?);
            Ok(RunOutcome::ok())
        }
        Command::Find {
            query,
            page_token,
            page_size,
        } => {
            let client = build_client(backend)?;
            let files = client.find(
                &query,
                FindOptions {
                    page_token,
                    page_size,
                },
            )?;
            emit_json(to_json_value(&files)?);
            Ok(RunOutcome::ok())
        }
        Command::Meta { spreadsheet } => {
            let spreadsheet = SpreadsheetRef::parse(&spreadsheet)?;
            let client = build_client(backend)?;
            let meta = client.metadata(&spreadsheet)?;
            emit_json(to_json_value(&meta)?);
            Ok(RunOutcome::ok())
        }
        Command::Paste {
            spreadsheet,
            title,
            data,
            file,
            start_row,
            start_column,
        } => {
            let spreadsheet = SpreadsheetRef::parse(&spreadsheet)?;
            let csv_data = read_csv_input(data, file)?;
            let client = build_client(backend)?;
            let request = PasteRequest::new(title, csv_data).at(start_row, start_column);
            let report = client.paste_csv(&spreadsheet, &request)?;
            emit_json(json!({
                "status": "success",
                "message": report.message(),
                "sheetId": report.sheet_id,
                "created": report.created,
            }));
            Ok(RunOutcome::ok())
        }
        Command::Mcp => {
            let client = build_client(backend)?;
            mcp_stdio::serve(client)?;
            Ok(RunOutcome::ok())
        }
        Command::Serve(args) => {
            let config = serve_config_from_args(args)?;
            let client = build_client(backend)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start async runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config, client))?;
            Ok(RunOutcome::ok())
        }
    }
}

//! Purpose: `sheetport` CLI entry point.
//! Role: Binary crate root; parses args, builds the backend, emits payloads on stdout.
//! Invariants: stdout carries only command payloads (export text, JSON, or JSON-RPC).
//! Invariants: Logs and diagnostics go to stderr; non-interactive errors are JSON.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal, Read};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod mcp_stdio;
mod serve;

use sheetport::api::{
    DEFAULT_DRIVE_URL, DEFAULT_SHEETS_URL, Error, ErrorKind, ExportFormat, FailedSheetPolicy,
    GoogleBackend, SheetsClient, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Internal)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;
    init_tracing(cli.command.default_log_level());

    command_dispatch::dispatch_command(cli.command, cli.backend)
        .map_err(add_permission_hint)
        .map_err(add_transport_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or_else(|| arg)
        })
        .collect()
}

#[derive(Parser)]
#[command(
    name = "sheetport",
    version,
    about = "Read spreadsheets as text, csv, or json and paste CSV back into them",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Every command needs an OAuth access token for the Sheets and Drive APIs.
Pass it with --token-file (preferred), --token, or SHEETPORT_TOKEN.
"#,
    after_help = r#"EXAMPLES
  $ sheetport --token-file ~/.sheetport/token text 1AbC...xyz
  $ sheetport text https://docs.google.com/spreadsheets/d/1AbC...xyz/edit --format csv
  $ sheetport range 1AbC...xyz "'Sheet1'!A1:C10"
  $ sheetport find budget --page-size 5
  $ cat q3.csv | sheetport paste 1AbC...xyz "Q3 Numbers"

MCP SERVERS
  $ sheetport mcp                      # JSON-RPC over stdio
  $ sheetport serve --bind 127.0.0.1:9780   # JSON-RPC over HTTP POST /mcp"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(flatten)]
    backend: BackendArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Debug)]
struct BackendArgs {
    #[arg(
        long,
        global = true,
        env = "SHEETPORT_TOKEN",
        hide_env_values = true,
        help = "OAuth access token (prefer --token-file)"
    )]
    token: Option<String>,
    #[arg(
        long,
        global = true,
        value_hint = ValueHint::FilePath,
        help = "Read the OAuth access token from a file"
    )]
    token_file: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_SHEETS_URL,
        help = "Base URL of the Sheets API"
    )]
    sheets_url: String,
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_DRIVE_URL,
        help = "Base URL of the Drive API"
    )]
    drive_url: String,
    #[arg(
        long,
        global = true,
        value_hint = ValueHint::FilePath,
        help = "PEM file with extra trusted CA certificates"
    )]
    tls_ca: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value_t = 30_000,
        help = "Per-request HTTP timeout in milliseconds"
    )]
    timeout_ms: u64,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FormatCli {
    Text,
    Csv,
    Json,
}

impl From<FormatCli> for ExportFormat {
    fn from(value: FormatCli) -> Self {
        match value {
            FormatCli::Text => ExportFormat::Text,
            FormatCli::Csv => ExportFormat::Csv,
            FormatCli::Json => ExportFormat::Json,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FailedSheetsCli {
    Inline,
    Omit,
}

impl From<FailedSheetsCli> for FailedSheetPolicy {
    fn from(value: FailedSheetsCli) -> Self {
        match value {
            FailedSheetsCli::Inline => FailedSheetPolicy::Inline,
            FailedSheetsCli::Omit => FailedSheetPolicy::Omit,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Export every sheet of a spreadsheet",
        after_help = r#"EXAMPLES
  $ sheetport text 1AbC...xyz
  $ sheetport text 1AbC...xyz --format json
  $ sheetport text 1AbC...xyz --format csv --failed-sheets omit

NOTES
  - Sheets that fail to load are marked inline for text/csv and dropped for json
  - Use --failed-sheets to override that per call"#
    )]
    Text {
        #[arg(help = "Spreadsheet ID or URL")]
        spreadsheet: String,
        #[arg(long, value_enum, default_value = "text")]
        format: FormatCli,
        #[arg(long, value_enum, help = "How to render sheets that failed to load")]
        failed_sheets: Option<FailedSheetsCli>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Read one A1 range as JSON",
        after_help = r#"EXAMPLES
  $ sheetport range 1AbC...xyz "'Sheet1'!A1:C10"
  $ sheetport range 1AbC...xyz Summary"#
    )]
    Range {
        #[arg(help = "Spreadsheet ID or URL")]
        spreadsheet: String,
        #[arg(help = "A1 range expression")]
        range: String,
    },
    #[command(
        arg_required_else_help = true,
        about = "Search spreadsheets by full text",
        after_help = r#"EXAMPLES
  $ sheetport find budget
  $ sheetport find budget --page-size 50 --page-token <token>"#
    )]
    Find {
        #[arg(help = "Full-text search term")]
        query: String,
        #[arg(long, help = "Continuation token from a previous page")]
        page_token: Option<String>,
        #[arg(long, help = "Results per page (1-1000, default 10)")]
        page_size: Option<u32>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Show spreadsheet metadata as JSON"
    )]
    Meta {
        #[arg(help = "Spreadsheet ID or URL")]
        spreadsheet: String,
    },
    #[command(
        arg_required_else_help = true,
        about = "Paste CSV data into a sheet, creating it when missing",
        after_help = r#"EXAMPLES
  $ sheetport paste 1AbC...xyz "Q3 Numbers" --file q3.csv
  $ sheetport paste 1AbC...xyz Scratch --data 'a,b
1,2' --start-row 4
  $ cat q3.csv | sheetport paste 1AbC...xyz "Q3 Numbers"

NOTES
  - Title matching is exact and case-sensitive
  - Existing cells outside the pasted block are left untouched"#
    )]
    Paste {
        #[arg(help = "Spreadsheet ID or URL")]
        spreadsheet: String,
        #[arg(help = "Target sheet title")]
        title: String,
        #[arg(long, conflicts_with = "file", help = "Inline CSV data")]
        data: Option<String>,
        #[arg(long, value_hint = ValueHint::FilePath, help = "Read CSV data from a file ('-' for stdin)")]
        file: Option<PathBuf>,
        #[arg(long, default_value_t = 0, help = "Zero-based row to paste at")]
        start_row: u32,
        #[arg(long, default_value_t = 0, help = "Zero-based column to paste at")]
        start_column: u32,
    },
    #[command(about = "Run the MCP server over stdio")]
    Mcp,
    #[command(about = "Run the MCP server over HTTP")]
    Serve(ServeArgs),
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completion scripts",
        after_help = r#"EXAMPLES
  $ sheetport completion bash > ~/.local/share/bash-completion/completions/sheetport
  $ sheetport completion zsh > ~/.zfunc/_sheetport"#
    )]
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
    #[command(about = "Print version info")]
    Version,
}

impl Command {
    fn default_log_level(&self) -> &'static str {
        match self {
            Command::Serve(_) => "info",
            _ => "warn",
        }
    }
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:9780", help = "Address to listen on")]
    bind: String,
    #[arg(long, help = "Allow binding to a non-loopback address")]
    allow_non_loopback: bool,
    #[arg(
        long,
        value_hint = ValueHint::FilePath,
        help = "Require this bearer token (read from file) on every request"
    )]
    auth_token_file: Option<PathBuf>,
    #[arg(long, default_value_t = 1024 * 1024, help = "Maximum request body size")]
    max_body_bytes: u64,
}

fn init_tracing(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn build_client(args: BackendArgs) -> Result<SheetsClient, Error> {
    if args.timeout_ms == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--timeout-ms must be greater than zero")
            .with_hint("Use a positive value like 30000."));
    }
    let timeout = Duration::from_millis(args.timeout_ms);
    let token = resolve_token_value(args.token, args.token_file)?;

    let mut backend = GoogleBackend::new()
        .with_sheets_url(args.sheets_url)?
        .with_drive_url(args.drive_url)?
        .with_timeout(timeout);
    if let Some(path) = args.tls_ca {
        backend = backend.with_tls_ca_file(path, timeout)?;
    }
    if let Some(token) = token {
        backend = backend.with_token(token);
    }
    Ok(SheetsClient::new(backend))
}

fn read_token_file(path: &Path) -> Result<String, Error> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("failed to read token file {}", path.display()))
            .with_source(err)
    })?;
    let token = raw.trim().to_string();
    if token.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("token file is empty: {}", path.display())));
    }
    Ok(token)
}

fn resolve_token_value(
    token: Option<String>,
    token_file: Option<PathBuf>,
) -> Result<Option<String>, Error> {
    if token.is_some() && token_file.is_some() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--token cannot be combined with --token-file")
            .with_hint("Use --token-file for safer handling, or pass --token for local/dev use."));
    }
    if let Some(path) = token_file {
        return read_token_file(&path).map(Some);
    }
    Ok(token.filter(|token| !token.trim().is_empty()))
}

fn serve_config_from_args(args: ServeArgs) -> Result<serve::ServeConfig, Error> {
    let bind: SocketAddr = args.bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid bind address")
            .with_hint("Use a host:port value like 127.0.0.1:9780.")
    })?;
    let token_file_used = args.auth_token_file.is_some();
    let token = match args.auth_token_file {
        Some(path) => Some(read_token_file(&path)?),
        None => None,
    };
    Ok(serve::ServeConfig {
        bind,
        token,
        token_file_used,
        allow_non_loopback: args.allow_non_loopback,
        max_body_bytes: args.max_body_bytes,
    })
}

fn read_csv_input(data: Option<String>, file: Option<PathBuf>) -> Result<String, Error> {
    if let Some(data) = data {
        return Ok(data);
    }
    let use_stdin = file.as_deref().is_none_or(|path| path == Path::new("-"));
    if use_stdin {
        if io::stdin().is_terminal() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("paste needs CSV data")
                .with_hint("Pass --data, --file <path>, or pipe CSV on stdin."));
        }
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("failed to read CSV from stdin")
                .with_source(err)
        })?;
        return Ok(buf);
    }
    let path = file.unwrap_or_default();
    std::fs::read_to_string(&path).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("failed to read CSV file {}", path.display()))
            .with_source(err)
    })
}

fn add_permission_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Permission || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check that the token is valid and has access to this spreadsheet.")
}

fn add_transport_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Transport || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check network access to the API, or raise --timeout-ms.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and share command/context if it persists.",
    )
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("sheetport {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "sheetport",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_json(value: Value) {
    let pretty = io::stdout().is_terminal();
    let json = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn to_json_value<T: serde::Serialize>(value: &T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode output")
            .with_source(err)
    })
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\x1b[1;{code}m{label}\x1b[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(err.describe()));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(spreadsheet) = err.spreadsheet() {
        inner.insert("spreadsheet".to_string(), json!(spreadsheet));
    }
    if let Some(sheet) = err.sheet() {
        inner.insert("sheet".to_string(), json!(sheet));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        err.describe()
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(spreadsheet) = err.spreadsheet() {
        lines.push(format!(
            "{} {spreadsheet}",
            colorize_label("spreadsheet:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(sheet) = err.sheet() {
        lines.push(format!(
            "{} {sheet}",
            colorize_label("sheet:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(status) = err.status() {
        lines.push(format!(
            "{} {status}",
            colorize_label("status:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `sheetport --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "sheetport") else {
        return "Try `sheetport --help`.".to_string();
    };

    let mut parts = Vec::new();
    for token in tokens.iter().skip(pos + 1) {
        if token.starts_with('-') || token.starts_with('<') || token.starts_with('[') {
            break;
        }
        parts.push(*token);
    }

    if parts.is_empty() {
        return "Try `sheetport --help`.".to_string();
    }
    format!("Try `sheetport {} --help`.", parts.join(" "))
}

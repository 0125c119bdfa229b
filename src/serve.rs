//! Purpose: Serve the sheetport MCP tools over HTTP.
//! Exports: `ServeConfig`, `serve`, `serve_listener`.
//! Role: Axum server that accepts one JSON-RPC message per `POST /mcp`.
//! Invariants: Loopback-only unless explicitly allowed; non-loopback also requires a bearer token.
//! Invariants: Tool calls run on the blocking pool, one at a time, behind a mutex.
//! Invariants: Notifications get `202 Accepted` with an empty body.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use sheetport::api::{Error, ErrorKind, SheetsClient};
use sheetport::mcp::{McpDispatcher, RequestId, RpcError, RpcResponse};
use sheetport::tools::SheetsMcpHandler;

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub token: Option<String>,
    pub token_file_used: bool,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
}

struct AppState {
    dispatcher: Arc<Mutex<McpDispatcher<SheetsMcpHandler>>>,
    token: Option<String>,
}

pub async fn serve(config: ServeConfig, client: SheetsClient) -> Result<(), Error> {
    validate_config(&config)?;

    let listener = TcpListener::bind(config.bind).await.map_err(|err| {
        Error::new(ErrorKind::Transport)
            .with_message(format!("failed to bind {}", config.bind))
            .with_source(err)
    })?;
    serve_listener(listener, config, client).await
}

pub async fn serve_listener(
    listener: TcpListener,
    config: ServeConfig,
    client: SheetsClient,
) -> Result<(), Error> {
    let app = router(&config, client)?;
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mcp http server listening");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(server_error)?;
        }
        _ = shutdown_signal() => {
            info!("shutting down mcp http server");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(server_error)?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Transport)
                        .with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn router(config: &ServeConfig, client: SheetsClient) -> Result<Router, Error> {
    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;

    let state = Arc::new(AppState {
        dispatcher: Arc::new(Mutex::new(McpDispatcher::new(SheetsMcpHandler::new(
            client,
        )))),
        token: config.token.clone(),
    });

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .route("/mcp", post(mcp_message))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn server_error(err: std::io::Error) -> Error {
    Error::new(ErrorKind::Transport)
        .with_message("server failed")
        .with_source(err)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    let is_loopback_bind = is_loopback(config.bind.ip());
    if !is_loopback_bind && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if !is_loopback_bind && !config.token_file_used {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires --auth-token-file")
            .with_hint("Tools can write to spreadsheets; protect the endpoint with a bearer token."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }

    if config.max_body_bytes > usize::MAX as u64 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes exceeds platform limits")
            .with_hint("Use a smaller value that fits in memory."));
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), Error> {
    let Some(token) = state.token.as_ref() else {
        return Ok(());
    };
    let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(Error::new(ErrorKind::Permission).with_message("missing bearer token"));
    };
    let value = value.to_str().unwrap_or_default();
    let expected = format!("Bearer {token}");
    if value != expected {
        return Err(Error::new(ErrorKind::Permission).with_message("invalid bearer token"));
    }
    Ok(())
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

async fn mcp_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(err) = authorize(&headers, &state) {
        return error_response(err);
    }

    let message = match String::from_utf8(body.to_vec()) {
        Ok(message) => message,
        Err(_) => {
            let error = RpcError::parse("request body is not UTF-8");
            return Json(RpcResponse::failure(RequestId::Null, error)).into_response();
        }
    };

    let dispatcher = Arc::clone(&state.dispatcher);
    let outcome = tokio::task::spawn_blocking(move || {
        let mut dispatcher = dispatcher.lock().map_err(|_| {
            Error::new(ErrorKind::Internal).with_message("mcp dispatcher lock poisoned")
        })?;
        Ok::<_, Error>(dispatcher.handle_line(&message))
    })
    .await;

    match outcome {
        Ok(Ok(Some(response))) => Json(response).into_response(),
        Ok(Ok(None)) => StatusCode::ACCEPTED.into_response(),
        Ok(Err(err)) => error_response(err),
        Err(err) => error_response(
            Error::new(ErrorKind::Internal)
                .with_message("mcp worker failed")
                .with_source(err),
        ),
    }
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::Usage | ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Permission => StatusCode::UNAUTHORIZED,
        ErrorKind::Transport => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.describe(),
        },
    };
    (status, Json(body)).into_response()
}

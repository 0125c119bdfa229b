//! Purpose: Loopback stand-in for the Sheets/Drive REST surfaces, shared by integration tests.
//! Exports: `StubServer`, `Recorded`.
//! Role: Axum router that records each request and replies with the next canned response.
//! Invariants: Responses are served in order; an exhausted script answers 500.
//! Invariants: The server lives on its own runtime and stops when the stub is dropped.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{Value, json};
use url::Url;

#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: String,
    /// Path and query exactly as sent.
    pub target: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Recorded {
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://stub{}", self.target)).expect("request target")
    }

    pub fn query(&self) -> HashMap<String, String> {
        self.url().query_pairs().into_owned().collect()
    }
}

#[derive(Default)]
struct Script {
    responses: Mutex<VecDeque<(u16, Value)>>,
    requests: Mutex<Vec<Recorded>>,
}

pub struct StubServer {
    pub base_url: String,
    script: Arc<Script>,
    _runtime: tokio::runtime::Runtime,
}

impl StubServer {
    pub fn start(responses: Vec<(u16, Value)>) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("stub runtime");
        let script = Arc::new(Script {
            responses: Mutex::new(responses.into()),
            requests: Mutex::default(),
        });
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .expect("bind stub");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        let app = Router::new()
            .fallback(replay)
            .with_state(Arc::clone(&script));
        runtime.spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            base_url,
            script,
            _runtime: runtime,
        }
    }

    /// Serves every body with `200 OK`.
    pub fn ok(bodies: Vec<Value>) -> Self {
        Self::start(bodies.into_iter().map(|body| (200, body)).collect())
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.script.requests.lock().expect("lock").clone()
    }
}

async fn replay(
    State(script): State<Arc<Script>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let target = uri
        .path_and_query()
        .map(|target| target.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    script.requests.lock().expect("lock").push(Recorded {
        method: method.as_str().to_string(),
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let next = script.responses.lock().expect("lock").pop_front();
    let (status, payload) = next.unwrap_or_else(|| {
        (
            500,
            json!({"error": {"code": 500, "message": "stub script exhausted"}}),
        )
    });
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(payload)).into_response()
}

//! Purpose: JSON-RPC 2.0 envelopes and MCP method routing for the sheet tools.
//! Exports: `McpDispatcher`, `McpHandler`, `RpcError`, `RpcResponse`, tool descriptor/output types.
//! Role: Transport-independent core shared by `sheetport mcp` and `sheetport serve`.
//! Invariants: A well-formed message without `id` is a notification and never gets a response.
//! Invariants: Malformed envelopes always get an error response, with a null id when none is usable.
//! Invariants: Tool failures travel in `result.isError`; only protocol failures use `error`.

use serde::Serialize;
use serde_json::{Map, Value, json};

pub const PROTOCOL_VERSION: &str = "2025-11-25";
const SERVER_NAME: &str = "sheetport";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    Internal,
}

impl RpcErrorCode {
    pub fn as_i32(self) -> i32 {
        match self {
            RpcErrorCode::ParseError => -32700,
            RpcErrorCode::InvalidRequest => -32600,
            RpcErrorCode::MethodNotFound => -32601,
            RpcErrorCode::InvalidParams => -32602,
            RpcErrorCode::Internal => -32603,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_i32(),
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ParseError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidRequest, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InvalidParams, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Internal, message)
    }

    pub fn is(&self, code: RpcErrorCode) -> bool {
        self.code == code.as_i32()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestId {
    Text(String),
    Number(i64),
    Null,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcOutcome {
    Result(Value),
    Error(RpcError),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    #[serde(flatten)]
    pub outcome: RpcOutcome,
}

impl RpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            outcome: RpcOutcome::Result(result),
        }
    }

    pub fn failure(id: RequestId, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            outcome: RpcOutcome::Error(error),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            RpcOutcome::Result(value) => Some(value),
            RpcOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RpcError> {
        match &self.outcome {
            RpcOutcome::Result(_) => None,
            RpcOutcome::Error(error) => Some(error),
        }
    }
}

/// Hints MCP clients use to decide whether a call needs confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    pub read_only_hint: bool,
    pub destructive_hint: bool,
    pub idempotent_hint: bool,
}

impl ToolAnnotations {
    pub const READ_ONLY: Self = Self {
        read_only_hint: true,
        destructive_hint: false,
        idempotent_hint: true,
    };

    /// Writes cells but never deletes sheets or data outside the pasted block.
    pub const WRITES: Self = Self {
        read_only_hint: false,
        destructive_hint: false,
        idempotent_hint: false,
    };
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub annotations: ToolAnnotations,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolOutput {
    pub content: Vec<Content>,
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: true,
        }
    }

    pub fn text_body(&self) -> Option<&str> {
        match self.content.first() {
            Some(Content::Text { text }) => Some(text.as_str()),
            None => None,
        }
    }
}

pub trait McpHandler {
    fn tools(&self) -> Vec<ToolDescriptor>;

    fn call_tool(&mut self, call: ToolCall) -> Result<ToolOutput, RpcError>;

    /// Usage guidance returned from `initialize`.
    fn instructions(&self) -> Option<&str> {
        None
    }
}

enum Method {
    Initialize,
    Acknowledge,
    ListTools,
    CallTool,
}

impl Method {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "initialize" => Some(Method::Initialize),
            "notifications/initialized" | "notifications/cancelled" | "ping" => {
                Some(Method::Acknowledge)
            }
            "tools/list" => Some(Method::ListTools),
            "tools/call" => Some(Method::CallTool),
            _ => None,
        }
    }
}

struct Envelope {
    id: Option<RequestId>,
    method: String,
    params: Option<Value>,
}

pub struct McpDispatcher<H> {
    handler: H,
}

impl<H: McpHandler> McpDispatcher<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    /// Handles one raw JSON-RPC message; `None` means nothing should be sent back.
    pub fn handle_line(&mut self, line: &str) -> Option<RpcResponse> {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => self.handle_value(value),
            Err(_) => Some(RpcResponse::failure(
                RequestId::Null,
                RpcError::parse("invalid JSON"),
            )),
        }
    }

    pub fn handle_value(&mut self, value: Value) -> Option<RpcResponse> {
        let envelope = match read_envelope(value) {
            Ok(envelope) => envelope,
            Err(response) => return Some(response),
        };
        let outcome = self.route(&envelope.method, envelope.params);
        let id = envelope.id?;
        Some(match outcome {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => RpcResponse::failure(id, error),
        })
    }

    fn route(&mut self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        let Some(route) = Method::from_name(method) else {
            return Err(RpcError::new(
                RpcErrorCode::MethodNotFound,
                format!("method not found: {method}"),
            ));
        };
        let mut params = params_object(params)?;
        match route {
            Method::Initialize => Ok(self.initialize()),
            Method::Acknowledge => Ok(json!({})),
            Method::ListTools => Ok(json!({ "tools": self.handler.tools() })),
            Method::CallTool => {
                let name = match params.remove("name") {
                    Some(Value::String(name)) => name,
                    _ => {
                        return Err(RpcError::invalid_params(
                            "tools/call requires string param `name`",
                        ));
                    }
                };
                let arguments = match params.remove("arguments") {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(arguments)) => arguments,
                    Some(_) => {
                        return Err(RpcError::invalid_params(
                            "tools/call `arguments` must be an object",
                        ));
                    }
                };
                let output = self.handler.call_tool(ToolCall { name, arguments })?;
                serde_json::to_value(output)
                    .map_err(|_| RpcError::internal("failed to encode tool output"))
            }
        }
    }

    fn initialize(&self) -> Value {
        let mut result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
        });
        if let Some(text) = self.handler.instructions() {
            result["instructions"] = json!(text);
        }
        result
    }
}

fn read_envelope(value: Value) -> Result<Envelope, RpcResponse> {
    let Value::Object(mut object) = value else {
        return Err(RpcResponse::failure(
            RequestId::Null,
            RpcError::invalid_request("request must be a JSON object"),
        ));
    };

    let id = match object.remove("id") {
        None => None,
        Some(Value::String(text)) => Some(RequestId::Text(text)),
        Some(Value::Null) => Some(RequestId::Null),
        Some(Value::Number(number)) => match number.as_i64() {
            Some(number) => Some(RequestId::Number(number)),
            None => {
                return Err(RpcResponse::failure(
                    RequestId::Null,
                    RpcError::invalid_request("id must be an integer number"),
                ));
            }
        },
        Some(_) => {
            return Err(RpcResponse::failure(
                RequestId::Null,
                RpcError::invalid_request("id must be a string, integer number, or null"),
            ));
        }
    };
    let reject = |message: &str| {
        RpcResponse::failure(
            id.clone().unwrap_or(RequestId::Null),
            RpcError::invalid_request(message),
        )
    };

    if object.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(reject("jsonrpc must be \"2.0\""));
    }
    let method = match object.remove("method") {
        Some(Value::String(method)) => method,
        _ => return Err(reject("missing method field")),
    };

    Ok(Envelope {
        id,
        method,
        params: object.remove("params"),
    })
}

fn params_object(params: Option<Value>) -> Result<Map<String, Value>, RpcError> {
    match params {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(RpcError::invalid_params(
            "params must be an object when provided",
        )),
    }
}

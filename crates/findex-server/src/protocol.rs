//! JSON-RPC protocol types.
//!
//! Requests and responses follow JSON-RPC 2.0, one message per line.
//! Index events are pushed as notifications (no `id`).

use crate::engine::IndexEvent;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// An incoming call. Without an `id` it is a notification.
#[derive(Debug, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error(detail: impl fmt::Display) -> Self {
        Self::new(PARSE_ERROR, format!("Parse error: {}", detail))
    }

    pub fn invalid_request(reason: &str) -> Self {
        Self::new(INVALID_REQUEST, format!("Invalid request: {}", reason))
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }

    pub fn invalid_params(detail: impl fmt::Display) -> Self {
        Self::new(INVALID_PARAMS, format!("Invalid params: {}", detail))
    }

    pub fn internal(detail: impl fmt::Display) -> Self {
        Self::new(INTERNAL_ERROR, detail.to_string())
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl From<EngineError> for RpcError {
    fn from(err: EngineError) -> Self {
        Self::internal(err)
    }
}

/// Reply to a request. Holds exactly one of `result` or `error`.
#[derive(Debug, Serialize)]
pub struct Response {
    jsonrpc: &'static str,
    /// Null when the request's id could not be read.
    id: Value,
    #[serde(flatten)]
    outcome: Outcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Outcome {
    Result(Value),
    Error(RpcError),
}

impl Response {
    pub fn ok(id: Option<Value>, result: Value) -> Self {
        Self::with(id, Outcome::Result(result))
    }

    pub fn err(id: Option<Value>, error: RpcError) -> Self {
        Self::with(id, Outcome::Error(error))
    }

    fn with(id: Option<Value>, outcome: Outcome) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: id.unwrap_or(Value::Null),
            outcome,
        }
    }

    pub fn id(&self) -> &Value {
        &self.id
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Result(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RpcError> {
        match &self.outcome {
            Outcome::Result(_) => None,
            Outcome::Error(error) => Some(error),
        }
    }
}

/// A server-initiated message with no reply expected.
#[derive(Debug, Serialize)]
pub struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: Value,
}

impl Notification {
    pub fn new(method: &'static str, params: impl Serialize) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params: serde_json::to_value(params).unwrap_or(Value::Null),
        }
    }

    /// `indexProgress` or `indexReady`, depending on the event.
    pub fn from_event(event: &IndexEvent) -> Self {
        match event {
            IndexEvent::Progress(progress) => Self::new("indexProgress", progress),
            IndexEvent::Ready { count } => Self::new("indexReady", json!({ "count": count })),
        }
    }
}

/// Params for the search method.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    /// Overrides `maxResults`.
    pub limit: Option<usize>,
    /// Overrides `showOnlyDirectories`.
    pub directories_only: Option<bool>,
}

/// Params for addRecentSearch.
#[derive(Debug, Deserialize)]
pub struct RecentSearchParams {
    pub query: String,
}

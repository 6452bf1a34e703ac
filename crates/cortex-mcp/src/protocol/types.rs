//! Wire types for the stdio framing.
//!
//! Each request is one JSON object per line: `{id, method, params}`. Each
//! response is `{id, result}` or `{id, error}` where the error is a
//! structured `{code, message, path?}`. Error codes are stable and come from
//! the core taxonomy.

use cortex_core::CortexError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

/// One framed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Correlates the response; a request without one gets no response
    #[serde(default)]
    pub id: Option<Value>,
    /// `initialize` once, then a tool name
    pub method: String,
    /// Tool input
    #[serde(default)]
    pub params: Option<Value>,
}

/// One framed response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, error: RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Structured error payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Stable numeric code
    pub code: i32,
    /// Human-readable description
    pub message: String,
    /// Dotted path to the offending input field, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Unparseable frame
    pub fn parse_error() -> Self {
        Self::new(-32700, "parse error")
    }

    /// Unknown method/tool name
    pub fn method_not_found(method: &str) -> Self {
        Self::new(-32601, format!("unknown method: {method}"))
    }

    /// Tool call before `initialize`
    pub fn not_initialized() -> Self {
        Self::new(-32003, "server not initialized")
    }
}

impl From<CortexError> for RpcError {
    fn from(err: CortexError) -> Self {
        Self {
            code: err.code(),
            path: err.path().map(str::to_string),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

// ============================================================================
// TESTS
// ============================================================================

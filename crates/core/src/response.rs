//! The result envelope returned by every command invocation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one command invocation.
///
/// A response is constructed once and returned; nothing mutates it
/// afterwards. The error variant is the same shape with the flag set,
/// so transports can serialize both identically.
///
/// On the wire the flag is named `error` to match the request/response
/// envelope consumed by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Whether this response reports a failure.
    #[serde(rename = "error")]
    pub is_error: bool,
    /// Human-readable outcome text.
    pub message: String,
    /// Optional structured payload for machine consumers.
    pub value: Option<Value>,
}

impl Response {
    /// Successful response with a message and no payload.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            is_error: false,
            message: message.into(),
            value: None,
        }
    }

    /// Successful response carrying a structured payload.
    pub fn ok_with(message: impl Into<String>, value: Value) -> Self {
        Self {
            is_error: false,
            message: message.into(),
            value: Some(value),
        }
    }

    /// Error response with a message and no payload.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            message: message.into(),
            value: None,
        }
    }

    /// Error response carrying a structured payload.
    pub fn error_with(message: impl Into<String>, value: Value) -> Self {
        Self {
            is_error: true,
            message: message.into(),
            value: Some(value),
        }
    }
}

impl Default for Response {
    /// The empty success response, used when a handler has nothing to say.
    fn default() -> Self {
        Self::ok("")
    }
}

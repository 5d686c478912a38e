//! JSON-RPC 2.0 message shapes used by every MCP transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// MCP protocol revision advertised during the handshake.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Outbound JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

impl<'a> JsonRpcRequest<'a> {
    /// Creates a request with a numeric id.
    #[must_use]
    pub const fn new(id: u64, method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }

    /// Returns the request id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

/// Outbound JSON-RPC notification (no id, no response).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Value::is_null")]
    params: Value,
}

impl<'a> JsonRpcNotification<'a> {
    /// Creates a notification.
    #[must_use]
    pub const fn new(method: &'a str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// Error object carried by a failed JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i64,
    /// Error message as sent by the server.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Creates an error object without extra data.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

/// Inbound JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Creates a successful response, mainly for in-memory transports.
    #[must_use]
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id: Value::from(id),
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response, mainly for in-memory transports.
    #[must_use]
    pub fn failure(id: u64, error: JsonRpcError) -> Self {
        Self {
            id: Value::from(id),
            result: None,
            error: Some(error),
        }
    }

    /// Parses an inbound message, returning `None` for anything that is not a
    /// response (server requests, notifications, log noise).
    #[must_use]
    pub fn parse(value: Value) -> Option<Self> {
        let is_response = value.get("id").is_some_and(|id| !id.is_null())
            && (value.get("result").is_some() || value.get("error").is_some());
        if !is_response {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Returns the numeric request id this response answers.
    ///
    /// String ids holding a decimal number are accepted as well.
    #[must_use]
    pub fn request_id(&self) -> Option<u64> {
        match &self.id {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.parse().ok(),
            _ => None,
        }
    }

    /// Converts the response into its result value or remote error.
    ///
    /// # Errors
    ///
    /// Returns the server's [`JsonRpcError`] unchanged.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match (self.error, self.result) {
            (Some(error), _) => Err(error),
            (None, Some(result)) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_as_json_rpc() {
        let request = JsonRpcRequest::new(7, "tools/list", json!({}));
        let value = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list", "params": {}})
        );
    }

    #[test]
    fn notification_omits_null_params() {
        let notification = JsonRpcNotification::new("notifications/initialized", Value::Null);
        let value = serde_json::to_value(&notification).expect("notification should serialize");
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"})
        );
    }

    #[test]
    fn parse_ignores_server_notifications() {
        let message = json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {}});
        assert!(JsonRpcResponse::parse(message).is_none());
    }

    #[test]
    fn string_ids_are_accepted() {
        let response = JsonRpcResponse::parse(json!({"jsonrpc": "2.0", "id": "12", "result": {}}))
            .expect("response should parse");
        assert_eq!(response.request_id(), Some(12));
    }

    #[test]
    fn remote_errors_are_preserved() {
        let response = JsonRpcResponse::parse(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "error": {"code": -32602, "message": "Unknown tool: forecast"}
        }))
        .expect("response should parse");
        let error = response.into_result().expect_err("error response expected");
        assert_eq!(error.code, -32602);
        assert_eq!(error.to_string(), "Unknown tool: forecast");
    }
}

//! JSON-RPC 2.0 message types.
//!
//! Requests carry an `id` and get exactly one response; notifications have
//! no `id` and get none. Ids are strings or integers, never `null`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The MCP protocol version this server speaks.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name reported during initialisation.
pub const SERVER_NAME: &str = "interconnect-fixture";

const JSONRPC_VERSION: &str = "2.0";

/// A request id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer id.
    Number(i64),
    /// String id.
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// An incoming request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol marker, always `"2.0"`.
    pub jsonrpc: String,
    /// Request id.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Deserialises `params` into `T`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-params error if `params` is missing or has the
    /// wrong shape.
    pub fn parse_params<T: serde::de::DeserializeOwned>(&self) -> Result<T, JsonRpcError> {
        let params = self
            .params
            .clone()
            .ok_or_else(|| JsonRpcError::invalid_params(self.id.clone(), "Missing params"))?;
        serde_json::from_value(params).map_err(|e| {
            JsonRpcError::invalid_params(self.id.clone(), format!("Invalid params: {e}"))
        })
    }
}

/// An incoming notification.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcNotification {
    /// Protocol marker, always `"2.0"`.
    pub jsonrpc: String,
    /// Notification name.
    pub method: String,
    /// Notification parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// A successful response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Id of the request being answered.
    pub id: RequestId,
    /// Method result.
    pub result: Value,
}

impl JsonRpcResponse {
    /// Creates a success response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Value is not const-compatible
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// Standard JSON-RPC error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The message was not valid JSON.
    ParseError,
    /// The JSON was not a valid request.
    InvalidRequest,
    /// Unknown method.
    MethodNotFound,
    /// Bad method parameters.
    InvalidParams,
    /// Failure inside the server.
    InternalError,
}

impl ErrorCode {
    /// Numeric code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }

    /// Message used when no more specific one is given.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
        }
    }
}

/// The `error` member of an error response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorData {
    /// Numeric code.
    pub code: i32,
    /// Short description.
    pub message: String,
    /// Extra detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorData {
    /// Error with the code's default message.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self::with_message(code, code.default_message())
    }

    /// Error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }
}

/// An error response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Id of the failed request, when it could be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    /// Error details.
    pub error: JsonRpcErrorData,
}

impl JsonRpcError {
    /// Creates an error response.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // JsonRpcErrorData contains String
    pub fn new(id: Option<RequestId>, error: JsonRpcErrorData) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }

    /// The message could not be parsed at all.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(None, JsonRpcErrorData::from_code(ErrorCode::ParseError))
    }

    /// The message is JSON but not a request or notification.
    #[must_use]
    pub fn invalid_request(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::new(
            id,
            JsonRpcErrorData::with_message(ErrorCode::InvalidRequest, message),
        )
    }

    /// No such method.
    #[must_use]
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::new(
            Some(id),
            JsonRpcErrorData::with_message(
                ErrorCode::MethodNotFound,
                format!("Method not found: {method}"),
            ),
        )
    }

    /// Bad parameters.
    #[must_use]
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(
            Some(id),
            JsonRpcErrorData::with_message(ErrorCode::InvalidParams, message),
        )
    }

    /// Server-side failure.
    #[must_use]
    pub fn internal_error(id: RequestId, message: impl Into<String>) -> Self {
        Self::new(
            Some(id),
            JsonRpcErrorData::with_message(ErrorCode::InternalError, message),
        )
    }
}

/// A parsed incoming message.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// Expects a response.
    Request(JsonRpcRequest),
    /// Expects no response.
    Notification(JsonRpcNotification),
}

impl IncomingMessage {
    /// Method name.
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Request(req) => &req.method,
            Self::Notification(notif) => &notif.method,
        }
    }

    /// Request id, if this is a request.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(req) => Some(&req.id),
            Self::Notification(_) => None,
        }
    }
}

/// Parses one line of input.
///
/// # Errors
///
/// Returns a parse error for invalid JSON and an invalid-request error for
/// JSON that is not a JSON-RPC 2.0 message.
pub fn parse_message(json: &str) -> Result<IncomingMessage, JsonRpcError> {
    let value: Value = serde_json::from_str(json).map_err(|_| JsonRpcError::parse_error())?;
    let obj = value.as_object().ok_or_else(JsonRpcError::parse_error)?;

    if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(JsonRpcError::invalid_request(
            None,
            "jsonrpc field must be \"2.0\"",
        ));
    }

    if obj.contains_key("id") {
        let request: JsonRpcRequest = serde_json::from_value(value)
            .map_err(|e| JsonRpcError::invalid_request(None, e.to_string()))?;
        if request.method.is_empty() {
            return Err(JsonRpcError::invalid_request(
                Some(request.id),
                "method field cannot be empty",
            ));
        }
        Ok(IncomingMessage::Request(request))
    } else {
        let notification: JsonRpcNotification = serde_json::from_value(value)
            .map_err(|e| JsonRpcError::invalid_request(None, e.to_string()))?;
        Ok(IncomingMessage::Notification(notification))
    }
}

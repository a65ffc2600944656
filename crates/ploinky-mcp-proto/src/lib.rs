//! The MCP wire protocol: JSON-RPC 2.0 over HTTP, plus the small set of
//! method-specific payload shapes every MCP participant (router aggregator,
//! per-agent server, CLI client) needs to agree on.
//!
//! A single strongly-typed client/server implementation: methods are
//! enumerated here, not discovered at runtime via reflection or dynamic
//! registration.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC error code reserved for "no `mcp-session-id` header on a
/// non-`initialize` request".
pub const SESSION_MISSING: i64 = -32000;
/// JSON-RPC error code for internal, unclassified failures.
pub const INTERNAL_ERROR: i64 = -32603;

/// Method names required by the wire protocol (`prompts/list` is optional
/// and callers should treat a `Method not found` response as "no prompts").
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PING: &str = "ping";
}

/// A JSON-RPC 2.0 request or notification (no `id` field for the latter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: JsonRpcVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn call(id: i64, method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: JsonRpcVersion, id: Some(Value::from(id)), method: method.into(), params: Some(params) }
    }

    #[must_use]
    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: JsonRpcVersion, id: None, method: method.into(), params: Some(params) }
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A JSON-RPC 2.0 response envelope: exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: JsonRpcVersion,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn ok(id: Value, result: Value) -> Self {
        Self { jsonrpc: JsonRpcVersion, id, result: Some(result), error: None }
    }

    #[must_use]
    pub fn err(id: Value, error: JsonRpcError) -> Self {
        Self { jsonrpc: JsonRpcVersion, id, result: None, error: Some(error) }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    #[must_use]
    pub fn session_missing() -> Self {
        Self::new(SESSION_MISSING, "Missing session")
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

/// The literal `"2.0"` string, serialized/deserialized without allocating a
/// `String` field for it everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s != "2.0" {
            return Err(serde::de::Error::custom(format!("unsupported jsonrpc version {s:?}")));
        }
        Ok(JsonRpcVersion)
    }
}

/// Header carrying the server-issued MCP session id on every request after
/// `initialize`.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// `initialize` result: server capabilities plus the fresh session id
/// (delivered via the `mcp-session-id` response header by the transport,
/// not embedded in this struct).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: Option<Value>,
    #[serde(default)]
    pub resources: Option<Value>,
    #[serde(default)]
    pub prompts: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// One tool descriptor as returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// Set by the aggregator when merging across agents; absent on the
    /// wire response from a single agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDescriptor>,
}

/// One resource descriptor as returned by `resources/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesListResult {
    pub resources: Vec<ResourceDescriptor>,
}

/// `tools/call` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// One piece of MCP content (the only variant this system emits is text,
/// plus the streamed-tool-result placeholder).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

impl Content {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }
}

/// Metadata attached to a `tools/call` result. `task_id` is set when the
/// tool was dispatched asynchronously via the Task Queue; `agent` is set by
/// the aggregator so callers can verify which agent actually served a call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallToolMetadata {
    #[serde(rename = "taskId", default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(default, rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "is_default_metadata")]
    pub metadata: CallToolMetadata,
}

fn is_default_metadata(m: &CallToolMetadata) -> bool {
    m.task_id.is_none() && m.agent.is_none()
}

impl CallToolResult {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self { content: vec![Content::text(text)], is_error: false, metadata: CallToolMetadata::default() }
    }

    #[must_use]
    pub fn error_text(text: impl Into<String>) -> Self {
        Self { content: vec![Content::text(text)], is_error: true, metadata: CallToolMetadata::default() }
    }

    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.metadata.agent = Some(agent.into());
        self
    }
}

/// `ping` result: an empty object per the MCP convention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingResult {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json() {
        let req = JsonRpcRequest::call(1, methods::TOOLS_CALL, serde_json::json!({"name": "echo"}));
        let text = serde_json::to_string(&req).unwrap();
        let back: JsonRpcRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(back.method, methods::TOOLS_CALL);
        assert_eq!(back.id, Some(Value::from(1)));
    }

    #[test]
    fn notification_has_no_id() {
        let note = JsonRpcRequest::notification(methods::INITIALIZED, Value::Null);
        assert!(note.is_notification());
        let text = serde_json::to_string(&note).unwrap();
        assert!(!text.contains("\"id\""));
    }

    #[test]
    fn reserved_error_codes_have_fixed_values() {
        assert_eq!(SESSION_MISSING, -32000);
        assert_eq!(INTERNAL_ERROR, -32603);
        assert_eq!(JsonRpcError::session_missing().code, SESSION_MISSING);
    }

    #[test]
    fn rejects_wrong_jsonrpc_version() {
        let bad = r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#;
        let result: Result<JsonRpcRequest, _> = serde_json::from_str(bad);
        assert!(result.is_err());
    }
}

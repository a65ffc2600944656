//! The HTTP transport for an agent's MCP server: a single JSON-RPC endpoint
//! enforcing the `mcp-session-id` header on every request after
//! `initialize`, plus `/health` and `/getTaskStatus` side endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ploinky_core::Kinded;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use ploinky_mcp_proto::{
    CallToolMetadata, CallToolParams, CallToolResult, Content, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, PingResult, ResourceDescriptor, ResourcesListResult,
    ServerCapabilities, ServerInfo, ToolDescriptor, ToolsListResult, methods, SESSION_HEADER,
};
use serde_json::Value;

use crate::config::{resolve_cwd, McpConfig};
use crate::executor::{self, CommandSpec};
use crate::schema;
use crate::tasks::TaskQueue;
use crate::{resources, AgentName};

pub struct AppState {
    pub agent_name: AgentName,
    pub config: McpConfig,
    pub config_dir: std::path::PathBuf,
    pub tasks: Arc<TaskQueue>,
    pub session: std::sync::Mutex<Option<String>>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_rpc))
        .route("/health", get(handle_health))
        .route("/getTaskStatus", get(handle_task_status))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct TaskStatusQuery {
    id: String,
}

async fn handle_task_status(State(state): State<Arc<AppState>>, Query(query): Query<TaskStatusQuery>) -> Response {
    match state.tasks.get(&query.id).await {
        Some(task) => Json(task).into_response(),
        None => (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "unknown task"}))).into_response(),
    }
}

async fn handle_rpc(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(req): Json<JsonRpcRequest>) -> Response {
    let id = req.id.clone().unwrap_or(Value::Null);

    if req.method != methods::INITIALIZE {
        let header_session = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string);
        let known = state.session.lock().expect("session lock poisoned").clone();
        match (header_session, known) {
            (Some(given), Some(known)) if given == known => {}
            _ => {
                warn!(method = %req.method, "rejected request missing or mismatched session");
                return Json(JsonRpcResponse::err(id, JsonRpcError::session_missing())).into_response();
            }
        }
    }

    let (result, new_session) = dispatch(&state, &req).await;
    let mut response = match result {
        Ok(value) => Json(JsonRpcResponse::ok(id, value)).into_response(),
        Err(error) => Json(JsonRpcResponse::err(id, error)).into_response(),
    };

    if let Some(session_id) = new_session {
        if let Ok(value) = session_id.parse() {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
        *state.session.lock().expect("session lock poisoned") = Some(session_id);
    }

    response
}

async fn dispatch(state: &Arc<AppState>, req: &JsonRpcRequest) -> (Result<Value, JsonRpcError>, Option<String>) {
    match req.method.as_str() {
        methods::INITIALIZE => {
            let session_id = Uuid::new_v4().to_string();
            let result = InitializeResult {
                protocol_version: "2025-03-26".to_string(),
                capabilities: ServerCapabilities {
                    tools: Some(Value::Object(Default::default())),
                    resources: Some(Value::Object(Default::default())),
                    prompts: None,
                },
                server_info: ServerInfo { name: state.agent_name.0.clone(), version: env!("CARGO_PKG_VERSION").to_string() },
            };
            (serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string())), Some(session_id))
        }
        methods::INITIALIZED => (Ok(Value::Null), None),
        methods::PING => (serde_json::to_value(PingResult::default()).map_err(|e| JsonRpcError::internal(e.to_string())), None),
        methods::TOOLS_LIST => {
            let tools = state
                .config
                .tools
                .iter()
                .map(|t| ToolDescriptor {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t
                        .input_schema
                        .as_ref()
                        .map(|s| serde_json::to_value(s).unwrap_or(Value::Null))
                        .unwrap_or_else(|| serde_json::json!({"type": "object"})),
                    agent: None,
                })
                .collect();
            (serde_json::to_value(ToolsListResult { tools }).map_err(|e| JsonRpcError::internal(e.to_string())), None)
        }
        methods::RESOURCES_LIST => {
            let resources = state
                .config
                .resources
                .iter()
                .map(|r| ResourceDescriptor {
                    uri: r.uri.clone(),
                    name: r.name.clone(),
                    description: r.description.clone(),
                    mime_type: r.mime_type.clone(),
                    agent: None,
                })
                .collect();
            (serde_json::to_value(ResourcesListResult { resources }).map_err(|e| JsonRpcError::internal(e.to_string())), None)
        }
        methods::RESOURCES_READ => (handle_resources_read(state, req).await, None),
        methods::TOOLS_CALL => (handle_tools_call(state, req).await, None),
        _ => (Err(JsonRpcError::new(-32601, format!("Method not found: {}", req.method))), None),
    }
}

async fn handle_resources_read(state: &Arc<AppState>, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
    let params = req.params.clone().unwrap_or(Value::Null);
    let uri = params.get("uri").and_then(Value::as_str).ok_or_else(|| JsonRpcError::new(-32602, "missing uri"))?;

    let (spec, placeholders) =
        resources::resolve(&state.config.resources, uri).map_err(|e| JsonRpcError::new(e.kind().json_rpc_code(), e.to_string()))?;

    let command_spec = CommandSpec {
        command: spec.command.clone(),
        cwd: state.config_dir.clone(),
        env: placeholders.into_iter().map(|(k, v)| (k.to_uppercase(), v)).collect(),
        timeout_ms: 30_000,
    };
    let outcome = executor::run(&spec.name, &command_spec, &Value::Null, &Value::Null).await;
    if outcome.code != Some(0) {
        return Err(JsonRpcError::internal(format!("resource command failed: {}", outcome.stderr)));
    }
    Ok(serde_json::json!({
        "contents": [{
            "uri": uri,
            "mimeType": spec.mime_type.clone().unwrap_or_else(|| "text/plain".to_string()),
            "text": outcome.stdout,
        }]
    }))
}

async fn handle_tools_call(state: &Arc<AppState>, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
    let params: CallToolParams = serde_json::from_value(req.params.clone().unwrap_or(Value::Null))
        .map_err(|e| JsonRpcError::new(-32602, format!("invalid params: {e}")))?;

    let tool = state
        .config
        .tools
        .iter()
        .find(|t| t.name == params.name)
        .ok_or_else(|| JsonRpcError::new(-32601, format!("unknown tool {:?}", params.name)))?;

    if let Some(input_schema) = &tool.input_schema {
        if let Err(errors) = schema::validate(input_schema, &params.arguments) {
            let message = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
            return Err(JsonRpcError::new(-32004, message));
        }
    }

    let command_spec = CommandSpec {
        command: tool.command.clone(),
        cwd: resolve_cwd(&tool.cwd, &state.config_dir),
        env: std::collections::HashMap::new(),
        timeout_ms: tool.timeout_ms.unwrap_or(30_000),
    };

    if tool.r#async {
        let task_id = state
            .tasks
            .enqueue(tool.name.clone(), command_spec, params.arguments.clone(), Value::Null)
            .await;
        info!(task_id = %task_id, tool = %tool.name, "dispatched tool asynchronously");
        let result = CallToolResult {
            content: vec![Content::text(format!("Task {task_id} dispatched"))],
            is_error: false,
            metadata: CallToolMetadata { task_id: Some(task_id.to_string()), agent: None },
        };
        return serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()));
    }

    let outcome = executor::run(&tool.name, &command_spec, &params.arguments, &Value::Null).await;
    let result = executor::shape_result(&outcome);
    serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()))
}

//! The MCP Aggregator: maintains one lazily-established JSON-RPC session
//! per agent, fans `tools/list`/`resources/list` out across all agents and
//! merges the results, and routes `tools/call` either to an explicit
//! target agent or by looking the tool name up in the cached union.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use ploinky_mcp_proto::{
    methods, CallToolParams, CallToolResult, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    JsonRpcVersion, ResourceDescriptor, ToolDescriptor, SESSION_HEADER,
};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{RouterError, RouterResult};
use crate::routing_table::RoutingTable;

/// Interval between task-status polls for an async `tools/call` dispatch.
const TASK_POLL_INTERVAL: Duration = Duration::from_secs(30);

struct AgentSession {
    session_id: Option<String>,
    next_id: AtomicI64,
}

pub struct Aggregator {
    client: reqwest::Client,
    sessions: RwLock<HashMap<String, AgentSession>>,
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self { client: reqwest::Client::new(), sessions: RwLock::new(HashMap::new()) }
    }

    async fn ensure_session(&self, agent: &str, endpoint: &str) -> RouterResult<String> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(agent) {
                if let Some(id) = &session.session_id {
                    return Ok(id.clone());
                }
            }
        }

        let req = JsonRpcRequest::call(1, methods::INITIALIZE, serde_json::json!({}));
        let response = self
            .client
            .post(endpoint)
            .json(&req)
            .send()
            .await
            .map_err(|source| RouterError::UpstreamUnreachable { agent: agent.to_string(), source })?;

        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(RouterError::Unauthorized)?;

        let body: JsonRpcResponse = response.json().await.map_err(|source| RouterError::UpstreamUnreachable {
            agent: agent.to_string(),
            source,
        })?;
        let _init: InitializeResult = body
            .result
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or(RouterError::Unauthorized)?;

        let notification = JsonRpcRequest::notification(methods::INITIALIZED, Value::Null);
        let _ = self
            .client
            .post(endpoint)
            .header(SESSION_HEADER, &session_id)
            .json(&notification)
            .send()
            .await;

        let mut sessions = self.sessions.write().await;
        sessions.insert(agent.to_string(), AgentSession { session_id: Some(session_id.clone()), next_id: AtomicI64::new(2) });
        Ok(session_id)
    }

    async fn call(&self, agent: &str, endpoint: &str, method: &str, params: Value) -> RouterResult<Value> {
        let session_id = self.ensure_session(agent, endpoint).await?;
        let id = {
            let sessions = self.sessions.read().await;
            sessions.get(agent).map_or(1, |s| s.next_id.fetch_add(1, Ordering::Relaxed))
        };
        let req = JsonRpcRequest { jsonrpc: JsonRpcVersion, id: Some(Value::from(id)), method: method.to_string(), params: Some(params) };

        let response = self
            .client
            .post(endpoint)
            .header(SESSION_HEADER, &session_id)
            .json(&req)
            .send()
            .await
            .map_err(|source| RouterError::UpstreamUnreachable { agent: agent.to_string(), source })?;

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|source| RouterError::UpstreamUnreachable { agent: agent.to_string(), source })?;

        if let Some(error) = body.error {
            return Err(RouterError::UnknownAgent(format!("{agent}: {}", error.message)));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }

    /// `tools/list` fanned out across every routed agent; per-agent
    /// failures are logged and skipped rather than failing the whole call.
    pub async fn list_tools(&self, table: &RoutingTable) -> Vec<ToolDescriptor> {
        let calls = table.routes().map(|route| {
            let agent = route.agent.clone();
            let endpoint = route.mcp_endpoint.clone();
            async move { (agent.clone(), self.call(&agent, &endpoint, methods::TOOLS_LIST, Value::Null).await) }
        });

        let mut tools = Vec::new();
        for (agent, result) in join_all(calls).await {
            match result {
                Ok(value) => {
                    if let Ok(parsed) = serde_json::from_value::<ploinky_mcp_proto::ToolsListResult>(value) {
                        for mut tool in parsed.tools {
                            tool.agent = Some(agent.clone());
                            tools.push(tool);
                        }
                    }
                }
                Err(e) => warn!(agent = %agent, error = %e, "tools/list failed for agent"),
            }
        }
        tools
    }

    pub async fn list_resources(&self, table: &RoutingTable) -> Vec<ResourceDescriptor> {
        let calls = table.routes().map(|route| {
            let agent = route.agent.clone();
            let endpoint = route.mcp_endpoint.clone();
            async move { (agent.clone(), self.call(&agent, &endpoint, methods::RESOURCES_LIST, Value::Null).await) }
        });

        let mut resources = Vec::new();
        for (agent, result) in join_all(calls).await {
            match result {
                Ok(value) => {
                    if let Ok(parsed) = serde_json::from_value::<ploinky_mcp_proto::ResourcesListResult>(value) {
                        for mut resource in parsed.resources {
                            resource.agent = Some(agent.clone());
                            resources.push(resource);
                        }
                    }
                }
                Err(e) => warn!(agent = %agent, error = %e, "resources/list failed for agent"),
            }
        }
        resources
    }

    pub async fn ping(&self, table: &RoutingTable, agent: &str) -> RouterResult<bool> {
        let route = table.get(agent).ok_or_else(|| RouterError::UnknownAgent(agent.to_string()))?;
        self.call(agent, &route.mcp_endpoint, methods::PING, Value::Null).await.map(|_| true)
    }

    /// Resolve the agent for a `callTool` invocation: explicit target wins;
    /// otherwise looks `name` up in a fresh `tools/list` fan-out.
    pub async fn resolve_agent(&self, table: &RoutingTable, name: &str, explicit_agent: Option<&str>) -> RouterResult<String> {
        if let Some(agent) = explicit_agent {
            return Ok(agent.to_string());
        }
        let tools = self.list_tools(table).await;
        let candidates: Vec<String> = tools.iter().filter(|t| t.name == name).filter_map(|t| t.agent.clone()).collect();
        match candidates.len() {
            0 => Err(RouterError::ToolNotFound(name.to_string())),
            1 => Ok(candidates.into_iter().next().expect("length checked")),
            _ => Err(RouterError::AmbiguousTool { name: name.to_string(), candidates }),
        }
    }

    /// Route a `tools/call`, polling the Task Queue if the response carries
    /// `metadata.taskId`.
    pub async fn call_tool(&self, table: &RoutingTable, agent: &str, params: CallToolParams) -> RouterResult<CallToolResult> {
        let route = table.get(agent).ok_or_else(|| RouterError::UnknownAgent(agent.to_string()))?;
        let value = self
            .call(agent, &route.mcp_endpoint, methods::TOOLS_CALL, serde_json::to_value(&params).unwrap_or(Value::Null))
            .await?;
        let mut result: CallToolResult = serde_json::from_value(value).map_err(|_| RouterError::UnknownAgent(agent.to_string()))?;

        if let Some(task_id) = result.metadata.task_id.clone() {
            result = self.poll_task(&route.base_url(), agent, &task_id).await?;
        }
        result.metadata.agent = Some(agent.to_string());
        Ok(result)
    }

    async fn poll_task(&self, base_url: &str, agent: &str, task_id: &str) -> RouterResult<CallToolResult> {
        loop {
            let response = self
                .client
                .get(format!("{base_url}/getTaskStatus"))
                .query(&[("id", task_id)])
                .send()
                .await
                .map_err(|source| RouterError::UpstreamUnreachable { agent: agent.to_string(), source })?;

            #[derive(serde::Deserialize)]
            struct TaskStatus {
                state: String,
                error: Option<String>,
                result: Option<Value>,
            }
            let status: TaskStatus = response
                .json()
                .await
                .map_err(|source| RouterError::UpstreamUnreachable { agent: agent.to_string(), source })?;

            match status.state.as_str() {
                "completed" => {
                    return Ok(status
                        .result
                        .and_then(|v| serde_json::from_value(v).ok())
                        .unwrap_or_else(|| CallToolResult::text("task completed")));
                }
                "failed" => {
                    return Ok(CallToolResult::error_text(status.error.unwrap_or_else(|| "task failed".to_string())))
                }
                _ => tokio::time::sleep(TASK_POLL_INTERVAL).await,
            }
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedAggregator = Arc<Aggregator>;

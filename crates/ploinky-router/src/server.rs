//! Assembles the router's axum `Router`: auth endpoints, blob storage,
//! MCP aggregation, per-agent MCP proxy, per-agent static serving, and a
//! static-root fallback, each checked in that precedence order.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use ploinky_mcp_proto::{methods, CallToolParams, JsonRpcRequest, JsonRpcResponse};

use crate::aggregator::Aggregator;
use crate::auth;
use crate::error::RouterError;
use crate::oauth::{self, ClientCredentialsRequest, JwksCache, OAuthConfig};
use crate::routing_table::RoutingTable;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct RouterState {
    pub table: Arc<tokio::sync::RwLock<RoutingTable>>,
    pub aggregator: Arc<Aggregator>,
    pub sessions: Arc<SessionStore>,
    pub blobs_root: PathBuf,
    pub static_root: PathBuf,
    pub secrets_path: PathBuf,
    pub oauth: Option<Arc<OAuthConfig>>,
    pub jwks: Option<Arc<JwksCache>>,
}

pub fn router(state: RouterState) -> Router {
    Router::new()
        .route("/auth/login", get(auth_login))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/logout", post(auth_logout))
        .route("/auth/agent-token", post(auth_agent_token))
        .route("/blobs/:agent", post(crate::blobs::upload))
        .route("/blobs/:agent/:id", get(crate::blobs::download))
        .route("/mcp", post(mcp_aggregate))
        .route("/mcps/:agent/mcp", post(mcp_proxy))
        .route("/mcps/:agent/task", get(task_proxy))
        .route("/:agent/*rest", get(per_agent_static))
        .nest_service("/static-root", ServeDir::new(state.static_root.clone()))
        .fallback(get(static_fallback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Enforce the web-UI component token gate for a given query string token.
pub fn check_component_token(state: &RouterState, component: &'static str, provided: Option<&str>) -> Result<(), StatusCode> {
    let expected = auth::ensure_token(&state.secrets_path, component).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    match provided {
        Some(token) if auth::token_matches(&expected, token) => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn auth_login(State(state): State<RouterState>, Query(query): Query<RedirectQuery>) -> Response {
    let pending = state.sessions.begin_auth(query.redirect_uri.unwrap_or_default());
    Redirect::temporary(&format!("/auth/provider?state={}&nonce={}", pending.state, pending.nonce)).into_response()
}

#[derive(Debug, Deserialize)]
struct RedirectQuery {
    redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    state: String,
    code: String,
}

async fn auth_callback(State(state): State<RouterState>, Query(query): Query<CallbackQuery>) -> Response {
    let Some(_pending) = state.sessions.take_pending(&query.state) else {
        return (StatusCode::BAD_REQUEST, "unknown or expired state").into_response();
    };
    Json(serde_json::json!({ "status": "ok", "code": query.code })).into_response()
}

async fn auth_logout(State(state): State<RouterState>, Query(query): Query<TokenQuery>) -> Response {
    if let Some(session_id) = query.token {
        state.sessions.remove(&session_id);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn auth_agent_token(State(state): State<RouterState>, Json(req): Json<ClientCredentialsRequest>) -> Response {
    let Some(config) = &state.oauth else {
        return (StatusCode::SERVICE_UNAVAILABLE, "oauth not configured").into_response();
    };
    let client = reqwest::Client::new();
    match oauth::client_credentials_grant(&client, config, &req).await {
        Ok(token) => Json(token).into_response(),
        Err(_) => (StatusCode::UNAUTHORIZED, "invalid client credentials").into_response(),
    }
}

async fn mcp_aggregate(State(state): State<RouterState>, Json(req): Json<JsonRpcRequest>) -> Response {
    let id = req.id.clone().unwrap_or(Value::Null);
    let table = state.table.read().await;

    let result = match req.method.as_str() {
        methods::TOOLS_LIST => {
            let tools = state.aggregator.list_tools(&table).await;
            serde_json::to_value(ploinky_mcp_proto::ToolsListResult { tools })
        }
        methods::RESOURCES_LIST => {
            let resources = state.aggregator.list_resources(&table).await;
            serde_json::to_value(ploinky_mcp_proto::ResourcesListResult { resources })
        }
        methods::TOOLS_CALL => {
            let params: Result<CallToolParams, _> = serde_json::from_value(req.params.clone().unwrap_or(Value::Null));
            match params {
                Ok(params) => {
                    let explicit = req
                        .params
                        .as_ref()
                        .and_then(|p| p.get("agent"))
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    match state.aggregator.resolve_agent(&table, &params.name, explicit.as_deref()).await {
                        Ok(agent) => match state.aggregator.call_tool(&table, &agent, params).await {
                            Ok(result) => serde_json::to_value(result),
                            Err(e) => {
                                return Json(JsonRpcResponse::err(id, to_rpc_error(&e))).into_response();
                            }
                        },
                        Err(e) => return Json(JsonRpcResponse::err(id, to_rpc_error(&e))).into_response(),
                    }
                }
                Err(e) => return Json(JsonRpcResponse::err(id, ploinky_mcp_proto::JsonRpcError::new(-32602, e.to_string()))).into_response(),
            }
        }
        methods::PING => {
            let agent = req.params.as_ref().and_then(|p| p.get("agent")).and_then(Value::as_str).unwrap_or_default();
            match state.aggregator.ping(&table, agent).await {
                Ok(ok) => serde_json::to_value(serde_json::json!({ "ok": ok })),
                Err(e) => return Json(JsonRpcResponse::err(id, to_rpc_error(&e))).into_response(),
            }
        }
        other => {
            return Json(JsonRpcResponse::err(id, ploinky_mcp_proto::JsonRpcError::new(-32601, format!("Method not found: {other}"))))
                .into_response()
        }
    };

    match result {
        Ok(value) => Json(JsonRpcResponse::ok(id, value)).into_response(),
        Err(e) => Json(JsonRpcResponse::err(id, ploinky_mcp_proto::JsonRpcError::internal(e.to_string()))).into_response(),
    }
}

fn to_rpc_error(e: &RouterError) -> ploinky_mcp_proto::JsonRpcError {
    use ploinky_core::Kinded;
    ploinky_mcp_proto::JsonRpcError::new(e.kind().json_rpc_code(), e.to_string())
}

async fn mcp_proxy(State(state): State<RouterState>, AxumPath(agent): AxumPath<String>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    if let (Some(oauth), Some(jwks)) = (&state.oauth, &state.jwks) {
        let bearer = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        match bearer {
            Some(token) => {
                if oauth::verify(jwks, oauth, token, None).await.is_err() {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
            }
            None => return StatusCode::UNAUTHORIZED.into_response(),
        }
    }

    let table = state.table.read().await;
    let Some(route) = table.get(&agent) else {
        return (StatusCode::NOT_FOUND, "unknown agent").into_response();
    };

    let client = reqwest::Client::new();
    let mut request = client.post(format!("{}/mcp", route.base_url())).body(body);
    if let Some(session) = headers.get(ploinky_mcp_proto::SESSION_HEADER) {
        request = request.header(ploinky_mcp_proto::SESSION_HEADER, session);
    }

    match request.send().await {
        Ok(response) => {
            let status = response.status();
            let session_header = response.headers().get(ploinky_mcp_proto::SESSION_HEADER).cloned();
            match response.bytes().await {
                Ok(bytes) => {
                    let mut out = (status, bytes).into_response();
                    if let Some(value) = session_header {
                        out.headers_mut().insert(ploinky_mcp_proto::SESSION_HEADER, value);
                    }
                    out
                }
                Err(_) => StatusCode::BAD_GATEWAY.into_response(),
            }
        }
        Err(e) => {
            warn!(agent = %agent, error = %e, "agent proxy connection failed");
            (StatusCode::BAD_GATEWAY, Json(serde_json::json!({ "error": "upstream unreachable" }))).into_response()
        }
    }
}

async fn task_proxy(State(state): State<RouterState>, AxumPath(agent): AxumPath<String>, Query(query): Query<std::collections::HashMap<String, String>>) -> Response {
    let table = state.table.read().await;
    let Some(route) = table.get(&agent) else {
        return (StatusCode::NOT_FOUND, "unknown agent").into_response();
    };
    let client = reqwest::Client::new();
    match client.get(format!("{}/getTaskStatus", route.base_url())).query(&query).send().await {
        Ok(response) => {
            let status = response.status();
            match response.bytes().await {
                Ok(bytes) => (status, bytes).into_response(),
                Err(_) => StatusCode::BAD_GATEWAY.into_response(),
            }
        }
        Err(_) => (StatusCode::BAD_GATEWAY, Json(serde_json::json!({ "error": "upstream unreachable" }))).into_response(),
    }
}

/// `/<agent>/<rest>` when `<agent>` is a route carrying a static source
/// path; falls through to the static-root fallback otherwise so a path
/// segment that merely looks like an agent name (but isn't one, or has no
/// static source) still resolves against the static agent.
async fn per_agent_static(State(state): State<RouterState>, AxumPath((agent, rest)): AxumPath<(String, String)>) -> Response {
    let table = state.table.read().await;
    if let Some(route) = table.get(&agent) {
        if let Some(source) = &route.host_source_path {
            let Some(path) = safe_join(source, &rest) else {
                return StatusCode::BAD_REQUEST.into_response();
            };
            if let Ok(bytes) = tokio::fs::read(&path).await {
                return (StatusCode::OK, bytes).into_response();
            }
            return StatusCode::NOT_FOUND.into_response();
        }
    }
    drop(table);
    let uri: axum::http::Uri = format!("/{agent}/{rest}").parse().unwrap_or_else(|_| axum::http::Uri::from_static("/"));
    static_fallback(State(state), uri).await
}

/// Everything not claimed by another route: resolved against the static
/// agent's source directory, falling back to `index.html` for directories.
async fn static_fallback(State(state): State<RouterState>, uri: axum::http::Uri) -> Response {
    let table = state.table.read().await;
    let Some(route) = table.static_route() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(source) = &route.host_source_path else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let relative = uri.path().trim_start_matches('/');
    let Some(mut path) = safe_join(source, relative) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if path.is_dir() || relative.is_empty() {
        let indexed = if relative.is_empty() { "index.html".to_string() } else { format!("{relative}/index.html") };
        let Some(indexed_path) = safe_join(source, &indexed) else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        path = indexed_path;
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => (StatusCode::OK, bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Join `relative` onto `source`, rejecting any `..` path segment so a
/// request cannot escape the agent's static source directory.
fn safe_join(source: &str, relative: &str) -> Option<PathBuf> {
    if relative.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(PathBuf::from(source).join(relative))
}

//! Per-agent MCP server: loads the declarative tool/resource/prompt config,
//! validates `tools/call` arguments against the JSON-schema subset, executes
//! tools synchronously or via the persistent Task Queue, and answers the
//! handful of MCP JSON-RPC methods over HTTP.

pub mod config;
pub mod error;
pub mod executor;
pub mod file_config;
pub mod resources;
pub mod schema;
pub mod server;
pub mod tasks;

/// The agent's own short name, reported in `initialize`'s `serverInfo`.
#[derive(Debug, Clone)]
pub struct AgentName(pub String);

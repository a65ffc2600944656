//! Loads the declarative tool/resource/prompt configuration an agent's MCP
//! server exposes.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AgentError, AgentResult};
use crate::schema::SchemaSpec;

/// Where a tool's command runs: either relative to the config file's
/// directory, or the server process's current working directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Cwd {
    #[default]
    ConfigDir,
    Workspace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub cwd: Cwd,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<SchemaSpec>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub r#async: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    /// URI template containing `{param}` placeholders.
    pub uri: String,
    pub command: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub template: String,
}

/// The full declarative config. An absent file yields the default (empty)
/// config: the server still starts and answers `initialize`/`ping`, it
/// just exposes nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    #[serde(default)]
    pub prompts: Vec<PromptSpec>,
}

/// Candidate paths checked in order; the first readable file wins. An
/// explicit env override always takes priority.
fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(explicit) = env::var("PLOINKY_MCP_CONFIG_PATH") {
        if !explicit.is_empty() {
            candidates.push(PathBuf::from(explicit));
        }
    }
    candidates.push(PathBuf::from("/tmp/ploinky/mcp-config.json"));
    candidates.push(PathBuf::from("/code/mcp-config.json"));
    candidates.push(PathBuf::from("./mcp-config.json"));
    candidates
}

impl McpConfig {
    /// Load the first readable candidate, or the empty default if none
    /// exist. Returns the config plus the directory it was resolved
    /// relative to (used by [`Cwd::ConfigDir`]).
    pub fn load_default() -> AgentResult<(Self, PathBuf)> {
        for path in candidate_paths() {
            if path.is_file() {
                return Self::load(&path).map(|cfg| {
                    let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
                    (cfg, dir)
                });
            }
        }
        info!("no mcp config file found on any candidate path; starting with an empty tool set");
        Ok((Self::default(), env::current_dir().unwrap_or_else(|_| PathBuf::from("."))))
    }

    pub fn load(path: &Path) -> AgentResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| AgentError::ConfigRead { path: path.display().to_string(), source })?;
        let config: Self = serde_json::from_str(&text)?;
        debug!(path = %path.display(), tools = config.tools.len(), resources = config.resources.len(), "loaded mcp config");
        Ok(config)
    }
}

/// Resolve the working directory a tool's command should run in.
#[must_use]
pub fn resolve_cwd(cwd: &Cwd, config_dir: &Path) -> PathBuf {
    match cwd {
        Cwd::ConfigDir => config_dir.to_path_buf(),
        Cwd::Workspace => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_has_no_tools() {
        let config = McpConfig::default();
        assert!(config.tools.is_empty());
        assert!(config.resources.is_empty());
    }

    #[test]
    fn parses_tool_with_schema() {
        let json = r#"{
            "tools": [
                { "name": "echo", "command": "./echo.sh", "inputSchema": { "type": "object" } }
            ]
        }"#;
        let config: McpConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.tools[0].name, "echo");
        assert_eq!(config.tools[0].cwd, Cwd::ConfigDir);
    }

    #[test]
    fn load_missing_file_errors() {
        let err = McpConfig::load(Path::new("/nonexistent/mcp-config.json")).unwrap_err();
        assert!(matches!(err, AgentError::ConfigRead { .. }));
    }
}

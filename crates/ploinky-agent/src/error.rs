use thiserror::Error;

use ploinky_core::{Kind, Kinded};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to read mcp config at {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed mcp config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("unknown tool {0:?}")]
    UnknownTool(String),

    #[error("unknown resource template for uri {0:?}")]
    UnknownResource(String),

    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("tool {tool} exited with code {code}: {stderr}")]
    ToolFailed { tool: String, code: i32, stderr: String },

    #[error("tool {tool} timed out after {timeout_ms}ms")]
    ToolTimedOut { tool: String, timeout_ms: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing mcp-session-id header")]
    MissingSession,

    #[error("unknown task {0}")]
    UnknownTask(String),
}

impl Kinded for AgentError {
    fn kind(&self) -> Kind {
        match self {
            AgentError::ConfigRead { .. } | AgentError::Io(_) => Kind::Fatal,
            AgentError::ConfigParse(_) | AgentError::InvalidArguments { .. } => Kind::Validation,
            AgentError::UnknownTool(_) | AgentError::UnknownResource(_) | AgentError::UnknownTask(_) => Kind::NotFound,
            AgentError::ToolFailed { .. } => Kind::Fatal,
            AgentError::ToolTimedOut { .. } => Kind::Timeout,
            AgentError::MissingSession => Kind::Validation,
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

use thiserror::Error;

use ploinky_core::{Kind, Kinded};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("unknown agent {0:?}")]
    UnknownAgent(String),

    #[error("unknown blob {0:?}")]
    UnknownBlob(String),

    #[error("unknown tool {0:?}")]
    ToolNotFound(String),

    #[error("tool {name:?} is ambiguous across agents: {candidates:?}")]
    AmbiguousTool { name: String, candidates: Vec<String> },

    #[error("upstream agent {agent} unreachable: {source}")]
    UpstreamUnreachable { agent: String, source: reqwest::Error },

    #[error("invalid or expired token")]
    Unauthorized,

    #[error("invalid client credentials")]
    InvalidClientCredentials,

    #[error("jwks fetch failed: {0}")]
    JwksFetch(#[from] reqwest::Error),

    #[error("malformed routing table: {0}")]
    RoutingTableParse(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Kinded for RouterError {
    fn kind(&self) -> Kind {
        match self {
            RouterError::UnknownAgent(_) | RouterError::UnknownBlob(_) | RouterError::ToolNotFound(_) => Kind::NotFound,
            RouterError::AmbiguousTool { .. } => Kind::Ambiguous,
            RouterError::UpstreamUnreachable { .. } => Kind::Unavailable,
            RouterError::Unauthorized | RouterError::InvalidClientCredentials => Kind::Validation,
            RouterError::JwksFetch(_) => Kind::Transient,
            RouterError::RoutingTableParse(_) => Kind::Validation,
            RouterError::Io(_) => Kind::Fatal,
        }
    }
}

pub type RouterResult<T> = Result<T, RouterError>;

use thiserror::Error;

use ploinky_core::{Kind, Kinded};

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("no OCI-compatible container runtime found on PATH (tried: {tried})")]
    RuntimeNotFound { tried: String },

    #[error("container runtime command failed: {command} ({reason})")]
    CommandFailed { command: String, reason: String },

    #[error("no free host port available in range {start}-{end}")]
    PortExhausted { start: u16, end: u16 },

    #[error("container {0} not found")]
    NotFound(String),

    #[error("probe script {0:?} escapes the agent root")]
    ScriptPathTraversal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Kinded for ContainerError {
    fn kind(&self) -> Kind {
        match self {
            ContainerError::RuntimeNotFound { .. } => Kind::Unavailable,
            ContainerError::CommandFailed { .. } => Kind::Fatal,
            ContainerError::PortExhausted { .. } => Kind::Unavailable,
            ContainerError::NotFound(_) => Kind::NotFound,
            ContainerError::ScriptPathTraversal(_) => Kind::Validation,
            ContainerError::Io(_) => Kind::Fatal,
        }
    }
}

pub type ContainerResult<T> = Result<T, ContainerError>;

use thiserror::Error;

use crate::kind::{Kind, Kinded};

/// Errors raised while discovering or preparing the workspace layout.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to create symlink {target}: a real file or directory already exists there")]
    SymlinkTargetOccupied { target: String },

    #[error("profile {0:?} is not one of dev, qa, prod")]
    InvalidProfile(String),
}

impl Kinded for CoreError {
    fn kind(&self) -> Kind {
        match self {
            CoreError::Io { .. } => Kind::Fatal,
            CoreError::SymlinkTargetOccupied { .. } => Kind::Conflict,
            CoreError::InvalidProfile(_) => Kind::Validation,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

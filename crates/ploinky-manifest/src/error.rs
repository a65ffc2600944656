use thiserror::Error;

use ploinky_core::{Kind, Kinded};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("profile {0:?} is not one of dev, qa, prod")]
    InvalidProfile(String),

    #[error("alias {alias:?} is already used by agent {existing}")]
    AliasCollision { alias: String, existing: String },

    #[error("agent {0:?} is not registered")]
    UnknownAgent(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Kinded for ManifestError {
    fn kind(&self) -> Kind {
        match self {
            ManifestError::Read { .. } | ManifestError::Parse(_) | ManifestError::InvalidProfile(_) => {
                Kind::Validation
            }
            ManifestError::AliasCollision { .. } => Kind::Conflict,
            ManifestError::UnknownAgent(_) => Kind::NotFound,
            ManifestError::Io(_) => Kind::Fatal,
        }
    }
}

pub type ManifestResult<T> = Result<T, ManifestError>;

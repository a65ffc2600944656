use thiserror::Error;

use ploinky_core::{Kind, Kinded};

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("failed to read {kind} file at {path}: {source}")]
    Read {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("alias cycle detected resolving ${0}")]
    AliasCycle(String),

    #[error("missing required values: {0}")]
    MissingRequired(String),

    #[error("invalid wildcard pattern {0:?}: {1}")]
    BadPattern(String, regex::Error),
}

impl Kinded for EnvError {
    fn kind(&self) -> Kind {
        match self {
            EnvError::Read { .. } => Kind::Fatal,
            EnvError::AliasCycle(_) | EnvError::MissingRequired(_) | EnvError::BadPattern(..) => Kind::Validation,
        }
    }
}

pub type EnvResult<T> = Result<T, EnvError>;

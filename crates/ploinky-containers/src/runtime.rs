//! Probing for an available OCI-compatible container CLI.

use tracing::info;

use crate::error::{ContainerError, ContainerResult};

/// CLIs probed for, in order. The first one found on `PATH` is used for
/// the lifetime of the process.
pub const CANDIDATE_CLIS: &[&str] = &["docker", "podman", "nerdctl"];

/// A resolved OCI CLI binary.
#[derive(Debug, Clone)]
pub struct OciRuntime {
    pub binary: String,
}

impl OciRuntime {
    /// Probe `CANDIDATE_CLIS` in order; fail fast if none is present.
    pub fn detect() -> ContainerResult<Self> {
        for candidate in CANDIDATE_CLIS {
            if which::which(candidate).is_ok() {
                info!(runtime = %candidate, "detected container runtime");
                return Ok(Self { binary: (*candidate).to_string() });
            }
        }
        Err(ContainerError::RuntimeNotFound { tried: CANDIDATE_CLIS.join(", ") })
    }

    /// Build directly from a known binary name, bypassing detection (used
    /// in tests).
    #[must_use]
    pub fn from_binary(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

//! Workspace root discovery and the fixed directory skeleton.
//!
//! A workspace is a host directory containing the sentinel config
//! directory (`.ploinky`). All other paths the orchestrator writes to are
//! derived from the resolved root and are lexically rooted underneath it.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};

/// Name of the sentinel directory that marks a workspace root.
pub const SENTINEL_DIR: &str = ".ploinky";

/// An absolute, resolved workspace root.
///
/// Immutable for the lifetime of the process once constructed: the
/// orchestrator never re-resolves the root mid-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    /// Walk upward from `start_dir` until a directory containing
    /// [`SENTINEL_DIR`] is found. If none is found, `start_dir` itself
    /// becomes the root and is created.
    pub fn discover(start_dir: &Path) -> CoreResult<Self> {
        let start_dir = start_dir
            .canonicalize()
            .map_err(|source| CoreError::Io { path: start_dir.display().to_string(), source })?;

        let mut candidate = start_dir.as_path();
        loop {
            if candidate.join(SENTINEL_DIR).is_dir() {
                debug!(root = %candidate.display(), "resolved workspace root from sentinel");
                return Ok(Self { root: candidate.to_path_buf() });
            }
            match candidate.parent() {
                Some(parent) => candidate = parent,
                None => break,
            }
        }

        info!(root = %start_dir.display(), "no sentinel found; treating current directory as workspace root");
        Ok(Self { root: start_dir })
    }

    /// The absolute workspace root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Hidden config directory: `.ploinky/`.
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.root.join(SENTINEL_DIR)
    }

    /// Repositories directory: agent source trees live here.
    #[must_use]
    pub fn repos_dir(&self) -> PathBuf {
        self.config_dir().join("repos")
    }

    /// Running-PID bookkeeping directory.
    #[must_use]
    pub fn running_pid_dir(&self) -> PathBuf {
        self.config_dir().join("run")
    }

    /// Per-agent working-directory root.
    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    /// Code-symlink convenience root: `code/<agent>`.
    #[must_use]
    pub fn code_symlink_root(&self) -> PathBuf {
        self.root.join("code")
    }

    /// Skills-symlink convenience root: `skills/<agent>`.
    #[must_use]
    pub fn skills_symlink_root(&self) -> PathBuf {
        self.root.join("skills")
    }

    /// Shared data directory, mounted read-write into every container.
    #[must_use]
    pub fn shared_dir(&self) -> PathBuf {
        self.root.join("shared")
    }

    /// Logs directory.
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Path to the agent registry file.
    #[must_use]
    pub fn agent_registry_path(&self) -> PathBuf {
        self.config_dir().join("agents.json")
    }

    /// Path to the secrets file.
    #[must_use]
    pub fn secrets_path(&self) -> PathBuf {
        self.config_dir().join("secrets")
    }

    /// Path to the routing table.
    #[must_use]
    pub fn routing_table_path(&self) -> PathBuf {
        self.config_dir().join("routing.json")
    }

    /// Path to the active-profile marker file.
    #[must_use]
    pub fn active_profile_path(&self) -> PathBuf {
        self.config_dir().join("profile")
    }

    /// Path to the optional workspace `.env` file.
    #[must_use]
    pub fn dotenv_path(&self) -> PathBuf {
        self.root.join(".env")
    }

    /// Create the fixed directory skeleton idempotently.
    pub fn ensure_skeleton(&self) -> CoreResult<()> {
        for dir in [
            self.config_dir(),
            self.repos_dir(),
            self.running_pid_dir(),
            self.runtime_dir(),
            self.code_symlink_root(),
            self.skills_symlink_root(),
            self.shared_dir(),
            self.logs_dir(),
        ] {
            create_dir(&dir)?;
        }
        Ok(())
    }

    /// First six hex characters of the SHA-256 digest of the root path.
    #[must_use]
    pub fn hash6(&self) -> String {
        let digest = Sha256::digest(self.root.to_string_lossy().as_bytes());
        hex::encode(digest)[..6].to_string()
    }

    /// The sanitized basename used in the container naming formula: lowercase,
    /// non-alphanumeric runs collapsed to a single `_`.
    #[must_use]
    pub fn sanitized_basename(&self) -> String {
        sanitize(
            self.root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "workspace".to_string())
                .as_str(),
        )
    }

    /// Deterministic container name for an agent: `ploinky_<proj>_<hash6>_agent_<shortName>`.
    #[must_use]
    pub fn container_name(&self, short_name: &str) -> String {
        format!(
            "ploinky_{}_{}_agent_{}",
            self.sanitized_basename(),
            self.hash6(),
            short_name
        )
    }

    /// Create `code/<agent>` pointing at the agent source's `code/`
    /// subdirectory if present, else at the agent source root. Skips (with
    /// a log, not an error) if the target already exists as a real file or
    /// directory rather than a symlink.
    pub fn link_code(&self, agent_short_name: &str, agent_source_dir: &Path) -> CoreResult<PathBuf> {
        let candidate = agent_source_dir.join("code");
        let source = if candidate.is_dir() { candidate } else { agent_source_dir.to_path_buf() };
        let link = self.code_symlink_root().join(agent_short_name);
        ensure_symlink(&link, &source)?;
        resolve_real_path(&link)
    }

    /// Create `skills/<agent>` pointing at the agent's `.AchillesSkills/`
    /// directory, if present. No-op (returns `None`) when absent.
    pub fn link_skills(&self, agent_short_name: &str, agent_source_dir: &Path) -> CoreResult<Option<PathBuf>> {
        let source = agent_source_dir.join(".AchillesSkills");
        if !source.is_dir() {
            return Ok(None);
        }
        let link = self.skills_symlink_root().join(agent_short_name);
        ensure_symlink(&link, &source)?;
        Ok(Some(resolve_real_path(&link)?))
    }
}

fn create_dir(dir: &Path) -> CoreResult<()> {
    std::fs::create_dir_all(dir).map_err(|source| CoreError::Io { path: dir.display().to_string(), source })
}

/// Create `link -> target`, skipping if `link` already exists as a real
/// (non-symlink) file or directory: the occupying path is left in place and
/// no error is raised, since the caller can still resolve a real path from it.
fn ensure_symlink(link: &Path, target: &Path) -> CoreResult<()> {
    match std::fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            // Re-creating is cheap and keeps the link pointed at the
            // current source; drop and recreate.
            std::fs::remove_file(link).map_err(|source| CoreError::Io { path: link.display().to_string(), source })?;
        }
        Ok(_) => {
            warn!(link = %link.display(), "symlink target occupied by a real path; skipping");
            return Ok(());
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => return Err(CoreError::Io { path: link.display().to_string(), source }),
    }

    if let Some(parent) = link.parent() {
        create_dir(parent)?;
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(target, link)
        .map_err(|source| CoreError::Io { path: link.display().to_string(), source })?;
    #[cfg(not(unix))]
    std::fs::create_dir_all(link).map_err(|source| CoreError::Io { path: link.display().to_string(), source })?;

    Ok(())
}

/// Resolve a symlink (or plain path) to its real, canonicalized path.
///
/// Host link-following into containers is unreliable, so every path handed
/// to the Container Manager must already be the real path, never a link.
fn resolve_real_path(path: &Path) -> CoreResult<PathBuf> {
    std::fs::canonicalize(path).map_err(|source| CoreError::Io { path: path.display().to_string(), source })
}

fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discovers_current_dir_when_no_sentinel() {
        let dir = tempdir().unwrap();
        let root = WorkspaceRoot::discover(dir.path()).unwrap();
        assert_eq!(root.path(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn discovers_ancestor_sentinel() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(SENTINEL_DIR)).unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        let root = WorkspaceRoot::discover(&nested).unwrap();
        assert_eq!(root.path(), dir.path().canonicalize().unwrap());
    }

    #[test]
    fn container_name_matches_formula() {
        let dir = tempdir().unwrap();
        let root = WorkspaceRoot::discover(dir.path()).unwrap();
        let name = root.container_name("hello");
        assert!(name.starts_with("ploinky_"));
        assert!(name.ends_with("_agent_hello"));
        assert_eq!(name.matches('_').count() >= 3, true);
    }

    #[test]
    fn ensure_skeleton_is_idempotent() {
        let dir = tempdir().unwrap();
        let root = WorkspaceRoot::discover(dir.path()).unwrap();
        root.ensure_skeleton().unwrap();
        root.ensure_skeleton().unwrap();
        assert!(root.config_dir().is_dir());
        assert!(root.repos_dir().is_dir());
    }

    #[test]
    fn link_code_skips_real_directory() {
        let dir = tempdir().unwrap();
        let root = WorkspaceRoot::discover(dir.path()).unwrap();
        root.ensure_skeleton().unwrap();
        let occupied = root.code_symlink_root().join("hello");
        std::fs::create_dir_all(&occupied).unwrap();

        let source = tempdir().unwrap();
        let resolved = root.link_code("hello", source.path()).unwrap();
        assert_eq!(resolved, occupied.canonicalize().unwrap());
        assert!(!std::fs::symlink_metadata(&occupied).unwrap().file_type().is_symlink());
    }
}

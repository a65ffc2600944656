//! Dependency Preparer: merges a global dependency manifest with the
//! agent's own and stages the merged result in the agent's working
//! directory, plus the in-container install snippet.

#![deny(unsafe_code)]

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use ploinky_core::{Kind, Kinded};

#[derive(Debug, Error)]
pub enum DepsError {
    #[error("failed to read dependency manifest at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed dependency manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to write merged manifest at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl Kinded for DepsError {
    fn kind(&self) -> Kind {
        match self {
            DepsError::Read { .. } | DepsError::Write { .. } => Kind::Fatal,
            DepsError::Parse(_) => Kind::Validation,
        }
    }
}

pub type DepsResult<T> = Result<T, DepsError>;

/// A dependency manifest: package name -> version spec.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyManifest {
    #[serde(flatten)]
    pub dependencies: BTreeMap<String, String>,
}

impl DependencyManifest {
    pub fn load(path: &Path) -> DepsResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|source| DepsError::Read { path: path.display().to_string(), source })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Merge the global and agent-local manifests; agent entries win on
/// version conflicts.
#[must_use]
pub fn merge(global: &DependencyManifest, agent: &DependencyManifest) -> DependencyManifest {
    let mut merged = global.dependencies.clone();
    for (name, version) in &agent.dependencies {
        merged.insert(name.clone(), version.clone());
    }
    DependencyManifest { dependencies: merged }
}

/// Stage the merged manifest in the agent's working directory.
pub fn stage(working_dir: &Path, merged: &DependencyManifest) -> DepsResult<std::path::PathBuf> {
    std::fs::create_dir_all(working_dir)
        .map_err(|source| DepsError::Write { path: working_dir.display().to_string(), source })?;
    let path = working_dir.join("dependencies.json");
    let json = serde_json::to_string_pretty(merged)?;
    std::fs::write(&path, json).map_err(|source| DepsError::Write { path: path.display().to_string(), source })?;
    debug!(path = %path.display(), count = merged.dependencies.len(), "staged merged dependency manifest");
    Ok(path)
}

/// Shell snippet that, when run as part of the container entrypoint,
/// ensures `git` and a C toolchain exist (whichever package manager is
/// present) and performs an install step anchored at the agent working
/// directory.
#[must_use]
pub fn install_snippet(working_dir: &Path) -> String {
    let wd = working_dir.display();
    format!(
        "if command -v apt-get >/dev/null 2>&1; then apt-get update -qq && apt-get install -y -qq git build-essential >/dev/null 2>&1 || true; \
elif command -v apk >/dev/null 2>&1; then apk add --no-cache git build-base >/dev/null 2>&1 || true; \
elif command -v dnf >/dev/null 2>&1; then dnf install -y git gcc gcc-c++ make >/dev/null 2>&1 || true; fi; \
cd {wd} && if [ -f package.json ]; then npm install --no-audit --no-fund; fi"
    )
}

/// Concatenate the install snippet with the manifest's own `install`
/// command, eliding whichever piece is empty.
#[must_use]
pub fn concat_install(snippet: &str, manifest_install: Option<&str>) -> String {
    match manifest_install {
        Some(cmd) if !cmd.trim().is_empty() => format!("{snippet} && {cmd}"),
        _ => snippet.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn agent_entries_win_on_conflict() {
        let mut global = DependencyManifest::default();
        global.dependencies.insert("left-pad".into(), "1.0.0".into());
        global.dependencies.insert("shared".into(), "1.0.0".into());

        let mut agent = DependencyManifest::default();
        agent.dependencies.insert("shared".into(), "2.0.0".into());

        let merged = merge(&global, &agent);
        assert_eq!(merged.dependencies.get("left-pad"), Some(&"1.0.0".to_string()));
        assert_eq!(merged.dependencies.get("shared"), Some(&"2.0.0".to_string()));
    }

    #[test]
    fn stages_merged_manifest_to_disk() {
        let dir = tempdir().unwrap();
        let merged = DependencyManifest::default();
        let path = stage(dir.path(), &merged).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn concat_elides_empty_pieces() {
        let snippet = "echo prepare";
        assert_eq!(concat_install(snippet, None), "echo prepare");
        assert_eq!(concat_install(snippet, Some("npm run build")), "echo prepare && npm run build");
    }
}

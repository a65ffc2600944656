//! Optional TOML process configuration, layered beneath CLI flags and env
//! vars: lets an agent pin its port and task-queue settings without
//! repeating them on every container's entrypoint command line.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentFileConfig {
    pub port: Option<u16>,
    pub max_concurrent: Option<usize>,
    pub task_snapshot: Option<PathBuf>,
}

impl AgentFileConfig {
    /// Load from `path`; a missing file is not an error, it just yields the
    /// all-`None` default so every setting falls through to CLI/env.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentFileConfig::load(&dir.path().join("agent.toml")).unwrap();
        assert_eq!(config.port, None);
    }

    #[test]
    fn parses_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, "port = 7001\nmax_concurrent = 8\n").unwrap();
        let config = AgentFileConfig::load(&path).unwrap();
        assert_eq!(config.port, Some(7001));
        assert_eq!(config.max_concurrent, Some(8));
        assert_eq!(config.task_snapshot, None);
    }
}

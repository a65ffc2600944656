//! The agent registry: one [`AgentRecord`] per enabled agent, persisted as
//! a single JSON file under the workspace's hidden config directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ManifestError, ManifestResult};
use crate::manifest::Profile;

/// One enabled agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRecord {
    pub short_name: String,
    pub repo_name: String,
    pub alias: Option<String>,
    pub container_name: String,
    pub container_image: String,
    pub project_path: PathBuf,
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
    /// Resolved mount spec (host/container path pairs with modes), opaque
    /// to the registry — the Container Manager is what interprets it.
    pub mount_spec: serde_json::Value,
    /// Resolved env spec (`-e NAME=VALUE` pairs), opaque to the registry.
    pub env_spec: serde_json::Value,
}

/// `listAgents()` summary shape.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub name: String,
    pub repo: String,
    pub enabled: bool,
}

/// The full set of enabled agents, keyed by `shortName`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRegistry {
    agents: HashMap<String, AgentRecord>,
}

impl AgentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the registry from disk, or an empty registry if the file does
    /// not yet exist.
    pub fn load(path: &Path) -> ManifestResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Persist the registry atomically: write to a sibling temp file, then
    /// rename over the target, so a crash never leaves a half-written
    /// registry on disk.
    pub fn save(&self, path: &Path) -> ManifestResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Register a new agent. Enforces alias uniqueness (invariant ii).
    pub fn register(&mut self, record: AgentRecord) -> ManifestResult<()> {
        if let Some(alias) = &record.alias {
            if let Some(existing) = self.agents.values().find(|a| a.alias.as_deref() == Some(alias.as_str())) {
                return Err(ManifestError::AliasCollision {
                    alias: alias.clone(),
                    existing: existing.short_name.clone(),
                });
            }
        }
        info!(short_name = %record.short_name, container = %record.container_name, "registered agent");
        self.agents.insert(record.short_name.clone(), record);
        Ok(())
    }

    /// Remove an agent record. Callers are responsible for the invariant
    /// that this is only done when no corresponding container exists.
    pub fn remove(&mut self, short_name: &str) -> ManifestResult<AgentRecord> {
        self.agents.remove(short_name).ok_or_else(|| ManifestError::UnknownAgent(short_name.to_string()))
    }

    #[must_use]
    pub fn get(&self, short_name: &str) -> Option<&AgentRecord> {
        self.agents.get(short_name)
    }

    #[must_use]
    pub fn list(&self) -> Vec<AgentSummary> {
        let mut summaries: Vec<AgentSummary> = self
            .agents
            .values()
            .map(|a| AgentSummary { name: a.short_name.clone(), repo: a.repo_name.clone(), enabled: true })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    #[must_use]
    pub fn records(&self) -> Vec<&AgentRecord> {
        self.agents.values().collect()
    }

    #[must_use]
    pub fn resolve_alias(&self, alias_or_name: &str) -> Option<&AgentRecord> {
        self.agents
            .get(alias_or_name)
            .or_else(|| self.agents.values().find(|a| a.alias.as_deref() == Some(alias_or_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(short_name: &str, alias: Option<&str>) -> AgentRecord {
        AgentRecord {
            short_name: short_name.into(),
            repo_name: "demo".into(),
            alias: alias.map(str::to_string),
            container_name: format!("ploinky_demo_abcdef_agent_{short_name}"),
            container_image: "alpine:3".into(),
            project_path: PathBuf::from("/tmp/demo"),
            profile: Profile::Dev,
            created_at: Utc::now(),
            mount_spec: serde_json::json!([]),
            env_spec: serde_json::json!([]),
        }
    }

    #[test]
    fn enable_creates_single_registry_record() {
        let mut registry = AgentRegistry::new();
        registry.register(record("hello", None)).unwrap();

        let records = registry.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].short_name, "hello");
        assert_eq!(records[0].repo_name, "demo");
        assert_eq!(records[0].profile, Profile::Dev);

        let summaries = registry.list();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "hello");
        assert_eq!(summaries[0].repo, "demo");
        assert!(summaries[0].enabled);
    }

    #[test]
    fn rejects_duplicate_alias() {
        let mut registry = AgentRegistry::new();
        registry.register(record("a", Some("shared"))).unwrap();
        let err = registry.register(record("b", Some("shared"))).unwrap_err();
        assert!(matches!(err, ManifestError::AliasCollision { .. }));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("agents.json");

        let mut registry = AgentRegistry::new();
        registry.register(record("hello", None)).unwrap();
        registry.save(&path).unwrap();

        let loaded = AgentRegistry::load(&path).unwrap();
        assert_eq!(loaded.get("hello"), registry.get("hello"));
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let dir = tempdir().unwrap();
        let registry = AgentRegistry::load(&dir.path().join("missing.json")).unwrap();
        assert!(registry.records().is_empty());
    }
}

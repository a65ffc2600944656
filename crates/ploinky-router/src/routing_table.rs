//! The routing table: one [`Route`] per running agent, written by the CLI
//! lifecycle (component F) before the router starts and read by the router
//! at startup and on each reload.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RouterResult;

/// Entry in the routing table for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub agent: String,
    pub container_name: String,
    pub host_port: u16,
    /// Source directory served at `/<agent>/...` when this agent also has a
    /// static frontend; absent for pure MCP agents.
    #[serde(default)]
    pub host_source_path: Option<String>,
    pub profile: String,
    pub mcp_endpoint: String,
}

impl Route {
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.host_port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingTable {
    routes: HashMap<String, Route>,
    /// At most one agent is the static agent; its source directory is
    /// served at the router root for any path not claimed by another rule.
    #[serde(default)]
    static_agent: Option<String>,
}

impl RoutingTable {
    pub fn load(path: &Path) -> RouterResult<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> RouterResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn upsert(&mut self, route: Route) {
        self.routes.insert(route.agent.clone(), route);
    }

    pub fn remove(&mut self, agent: &str) {
        self.routes.remove(agent);
        if self.static_agent.as_deref() == Some(agent) {
            self.static_agent = None;
        }
    }

    #[must_use]
    pub fn get(&self, agent: &str) -> Option<&Route> {
        self.routes.get(agent)
    }

    #[must_use]
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    #[must_use]
    pub fn agent_names(&self) -> Vec<String> {
        self.routes.keys().cloned().collect()
    }

    pub fn set_static_agent(&mut self, agent: Option<String>) {
        self.static_agent = agent;
    }

    #[must_use]
    pub fn static_route(&self) -> Option<&Route> {
        self.static_agent.as_deref().and_then(|name| self.routes.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(agent: &str, port: u16) -> Route {
        Route {
            agent: agent.to_string(),
            container_name: format!("ploinky_demo_abc123_agent_{agent}"),
            host_port: port,
            host_source_path: None,
            profile: "dev".to_string(),
            mcp_endpoint: format!("http://127.0.0.1:{port}/mcp"),
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routing.json");

        let mut table = RoutingTable::default();
        table.upsert(route("alpha", 9001));
        table.set_static_agent(Some("alpha".to_string()));
        table.save(&path).unwrap();

        let loaded = RoutingTable::load(&path).unwrap();
        assert_eq!(loaded.get("alpha").unwrap().host_port, 9001);
        assert_eq!(loaded.static_route().unwrap().agent, "alpha");
    }

    #[test]
    fn missing_file_yields_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = RoutingTable::load(&dir.path().join("missing.json")).unwrap();
        assert!(table.agent_names().is_empty());
    }

    #[test]
    fn remove_clears_static_agent_reference() {
        let mut table = RoutingTable::default();
        table.upsert(route("alpha", 9001));
        table.set_static_agent(Some("alpha".to_string()));
        table.remove("alpha");
        assert!(table.static_route().is_none());
    }
}

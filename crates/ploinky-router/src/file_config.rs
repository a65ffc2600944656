//! Optional TOML process configuration, layered beneath CLI flags and env
//! vars: a file at the workspace root can pin bind address, port, and OAuth
//! settings so they don't need to be repeated on every invocation.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterFileConfig {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub oauth_issuer: Option<String>,
    pub oauth_audience: Option<String>,
    pub oauth_token_endpoint: Option<String>,
    pub oauth_jwks_uri: Option<String>,
}

impl RouterFileConfig {
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
        let config = RouterFileConfig::load(&dir.path().join("router.toml")).unwrap();
        assert_eq!(config.port, None);
    }

    #[test]
    fn parses_partial_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.toml");
        std::fs::write(&path, "port = 9090\nbind = \"127.0.0.1\"\n").unwrap();
        let config = RouterFileConfig::load(&path).unwrap();
        assert_eq!(config.port, Some(9090));
        assert_eq!(config.bind.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.oauth_issuer, None);
    }
}

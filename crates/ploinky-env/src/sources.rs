//! The combined env/secret source set and `$ALIAS` indirection.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{EnvError, EnvResult};
use crate::secrets_file::parse_kv_file;

/// The three sources consulted, in resolution order, for any name:
/// (1) the workspace secret file, (2) the process environment, (3) the
/// workspace `.env` file.
#[derive(Debug, Clone, Default)]
pub struct EnvSources {
    secrets: HashMap<String, String>,
    process_env: HashMap<String, String>,
    dotenv: HashMap<String, String>,
}

impl EnvSources {
    pub fn load(secrets_path: &Path, dotenv_path: &Path) -> EnvResult<Self> {
        let secrets = parse_kv_file(secrets_path, "secrets")?;
        let dotenv = parse_kv_file(dotenv_path, "dotenv")?;
        let process_env = std::env::vars().collect();
        Ok(Self { secrets, process_env, dotenv })
    }

    /// Build directly from in-memory maps (used by tests and by test
    /// fixtures that pin down the process environment explicitly).
    #[must_use]
    pub fn from_parts(
        secrets: HashMap<String, String>,
        process_env: HashMap<String, String>,
        dotenv: HashMap<String, String>,
    ) -> Self {
        Self { secrets, process_env, dotenv }
    }

    /// Resolve a bare name against the three sources in order, without
    /// following `$ALIAS` indirection.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<String> {
        self.secrets.get(name).or_else(|| self.process_env.get(name)).or_else(|| self.dotenv.get(name)).cloned()
    }

    /// The union of every name known across all three sources — the
    /// "combined source set" that wildcard expansion enumerates against.
    #[must_use]
    pub fn combined_keys(&self) -> HashSet<String> {
        self.secrets.keys().chain(self.process_env.keys()).chain(self.dotenv.keys()).cloned().collect()
    }

    /// Resolve `name`, following `$ALIAS` chains with cycle detection, then
    /// falling back to `default` if the chain bottoms out unresolved.
    pub fn resolve(&self, name: &str, default: Option<&str>) -> EnvResult<Option<String>> {
        let mut visited = HashSet::new();
        let mut current = name.to_string();
        loop {
            if !visited.insert(current.clone()) {
                return Err(EnvError::AliasCycle(name.to_string()));
            }
            match self.lookup(&current) {
                Some(value) => {
                    if let Some(alias) = value.strip_prefix('$') {
                        current = alias.to_string();
                        continue;
                    }
                    return Ok(Some(value));
                }
                None => return Ok(default.map(str::to_string)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources_with_secrets(pairs: &[(&str, &str)]) -> EnvSources {
        let secrets = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        EnvSources::from_parts(secrets, HashMap::new(), HashMap::new())
    }

    #[test]
    fn follows_alias_chain() {
        let sources = sources_with_secrets(&[("A", "$B"), ("B", "$C"), ("C", "literal")]);
        assert_eq!(sources.resolve("A", None).unwrap(), Some("literal".to_string()));
    }

    #[test]
    fn detects_alias_cycle() {
        let sources = sources_with_secrets(&[("A", "$B"), ("B", "$A")]);
        let err = sources.resolve("A", None).unwrap_err();
        assert!(matches!(err, EnvError::AliasCycle(_)));
    }

    #[test]
    fn falls_back_to_default_when_unresolved() {
        let sources = EnvSources::default();
        assert_eq!(sources.resolve("MISSING", Some("fallback")).unwrap(), Some("fallback".to_string()));
        assert_eq!(sources.resolve("MISSING", None).unwrap(), None);
    }
}

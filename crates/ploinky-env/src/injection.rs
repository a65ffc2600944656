//! Produces the final `-e NAME=VALUE` flag list for a container, combining
//! explicit entries, wildcard expansion, alias resolution, and the
//! blocked-name safety net.

use std::collections::HashSet;

use ploinky_core::is_blocked_spawn_env;
use ploinky_manifest::EnvSpec;

use crate::error::{EnvError, EnvResult};
use crate::sources::EnvSources;
use crate::wildcard::expand;

/// A single parsed `env` list entry.
enum Entry {
    /// A bare name with no default: required unless resolvable.
    Required(String),
    /// `NAME=default` literal.
    WithDefault(String, String),
    /// A pattern containing `*`.
    Wildcard(String),
}

fn parse_entry(raw: &str) -> Entry {
    if raw.contains('*') {
        return Entry::Wildcard(raw.to_string());
    }
    match raw.split_once('=') {
        Some((name, default)) => Entry::WithDefault(name.to_string(), default.to_string()),
        None => Entry::Required(raw.to_string()),
    }
}

/// Resolve `env_spec` against `sources`, returning the final, sorted,
/// deduplicated `(name, value)` injection list.
///
/// Explicit (non-wildcard) entries always win over any wildcard match for
/// the same name, including suppressing the bare `*` catch-all's API-key
/// exclusion for that one name (per the resolved Open Question in
/// `DESIGN.md`).
pub fn resolve_injection(env_spec: &EnvSpec, sources: &EnvSources) -> EnvResult<Vec<(String, String)>> {
    let entries: Vec<Entry> = match env_spec {
        EnvSpec::List(list) => list.iter().map(|raw| parse_entry(raw)).collect(),
        EnvSpec::Map(map) => map.iter().map(|(k, v)| Entry::WithDefault(k.clone(), v.clone())).collect(),
    };

    let explicit_names: HashSet<String> = entries
        .iter()
        .filter_map(|e| match e {
            Entry::Required(name) | Entry::WithDefault(name, _) => Some(name.clone()),
            Entry::Wildcard(_) => None,
        })
        .collect();

    let combined_keys = sources.combined_keys();

    let mut missing = Vec::new();
    let mut resolved: Vec<(String, String)> = Vec::new();

    for entry in &entries {
        match entry {
            Entry::Required(name) => match sources.resolve(name, None)? {
                Some(value) => resolved.push((name.clone(), value)),
                None => missing.push(name.clone()),
            },
            Entry::WithDefault(name, default) => match sources.resolve(name, Some(default))? {
                Some(value) => resolved.push((name.clone(), value)),
                None => missing.push(name.clone()),
            },
            Entry::Wildcard(pattern) => {
                for name in expand(pattern, &combined_keys, &explicit_names)? {
                    if let Some(value) = sources.resolve(&name, None)? {
                        resolved.push((name, value));
                    }
                }
            }
        }
    }

    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(EnvError::MissingRequired(missing.join(", ")));
    }

    resolved.retain(|(name, _)| !is_blocked_spawn_env(name));
    resolved.sort_by(|a, b| a.0.cmp(&b.0));
    resolved.dedup_by(|a, b| a.0 == b.0);

    Ok(resolved)
}

/// Render `(name, value)` pairs as `-e NAME=VALUE` shell-ready flag pairs,
/// shell-escaping values that contain whitespace or shell metacharacters.
#[must_use]
pub fn to_flag_pairs(pairs: &[(String, String)]) -> Vec<String> {
    pairs
        .iter()
        .flat_map(|(name, value)| ["-e".to_string(), format!("{name}={}", shell_escape(value))])
        .collect()
}

fn shell_escape(value: &str) -> String {
    let needs_escaping = value.chars().any(|c| c.is_whitespace() || "\"'$`\\!*?[]{}()|&;<>~".contains(c));
    if !needs_escaping {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sources_with_env(pairs: &[(&str, &str)]) -> EnvSources {
        let process_env = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        EnvSources::from_parts(HashMap::new(), process_env, HashMap::new())
    }

    #[test]
    fn wildcard_and_explicit_env_resolve_end_to_end() {
        let sources = sources_with_env(&[
            ("LLM_MODEL_01", "m1"),
            ("LLM_MODEL_02", "m2"),
            ("OPENAI_API_KEY", "sk"),
            ("DB_URL", "postgres://h"),
        ]);
        let spec = EnvSpec::List(vec!["LLM_MODEL_*".into(), "*".into(), "OPENAI_API_KEY".into()]);

        let resolved = resolve_injection(&spec, &sources).unwrap();
        let names: HashSet<String> = resolved.into_iter().map(|(n, _)| n).collect();

        let expected: HashSet<String> =
            ["LLM_MODEL_01", "LLM_MODEL_02", "DB_URL", "OPENAI_API_KEY"].iter().map(|s| s.to_string()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn missing_required_aggregates_all_names() {
        let sources = EnvSources::default();
        let spec = EnvSpec::List(vec!["ONE".into(), "TWO".into()]);
        let err = resolve_injection(&spec, &sources).unwrap_err();
        match err {
            EnvError::MissingRequired(msg) => {
                assert!(msg.contains("ONE"));
                assert!(msg.contains("TWO"));
            }
            other => panic!("expected MissingRequired, got {other:?}"),
        }
    }

    #[test]
    fn shell_escapes_values_with_whitespace() {
        let pairs = vec![("GREETING".to_string(), "hello world".to_string())];
        let flags = to_flag_pairs(&pairs);
        assert_eq!(flags, vec!["-e".to_string(), "GREETING='hello world'".to_string()]);
    }
}

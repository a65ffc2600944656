//! Wildcard env-name pattern expansion, with the `*` catch-all's API-key
//! exclusion rule.

use std::collections::HashSet;

use regex::Regex;

use crate::error::{EnvError, EnvResult};

/// Convert a manifest wildcard pattern (`*` -> `[^\s]*`, everything else
/// escaped and matched literally) into a compiled, fully-anchored regex.
pub fn pattern_regex(pattern: &str) -> EnvResult<Regex> {
    let mut out = String::from("^");
    for part in pattern.split('*') {
        out.push_str(&regex::escape(part));
        out.push_str("(?:[^\\s]*)");
    }
    // split('*') leaves one trailing "(?:[^\s]*)" too many; trim it back off
    // since the last segment after the final '*' should not get its own
    // wildcard unless the pattern actually ends in '*'.
    if !pattern.ends_with('*') {
        out.truncate(out.len() - "(?:[^\\s]*)".len());
    }
    out.push('$');
    Regex::new(&out).map_err(|e| EnvError::BadPattern(pattern.to_string(), e))
}

/// Whether `name` contains, case-insensitively, `API_KEY` or `APIKEY`.
#[must_use]
pub fn is_api_key_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    upper.contains("API_KEY") || upper.contains("APIKEY")
}

/// Expand a wildcard `pattern` against `combined_keys`, applying the bare
/// `*` API-key exclusion unless the matched name also appears in
/// `explicit_names` (which always wins).
pub fn expand(pattern: &str, combined_keys: &HashSet<String>, explicit_names: &HashSet<String>) -> EnvResult<Vec<String>> {
    let regex = pattern_regex(pattern)?;
    let is_bare_catch_all = pattern == "*";

    let mut matches: Vec<String> = combined_keys
        .iter()
        .filter(|name| regex.is_match(name))
        .filter(|name| {
            !(is_bare_catch_all && is_api_key_name(name) && !explicit_names.contains(name.as_str()))
        })
        .cloned()
        .collect();

    matches.sort();
    matches.dedup();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn wildcard_excludes_api_keys_unless_explicit() {
        let combined = keys(&["LLM_MODEL_01", "LLM_MODEL_02", "OPENAI_API_KEY", "DB_URL"]);
        let explicit = keys(&["OPENAI_API_KEY"]);

        let mut result: Vec<String> = Vec::new();
        result.extend(expand("LLM_MODEL_*", &combined, &explicit).unwrap());
        result.extend(expand("*", &combined, &explicit).unwrap());
        result.push("OPENAI_API_KEY".to_string());
        result.sort();
        result.dedup();

        let mut expected =
            vec!["LLM_MODEL_01".to_string(), "LLM_MODEL_02".to_string(), "DB_URL".to_string(), "OPENAI_API_KEY".to_string()];
        expected.sort();
        assert_eq!(result, expected);
    }

    #[test]
    fn bare_star_excludes_api_keys_unless_explicit() {
        let combined = keys(&["OPENAI_API_KEY", "DB_URL"]);
        let none_explicit = HashSet::new();
        let matches = expand("*", &combined, &none_explicit).unwrap();
        assert_eq!(matches, vec!["DB_URL".to_string()]);

        let with_explicit = keys(&["OPENAI_API_KEY"]);
        let matches = expand("*", &combined, &with_explicit).unwrap();
        assert!(matches.contains(&"OPENAI_API_KEY".to_string()));
    }
}

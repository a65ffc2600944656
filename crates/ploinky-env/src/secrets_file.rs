//! Parsing for the workspace secrets file and the optional `.env` file:
//! lines of `KEY=VALUE`, `#` comments, optional single or double quoting.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{EnvError, EnvResult};

/// Parse a `KEY=VALUE` file, stripping `#` comment lines and surrounding
/// quotes from values. Returns an empty map if the file does not exist.
pub fn parse_kv_file(path: &Path, kind: &'static str) -> EnvResult<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|source| EnvError::Read { kind, path: path.display().to_string(), source })?;
    Ok(parse_kv_str(&text))
}

/// Parse KV-file contents directly (used by tests and by callers that
/// already have the text in hand).
#[must_use]
pub fn parse_kv_str(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        let key = key.trim().to_string();
        let value = strip_quotes(value.trim());
        map.insert(key, value);
    }
    map
}

fn strip_quotes(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_quoted_values() {
        let text = "# a comment\nFOO=bar\nBAZ=\"quoted value\"\nQUX='single quoted'\n\nEMPTY_LINE_ABOVE=1";
        let map = parse_kv_str(text);
        assert_eq!(map.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(map.get("BAZ"), Some(&"quoted value".to_string()));
        assert_eq!(map.get("QUX"), Some(&"single quoted".to_string()));
        assert_eq!(map.get("EMPTY_LINE_ABOVE"), Some(&"1".to_string()));
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let map = parse_kv_str("# just a comment\n\n");
        assert!(map.is_empty());
    }
}

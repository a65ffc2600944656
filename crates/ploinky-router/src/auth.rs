//! The web-UI authentication gate: a `?token=` query parameter checked
//! against a 64-char hex token kept per-component in the secrets file.
//! Absence of a stored token auto-generates one on first use; rotation
//! replaces it.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::RouterResult;

/// Components gated behind a per-component token.
pub const WEBTTY: &str = "WEBTTY_TOKEN";
pub const WEBCHAT: &str = "WEBCHAT_TOKEN";
pub const DASHBOARD: &str = "DASHBOARD_TOKEN";
pub const WEBMEET: &str = "WEBMEET_TOKEN";

/// Generate a fresh 64-char hex token by hashing a random `Uuid` twice (no
/// external RNG crate needed beyond what's already pulled in for ids).
#[must_use]
pub fn generate_token() -> String {
    let mut hasher = Sha256::new();
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    let first = hasher.finalize();
    let mut hasher = Sha256::new();
    hasher.update(first);
    let second = hasher.finalize();
    format!("{}{}", hex::encode(first), hex::encode(second))[..64].to_string()
}

/// Load the token for `component` from the secrets file, generating and
/// persisting a fresh one if absent.
pub fn ensure_token(path: &Path, component: &'static str) -> RouterResult<String> {
    let mut secrets = ploinky_env::parse_kv_file(path, "secrets").map_err(|_| crate::error::RouterError::Unauthorized)?;
    if let Some(existing) = secrets.get(component) {
        return Ok(existing.clone());
    }
    let token = generate_token();
    secrets.insert(component.to_string(), token.clone());
    write_secrets(path, &secrets)?;
    Ok(token)
}

/// Rotate the token for `component`, replacing whatever was stored.
pub fn rotate_token(path: &Path, component: &'static str) -> RouterResult<String> {
    let mut secrets = ploinky_env::parse_kv_file(path, "secrets").map_err(|_| crate::error::RouterError::Unauthorized)?;
    let token = generate_token();
    secrets.insert(component.to_string(), token.clone());
    write_secrets(path, &secrets)?;
    Ok(token)
}

fn write_secrets(path: &Path, secrets: &std::collections::HashMap<String, String>) -> RouterResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut body = String::new();
    for (key, value) in secrets {
        body.push_str(&format!("{key}={value}\n"));
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Constant-time comparison so response latency doesn't leak how many
/// leading bytes of a guessed token matched.
#[must_use]
pub fn token_matches(stored: &str, provided: &str) -> bool {
    let stored = stored.as_bytes();
    let provided = provided.as_bytes();
    if stored.len() != provided.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in stored.iter().zip(provided.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ensure_token_persists_and_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.env");
        let first = ensure_token(&path, WEBTTY).unwrap();
        let second = ensure_token(&path, WEBTTY).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rotate_token_changes_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.env");
        let first = ensure_token(&path, WEBCHAT).unwrap();
        let second = rotate_token(&path, WEBCHAT).unwrap();
        assert_ne!(first, second);
    }
}

//! Names that must never be forwarded into a container's environment,
//! independent of whether the manifest or a wildcard pattern asked for
//! them.
//!
//! This is a safety net underneath the Env & Secrets wildcard/API-key-
//! exclusion rule, not a replacement for it: it only stops a degenerate
//! case (a manifest explicitly or accidentally requesting one of the
//! supervisor's own process-control variables) that the wildcard rule does
//! not otherwise forbid.

const BLOCKED_SPAWN_ENV: &[&str] = &["LD_PRELOAD", "LD_LIBRARY_PATH", "DYLD_INSERT_LIBRARIES"];

const BLOCKED_PREFIXES: &[&str] = &["PLOINKY_INTERNAL_"];

/// Whether `key` must never be injected into a spawned container's
/// environment.
#[must_use]
pub fn is_blocked_spawn_env(key: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    BLOCKED_SPAWN_ENV.iter().any(|blocked| *blocked == upper)
        || BLOCKED_PREFIXES.iter().any(|prefix| upper.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_matches_are_blocked() {
        assert!(is_blocked_spawn_env("LD_PRELOAD"));
        assert!(is_blocked_spawn_env("ld_preload"));
    }

    #[test]
    fn prefix_blocking() {
        assert!(is_blocked_spawn_env("PLOINKY_INTERNAL_SECRET"));
    }

    #[test]
    fn safe_vars_are_allowed() {
        assert!(!is_blocked_spawn_env("DB_URL"));
        assert!(!is_blocked_spawn_env("OPENAI_API_KEY"));
    }
}

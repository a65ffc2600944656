//! The agent manifest: a declarative JSON document co-located with agent
//! source, plus the profile overlay model.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ManifestError, ManifestResult};

/// A command specification: either a single string or an ordered list of
/// strings (`preinstall`/`install`/`postinstall` may be either).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum CommandSpec {
    Single(String),
    Many(Vec<String>),
}

impl CommandSpec {
    /// The individual commands in execution order.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        match self {
            CommandSpec::Single(s) => vec![s.clone()],
            CommandSpec::Many(v) => v.clone(),
        }
    }
}

/// `env` may be a list (required names, `NAME=default` literals, or
/// wildcard patterns) or a map (name -> default).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EnvSpec {
    List(Vec<String>),
    Map(HashMap<String, String>),
}

/// A single liveness/readiness probe definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeSpec {
    pub script: String,
    #[serde(default = "default_interval_secs")]
    pub interval: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
    #[serde(default = "default_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_threshold")]
    pub success_threshold: u32,
}

fn default_interval_secs() -> u64 {
    10
}
fn default_timeout_secs() -> u64 {
    5
}
fn default_threshold() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthBlock {
    pub liveness: Option<ProbeSpec>,
    pub readiness: Option<ProbeSpec>,
}

/// Extra host -> container volume mount pairs from `manifest.volumes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeSpec {
    pub host: String,
    pub container: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Profile-specific mount mode overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountsOverlay {
    pub code: Option<MountMode>,
    pub skills: Option<MountMode>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MountMode {
    Rw,
    Ro,
}

/// A per-profile overlay. When present for the active profile, `env`
/// *replaces* the manifest's top-level `env`; hooks are *augmented*
/// (merged on top of, not instead of, the base hooks).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileOverlay {
    pub env: Option<EnvSpec>,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub mounts: MountsOverlay,
    pub preinstall: Option<CommandSpec>,
    pub install: Option<CommandSpec>,
    pub postinstall: Option<CommandSpec>,
    /// `hosthook_*` entries, keyed by the full hook name.
    #[serde(flatten)]
    pub host_hooks: HashMap<String, CommandSpec>,
}

/// The closed profile set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Dev,
    Qa,
    Prod,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Dev, Profile::Qa, Profile::Prod];

    /// Default mount modes for this profile when no overlay overrides them:
    /// `dev` is writable both ways, `qa`/`prod` are read-only.
    #[must_use]
    pub fn default_mount_mode(self) -> MountMode {
        match self {
            Profile::Dev => MountMode::Rw,
            Profile::Qa | Profile::Prod => MountMode::Ro,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Profile::Dev => "dev",
            Profile::Qa => "qa",
            Profile::Prod => "prod",
        }
    }

    pub fn parse(name: &str) -> ManifestResult<Self> {
        match name {
            "dev" => Ok(Profile::Dev),
            "qa" => Ok(Profile::Qa),
            "prod" => Ok(Profile::Prod),
            other => Err(ManifestError::InvalidProfile(other.to_string())),
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Profile::Dev
    }
}

/// The full set of recognized manifest keys. Unknown keys are preserved
/// verbatim (via `extra`) but ignored by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub container: Option<String>,
    pub preinstall: Option<CommandSpec>,
    pub install: Option<CommandSpec>,
    pub postinstall: Option<CommandSpec>,
    pub update: Option<CommandSpec>,
    pub cli: Option<String>,
    pub start: Option<String>,
    pub agent: Option<String>,
    pub about: Option<String>,
    pub env: Option<EnvSpec>,
    #[serde(default)]
    pub enable: Vec<String>,
    #[serde(default)]
    pub repos: HashMap<String, String>,
    pub health: Option<HealthBlock>,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverlay>,
    pub default_profile: Option<String>,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,

    /// Unknown keys, preserved verbatim for forward compatibility.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    pub fn load(path: &Path) -> ManifestResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ManifestError::Read { path: path.display().to_string(), source })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The profile to use when none is explicitly active: `defaultProfile`
    /// if set and valid, else `dev`.
    pub fn default_profile(&self) -> ManifestResult<Profile> {
        match &self.default_profile {
            Some(name) => Profile::parse(name),
            None => Ok(Profile::Dev),
        }
    }
}

/// The resolved view of a manifest for one active profile: overlay applied
/// (env replaces, hooks augment).
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    pub profile: Profile,
    pub env: Option<EnvSpec>,
    pub preinstall: Option<CommandSpec>,
    pub install: Option<CommandSpec>,
    pub postinstall: Option<CommandSpec>,
    pub mounts: MountsOverlay,
    pub host_hooks: HashMap<String, CommandSpec>,
}

/// Apply the overlay for `profile`, if one exists, to `manifest`.
#[must_use]
pub fn resolve_profile(manifest: &Manifest, profile: Profile) -> ResolvedManifest {
    let overlay = manifest.profiles.get(profile.as_str());

    let env = overlay.and_then(|o| o.env.clone()).or_else(|| manifest.env.clone());

    // Hooks augment: the overlay's hook, if set, wins for that specific
    // lifecycle slot; otherwise fall back to the manifest's base hook.
    let preinstall = overlay.and_then(|o| o.preinstall.clone()).or_else(|| manifest.preinstall.clone());
    let install = overlay.and_then(|o| o.install.clone()).or_else(|| manifest.install.clone());
    let postinstall = overlay.and_then(|o| o.postinstall.clone()).or_else(|| manifest.postinstall.clone());

    let mounts = overlay.map(|o| o.mounts.clone()).unwrap_or_default();
    let host_hooks = overlay.map(|o| o.host_hooks.clone()).unwrap_or_default();

    ResolvedManifest { profile, env, preinstall, install, postinstall, mounts, host_hooks }
}

/// The container's effective main-process command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectiveCommand {
    /// `start` is the main process; `sidecar` is the `agent` command run
    /// alongside it (via the first available shell), if `agent` was also
    /// set.
    Start { main: String, sidecar: Option<String> },
    /// `agent` runs as the main process (no `start` was set).
    Agent(String),
    /// Neither `start` nor `agent` was set: fall back to the default
    /// supervisor shell wrapper.
    DefaultSupervisor,
}

/// Candidate shells to probe for, in order, when launching a sidecar.
pub const SHELL_CANDIDATES: &[&str] = &["/bin/bash", "/bin/sh", "/usr/bin/sh"];

/// Resolve the effective container main-process command.
#[must_use]
pub fn effective_command(manifest: &Manifest) -> EffectiveCommand {
    match (&manifest.start, &manifest.agent) {
        (Some(start), agent) => EffectiveCommand::Start { main: start.clone(), sidecar: agent.clone() },
        (None, Some(agent)) => EffectiveCommand::Agent(agent.clone()),
        (None, None) => EffectiveCommand::DefaultSupervisor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_manifest() {
        let json = r#"{ "container": "alpine:3", "agent": "echo-server" }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.container.as_deref(), Some("alpine:3"));
        assert_eq!(manifest.agent.as_deref(), Some("echo-server"));
        assert_eq!(manifest.default_profile().unwrap(), Profile::Dev);
    }

    #[test]
    fn unknown_keys_round_trip() {
        let json = r#"{ "container": "alpine:3", "totallyUnknownKey": 42 }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.extra.get("totallyUnknownKey").unwrap(), 42);
        let serialized = serde_json::to_string(&manifest).unwrap();
        let reparsed: Manifest = serde_json::from_str(&serialized).unwrap();
        assert_eq!(reparsed.extra.get("totallyUnknownKey").unwrap(), 42);
    }

    #[test]
    fn effective_command_prefers_start_with_sidecar() {
        let manifest = Manifest {
            start: Some("supervisord".into()),
            agent: Some("node server.js".into()),
            ..empty_manifest()
        };
        assert_eq!(
            effective_command(&manifest),
            EffectiveCommand::Start { main: "supervisord".into(), sidecar: Some("node server.js".into()) }
        );
    }

    #[test]
    fn effective_command_falls_back_to_default() {
        let manifest = empty_manifest();
        assert_eq!(effective_command(&manifest), EffectiveCommand::DefaultSupervisor);
    }

    #[test]
    fn profile_overlay_replaces_env_and_augments_hooks() {
        let mut manifest = empty_manifest();
        manifest.env = Some(EnvSpec::List(vec!["BASE".into()]));
        manifest.preinstall = Some(CommandSpec::Single("base-preinstall".into()));
        manifest.profiles.insert(
            "prod".into(),
            ProfileOverlay { env: Some(EnvSpec::List(vec!["PROD_ONLY".into()])), ..Default::default() },
        );

        let resolved = resolve_profile(&manifest, Profile::Prod);
        assert_eq!(resolved.env, Some(EnvSpec::List(vec!["PROD_ONLY".into()])));
        // postinstall wasn't overridden by the overlay, so the base value survives.
        assert_eq!(resolved.preinstall, Some(CommandSpec::Single("base-preinstall".into())));
    }

    fn empty_manifest() -> Manifest {
        Manifest {
            container: None,
            preinstall: None,
            install: None,
            postinstall: None,
            update: None,
            cli: None,
            start: None,
            agent: None,
            about: None,
            env: None,
            enable: Vec::new(),
            repos: HashMap::new(),
            health: None,
            profiles: HashMap::new(),
            default_profile: None,
            volumes: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }
}

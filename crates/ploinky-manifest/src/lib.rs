//! Agent manifest parsing, profile overlays, effective-command resolution,
//! and the agent registry.

#![deny(unsafe_code)]

mod error;
mod manifest;
mod registry;

pub use error::{ManifestError, ManifestResult};
pub use manifest::{
    CommandSpec, EffectiveCommand, EnvSpec, HealthBlock, Manifest, MountMode, MountsOverlay, ProbeSpec, Profile,
    ProfileOverlay, ResolvedManifest, SHELL_CANDIDATES, VolumeSpec, effective_command, resolve_profile,
};
pub use registry::{AgentRecord, AgentRegistry, AgentSummary};

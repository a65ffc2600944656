//! Mount assembly for one container.

use std::path::{Path, PathBuf};

use ploinky_manifest::{MountMode, VolumeSpec};

/// One host/container path pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub host: PathBuf,
    pub container: String,
    pub mode: MountMode,
}

impl MountEntry {
    #[must_use]
    pub fn to_cli_flag(&self) -> String {
        let mode = match self.mode {
            MountMode::Rw => "rw",
            MountMode::Ro => "ro",
        };
        format!("{}:{}:{}", self.host.display(), self.container, mode)
    }
}

/// Inputs needed to assemble the full mount list for one container.
pub struct MountInputs<'a> {
    pub agent_framework_dir: &'a Path,
    pub agent_code_dir: &'a Path,
    pub code_mode: MountMode,
    pub deps_dir: &'a Path,
    pub shared_dir: &'a Path,
    pub working_dir: &'a Path,
    pub skills_dir: Option<&'a Path>,
    pub volumes: &'a [VolumeSpec],
}

/// Build the fixed mount set for a container.
#[must_use]
pub fn build_mounts(inputs: &MountInputs<'_>) -> Vec<MountEntry> {
    let mut mounts = vec![
        MountEntry { host: inputs.agent_framework_dir.to_path_buf(), container: "/Agent".into(), mode: MountMode::Ro },
        MountEntry { host: inputs.agent_code_dir.to_path_buf(), container: "/code".into(), mode: inputs.code_mode },
        // Mounted twice (same host directory) so module resolution works
        // from both /code and /Agent.
        MountEntry {
            host: inputs.deps_dir.to_path_buf(),
            container: "/code/node_modules".into(),
            mode: MountMode::Rw,
        },
        MountEntry {
            host: inputs.deps_dir.to_path_buf(),
            container: "/Agent/node_modules".into(),
            mode: MountMode::Rw,
        },
        MountEntry { host: inputs.shared_dir.to_path_buf(), container: "/shared".into(), mode: MountMode::Rw },
        // Passthrough: the container sees the agent working dir at the
        // same path as on the host, so in-container tools write to host
        // state directly.
        MountEntry {
            host: inputs.working_dir.to_path_buf(),
            container: inputs.working_dir.display().to_string(),
            mode: MountMode::Rw,
        },
    ];

    if let Some(skills) = inputs.skills_dir {
        mounts.push(MountEntry {
            host: skills.to_path_buf(),
            container: "/code/.AchillesSkills".into(),
            mode: inputs.code_mode,
        });
    }

    for volume in inputs.volumes {
        mounts.push(MountEntry {
            host: PathBuf::from(&volume.host),
            container: volume.container.clone(),
            mode: if volume.read_only { MountMode::Ro } else { MountMode::Rw },
        });
    }

    mounts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_fixed_mount_set_with_deps_mounted_twice() {
        let inputs = MountInputs {
            agent_framework_dir: Path::new("/opt/ploinky"),
            agent_code_dir: Path::new("/workspace/repos/demo/hello/code"),
            code_mode: MountMode::Rw,
            deps_dir: Path::new("/workspace/agents/hello/deps"),
            shared_dir: Path::new("/workspace/shared"),
            working_dir: Path::new("/workspace/agents/hello"),
            skills_dir: None,
            volumes: &[],
        };
        let mounts = build_mounts(&inputs);
        assert_eq!(mounts.len(), 6);
        assert!(mounts.iter().any(|m| m.container == "/code/node_modules"));
        assert!(mounts.iter().any(|m| m.container == "/Agent/node_modules"));
        assert_eq!(
            mounts.iter().find(|m| m.container == "/code/node_modules").unwrap().host,
            mounts.iter().find(|m| m.container == "/Agent/node_modules").unwrap().host
        );
    }
}

//! The Container Manager: creates, starts, stops, restarts, and destroys
//! containers via an OCI-compatible CLI.

use std::collections::HashSet;
use std::net::TcpListener;
use std::ops::Range;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{ContainerError, ContainerResult};
use crate::mounts::MountEntry;
use crate::runtime::OciRuntime;
use crate::state::ContainerState;

/// The outcome of running a command inside (or against) a container.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Drives the resolved OCI CLI for one workspace.
pub struct ContainerManager {
    runtime: OciRuntime,
}

impl ContainerManager {
    #[must_use]
    pub fn new(runtime: OciRuntime) -> Self {
        Self { runtime }
    }

    async fn run(&self, args: &[&str]) -> ContainerResult<ExecOutput> {
        let output = Command::new(&self.runtime.binary)
            .args(args)
            .output()
            .await
            .map_err(ContainerError::Io)?;
        Ok(ExecOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// `docker create --name <name> <mounts> <env> <image> <entrypoint>`.
    pub async fn create(
        &self,
        name: &str,
        image: &str,
        mounts: &[MountEntry],
        env_flags: &[String],
        entrypoint: &str,
    ) -> ContainerResult<()> {
        let mut args: Vec<String> = vec!["create".into(), "--name".into(), name.into()];
        for mount in mounts {
            args.push("-v".into());
            args.push(mount.to_cli_flag());
        }
        args.extend(env_flags.iter().cloned());
        args.push(image.to_string());
        args.push("sh".into());
        args.push("-c".into());
        args.push(entrypoint.to_string());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(&arg_refs).await?;
        if output.code != Some(0) {
            return Err(ContainerError::CommandFailed { command: "create".into(), reason: output.stderr });
        }
        Ok(())
    }

    pub async fn start(&self, name: &str) -> ContainerResult<()> {
        self.expect_ok("start", &["start", name]).await
    }

    pub async fn stop(&self, name: &str) -> ContainerResult<()> {
        self.expect_ok("stop", &["stop", name]).await
    }

    pub async fn kill(&self, name: &str) -> ContainerResult<()> {
        self.expect_ok("kill", &["kill", name]).await
    }

    pub async fn remove(&self, name: &str) -> ContainerResult<()> {
        self.expect_ok("remove", &["rm", "-f", name]).await
    }

    async fn expect_ok(&self, op: &'static str, args: &[&str]) -> ContainerResult<()> {
        let output = self.run(args).await?;
        if output.code != Some(0) {
            warn!(op, reason = %output.stderr, "container operation failed");
            return Err(ContainerError::CommandFailed { command: op.into(), reason: output.stderr });
        }
        Ok(())
    }

    /// `refresh`: stop → remove → create → start, preserving the name.
    pub async fn refresh(
        &self,
        name: &str,
        image: &str,
        mounts: &[MountEntry],
        env_flags: &[String],
        entrypoint: &str,
    ) -> ContainerResult<()> {
        let _ = self.stop(name).await;
        let _ = self.remove(name).await;
        self.create(name, image, mounts, env_flags, entrypoint).await?;
        self.start(name).await
    }

    /// `restart`: stop → start, preserving container identity.
    pub async fn restart(&self, name: &str) -> ContainerResult<()> {
        self.stop(name).await?;
        self.start(name).await
    }

    pub async fn inspect(&self, name: &str) -> ContainerResult<ContainerState> {
        let output = self.run(&["inspect", "--format", "{{.State.Status}}", name]).await?;
        if output.code != Some(0) {
            return Ok(ContainerState::Absent);
        }
        Ok(ContainerState::from_inspect_status(output.stdout.trim()))
    }

    /// Execute `cmd` inside a running container with a timeout, used by
    /// the Health Supervisor for probes and by the lifecycle hooks for
    /// `postinstall`.
    pub async fn exec(&self, name: &str, cmd: &str, probe_timeout: Duration) -> ContainerResult<ExecOutput> {
        let fut = self.run(&["exec", name, "sh", "-c", cmd]);
        match timeout(probe_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Ok(ExecOutput { code: None, stdout: String::new(), stderr: "probe timed out".into() }),
        }
    }

    /// Run a disposable, throwaway container for the `install` hook: the
    /// agent source is mounted read-write, the command runs, and the
    /// container is removed regardless of outcome.
    pub async fn run_disposable(&self, image: &str, mounts: &[MountEntry], cmd: &str) -> ContainerResult<ExecOutput> {
        let mut args: Vec<String> = vec!["run".into(), "--rm".into()];
        for mount in mounts {
            args.push("-v".into());
            args.push(mount.to_cli_flag());
        }
        args.push(image.to_string());
        args.push("sh".into());
        args.push("-c".into());
        args.push(cmd.to_string());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs).await
    }
}

/// The effective container entrypoint: `cd /code && <install-snippet> &&
/// <manifest-install> && <main-command>`, with empty pieces elided.
#[must_use]
pub fn build_entrypoint(install_snippet: &str, manifest_install: Option<&str>, main_command: &str) -> String {
    let mut pieces = vec!["cd /code".to_string()];
    if !install_snippet.trim().is_empty() {
        pieces.push(install_snippet.to_string());
    }
    if let Some(cmd) = manifest_install {
        if !cmd.trim().is_empty() {
            pieces.push(cmd.to_string());
        }
    }
    if !main_command.trim().is_empty() {
        pieces.push(main_command.to_string());
    }
    pieces.join(" && ")
}

/// Allocate the first free host port in `range`, skipping any already
/// recorded in `used` (the routing table's existing mappings), verified by
/// a local bind probe.
pub fn allocate_port(range: Range<u16>, used: &HashSet<u16>) -> ContainerResult<u16> {
    for port in range.clone() {
        if used.contains(&port) {
            continue;
        }
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            debug!(port, "allocated host port");
            return Ok(port);
        }
    }
    Err(ContainerError::PortExhausted { start: range.start, end: range.end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entrypoint_elides_empty_pieces() {
        let cmd = build_entrypoint("", None, "node server.js");
        assert_eq!(cmd, "cd /code && node server.js");

        let cmd = build_entrypoint("prep.sh", Some("npm ci"), "node server.js");
        assert_eq!(cmd, "cd /code && prep.sh && npm ci && node server.js");
    }

    #[test]
    fn allocates_first_free_port_skipping_used() {
        let mut used = HashSet::new();
        used.insert(7000);
        let port = allocate_port(7000..7010, &used).unwrap();
        assert_ne!(port, 7000);
        assert!((7000..7010).contains(&port));
    }
}

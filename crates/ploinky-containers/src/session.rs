//! Session Registry: tracks containers started by this invocation and owns
//! stopping the router process on shutdown.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{info, warn};

use crate::error::{ContainerError, ContainerResult};

const ROUTER_PID_FILE: &str = "router.pid";
const KILL_ESCALATION_DELAY: Duration = Duration::from_secs(5);

/// In-memory record of containers this process has created or started, so
/// a clean shutdown can tear down exactly what it brought up.
#[derive(Default)]
pub struct SessionRegistry {
    containers: Mutex<HashSet<String>>,
    state_dir: PathBuf,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self { containers: Mutex::new(HashSet::new()), state_dir: state_dir.into() }
    }

    pub fn track(&self, container: impl Into<String>) {
        self.containers.lock().expect("session registry mutex poisoned").insert(container.into());
    }

    pub fn untrack(&self, container: &str) {
        self.containers.lock().expect("session registry mutex poisoned").remove(container);
    }

    #[must_use]
    pub fn tracked(&self) -> Vec<String> {
        self.containers.lock().expect("session registry mutex poisoned").iter().cloned().collect()
    }

    fn pid_file(&self) -> PathBuf {
        self.state_dir.join(ROUTER_PID_FILE)
    }

    /// Record the router's PID after spawning it.
    pub fn record_router_pid(&self, pid: u32) -> ContainerResult<()> {
        fs::write(self.pid_file(), pid.to_string()).map_err(ContainerError::Io)
    }

    pub fn clear_router_pid(&self) -> ContainerResult<()> {
        let path = self.pid_file();
        if path.exists() {
            fs::remove_file(path).map_err(ContainerError::Io)?;
        }
        Ok(())
    }

    fn read_router_pid(&self) -> Option<i32> {
        let raw = fs::read_to_string(self.pid_file()).ok()?;
        raw.trim().parse().ok()
    }

    /// Stop the router: prefer the recorded PID file, escalating
    /// SIGTERM → SIGKILL; fall back to scanning for a listener on `port`
    /// when no PID file is present (e.g. after an unclean prior exit).
    pub async fn stop_router(&self, port: u16) -> ContainerResult<()> {
        if let Some(pid) = self.read_router_pid() {
            self.terminate_pid(pid).await?;
            let _ = self.clear_router_pid();
            return Ok(());
        }

        if let Some(pid) = find_listener_pid(port) {
            warn!(port, pid, "no router pid file; found listener via port scan");
            self.terminate_pid(pid).await?;
            return Ok(());
        }

        info!(port, "no router process found to stop");
        Ok(())
    }

    async fn terminate_pid(&self, pid: i32) -> ContainerResult<()> {
        let target = Pid::from_raw(pid);
        if kill(target, Signal::SIGTERM).is_err() {
            return Ok(());
        }
        tokio::time::sleep(KILL_ESCALATION_DELAY).await;
        if kill(target, Signal::from_raw(0)).is_ok() {
            warn!(pid, "router did not exit after SIGTERM; sending SIGKILL");
            let _ = kill(target, Signal::SIGKILL);
        }
        Ok(())
    }
}

/// Scan for a process holding `port` using whichever portable tool is
/// available (`lsof`, then `fuser`). Returns `None` if neither is present
/// or no listener is found.
fn find_listener_pid(port: u16) -> Option<i32> {
    if let Ok(output) = std::process::Command::new("lsof").args(["-t", "-i", &format!(":{port}")]).output() {
        if output.status.success() {
            let text = String::from_utf8_lossy(&output.stdout);
            if let Some(first) = text.lines().next() {
                if let Ok(pid) = first.trim().parse() {
                    return Some(pid);
                }
            }
        }
    }
    if let Ok(output) = std::process::Command::new("fuser").arg(format!("{port}/tcp")).output() {
        let text = String::from_utf8_lossy(&output.stdout);
        if let Some(first) = text.split_whitespace().next() {
            if let Ok(pid) = first.trim().parse() {
                return Some(pid);
            }
        }
    }
    None
}

#[must_use]
pub fn router_pid_path(state_dir: &Path) -> PathBuf {
    state_dir.join(ROUTER_PID_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_and_untracks_containers() {
        let registry = SessionRegistry::new(std::env::temp_dir());
        registry.track("ploinky_demo_abc123_agent_hello");
        assert_eq!(registry.tracked().len(), 1);
        registry.untrack("ploinky_demo_abc123_agent_hello");
        assert!(registry.tracked().is_empty());
    }

    #[test]
    fn records_and_clears_router_pid() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SessionRegistry::new(dir.path());
        registry.record_router_pid(4242).unwrap();
        assert_eq!(fs::read_to_string(router_pid_path(dir.path())).unwrap(), "4242");
        registry.clear_router_pid().unwrap();
        assert!(!router_pid_path(dir.path()).exists());
    }
}

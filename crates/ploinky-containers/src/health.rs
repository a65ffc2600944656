//! Health Supervisor: liveness/readiness probing and CrashLoopBackOff.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

use ploinky_manifest::ProbeSpec;

use crate::manager::ContainerManager;

const BACKOFF_FLOOR: Duration = Duration::from_secs(10);
const BACKOFF_CAP: Duration = Duration::from_secs(300);
const UPTIME_RESET_THRESHOLD: Duration = Duration::from_secs(600);

/// Per-container CrashLoopBackOff bookkeeping. Kept in memory only; no
/// persistence is required across process restarts.
#[derive(Debug, Clone)]
pub struct CrashLoopState {
    pub retry_count: u32,
    pub started_at: Instant,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl CrashLoopState {
    #[must_use]
    pub fn fresh(now: Instant) -> Self {
        Self { retry_count: 0, started_at: now, consecutive_successes: 0, consecutive_failures: 0 }
    }

    /// The delay before the next restart: `10s, 20s, 40s, 80s, 160s, 300s,
    /// 300s, ...` — doubles each retry, clamped to 5 minutes.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let shift = self.retry_count.min(20);
        let doubled = BACKOFF_FLOOR.saturating_mul(1u32 << shift);
        doubled.min(BACKOFF_CAP)
    }

    /// Reset the retry count to zero if the container has been up for at
    /// least 10 minutes since its last (re)start.
    pub fn maybe_reset(&mut self, now: Instant) {
        if now.duration_since(self.started_at) >= UPTIME_RESET_THRESHOLD {
            self.retry_count = 0;
        }
    }

    /// Clear all backoff state: invoked on any manual stop/restart/refresh.
    pub fn clear(&mut self, now: Instant) {
        *self = Self::fresh(now);
    }
}

/// Runs liveness/readiness probes for every container with a `health`
/// block and restarts on CrashLoopBackOff.
pub struct HealthSupervisor {
    manager: Arc<ContainerManager>,
    state: RwLock<HashMap<String, CrashLoopState>>,
}

impl HealthSupervisor {
    #[must_use]
    pub fn new(manager: Arc<ContainerManager>) -> Self {
        Self { manager, state: RwLock::new(HashMap::new()) }
    }

    /// Clear CrashLoopBackOff state for a container — call on manual
    /// stop/restart/refresh.
    pub async fn clear(&self, container: &str) {
        let mut guard = self.state.write().await;
        guard.entry(container.to_string()).or_insert_with(|| CrashLoopState::fresh(Instant::now())).clear(Instant::now());
    }

    /// Run one liveness probe cycle for `container`. Returns `true` if a
    /// restart was triggered.
    pub async fn probe_liveness(&self, container: &str, probe: &ProbeSpec) -> bool {
        if !Self::script_path_allowed(&probe.script) {
            warn!(script = %probe.script, container, "rejecting liveness probe script outside the agent root");
            return false;
        }
        let output = self.manager.exec(container, &probe.script, Duration::from_secs(probe.timeout)).await;
        let success = matches!(&output, Ok(o) if o.code == Some(0));

        let mut guard = self.state.write().await;
        let entry = guard.entry(container.to_string()).or_insert_with(|| CrashLoopState::fresh(Instant::now()));
        entry.maybe_reset(Instant::now());

        if success {
            entry.consecutive_successes = entry.consecutive_successes.saturating_add(1);
            entry.consecutive_failures = 0;
            return false;
        }

        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        entry.consecutive_successes = 0;
        if entry.consecutive_failures < probe.failure_threshold {
            return false;
        }

        let delay = entry.next_delay();
        entry.retry_count = entry.retry_count.saturating_add(1);
        entry.started_at = Instant::now();
        entry.consecutive_failures = 0;
        warn!(container, delay_secs = delay.as_secs(), "liveness probe failed threshold; scheduling restart");

        drop(guard);
        tokio::time::sleep(delay).await;
        if self.manager.restart(container).await.is_ok() {
            info!(container, "restarted container after CrashLoopBackOff");
        }
        true
    }

    /// Run one readiness probe cycle. Failures only log a warning; they
    /// never restart the container.
    pub async fn probe_readiness(&self, container: &str, probe: &ProbeSpec) {
        if !Self::script_path_allowed(&probe.script) {
            warn!(script = %probe.script, container, "rejecting readiness probe script outside the agent root");
            return;
        }
        let output = self.manager.exec(container, &probe.script, Duration::from_secs(probe.timeout)).await;
        if !matches!(&output, Ok(o) if o.code == Some(0)) {
            warn!(container, "readiness probe failed");
        }
    }

    /// Reject traversal (`..`) and subdirectories (any path separator): the
    /// probe script must live directly under the agent's root.
    fn script_path_allowed(script: &str) -> bool {
        !script.contains("..") && !script.contains('/') && !script.contains('\\')
    }

    /// Spawn the background loop for one container's liveness probe on its
    /// configured interval.
    pub fn spawn_liveness_loop(self: Arc<Self>, container: String, probe: ProbeSpec) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(probe.interval));
            loop {
                ticker.tick().await;
                self.probe_liveness(&container, &probe).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_sequence_doubles_and_caps_at_five_minutes() {
        let mut state = CrashLoopState::fresh(Instant::now());
        let expected = [10u64, 20, 40, 80, 160, 300, 300];
        for exp in expected {
            assert_eq!(state.next_delay(), Duration::from_secs(exp));
            state.retry_count += 1;
        }
    }

    #[test]
    fn uptime_reset_clears_retry_count() {
        let mut state = CrashLoopState::fresh(Instant::now() - Duration::from_secs(700));
        state.retry_count = 4;
        state.maybe_reset(Instant::now());
        assert_eq!(state.retry_count, 0);
    }

    #[test]
    fn script_path_rejects_traversal_and_subdirectories() {
        assert!(HealthSupervisor::script_path_allowed("check.sh"));
        assert!(!HealthSupervisor::script_path_allowed("../check.sh"));
        assert!(!HealthSupervisor::script_path_allowed("scripts/check.sh"));
    }

    #[test]
    fn clear_resets_everything() {
        let mut state = CrashLoopState::fresh(Instant::now());
        state.retry_count = 3;
        state.consecutive_failures = 2;
        state.clear(Instant::now());
        assert_eq!(state.retry_count, 0);
        assert_eq!(state.consecutive_failures, 0);
    }
}

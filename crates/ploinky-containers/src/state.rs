//! Container lifecycle state and exit-code classification.

/// The lifecycle state of one container.
///
/// ```text
///  absent ──create──> created ──start──> running ──stop──► stopped
///    ▲                                     │  ▲               │
///    │                                     │  └──start────────┘
///    └─────────remove────── stopped◄──kill─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Absent,
    Created,
    Running,
    Stopped,
}

impl ContainerState {
    /// Parse the status string an OCI CLI's `inspect` reports.
    #[must_use]
    pub fn from_inspect_status(status: &str) -> Self {
        match status {
            "running" => ContainerState::Running,
            "created" => ContainerState::Created,
            "exited" | "stopped" | "dead" => ContainerState::Stopped,
            _ => ContainerState::Absent,
        }
    }
}

/// How the supervisor should react to a container's main process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    Clean,
    Configuration,
    Fatal,
    Unexpected,
}

/// Classify an exit code: `0` clean; `2` configuration error (no
/// restart); `>= 150` fatal (no restart); anything else unexpected
/// (restart-eligible, subject to CrashLoopBackOff).
#[must_use]
pub fn classify_exit_code(code: i32) -> ExitClass {
    match code {
        0 => ExitClass::Clean,
        2 => ExitClass::Configuration,
        c if c >= 150 => ExitClass::Fatal,
        _ => ExitClass::Unexpected,
    }
}

impl ExitClass {
    #[must_use]
    pub fn is_restart_eligible(self) -> bool {
        matches!(self, ExitClass::Unexpected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_exit_codes() {
        assert_eq!(classify_exit_code(0), ExitClass::Clean);
        assert_eq!(classify_exit_code(2), ExitClass::Configuration);
        assert_eq!(classify_exit_code(150), ExitClass::Fatal);
        assert_eq!(classify_exit_code(200), ExitClass::Fatal);
        assert_eq!(classify_exit_code(1), ExitClass::Unexpected);
        assert!(classify_exit_code(1).is_restart_eligible());
        assert!(!classify_exit_code(2).is_restart_eligible());
    }
}

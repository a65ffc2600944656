#![deny(unsafe_code)]

//! Container lifecycle: detecting an OCI-compatible runtime, driving it
//! through the create/start/stop/refresh/restart state machine, assembling
//! mounts, allocating ports, supervising health with CrashLoopBackOff, and
//! tracking what this invocation brought up.

mod error;
mod health;
mod manager;
mod mounts;
mod runtime;
mod session;
mod state;

pub use error::{ContainerError, ContainerResult};
pub use health::{CrashLoopState, HealthSupervisor};
pub use manager::{allocate_port, build_entrypoint, ContainerManager, ExecOutput};
pub use mounts::{build_mounts, MountEntry, MountInputs};
pub use runtime::{OciRuntime, CANDIDATE_CLIS};
pub use session::{router_pid_path, SessionRegistry};
pub use state::{classify_exit_code, ContainerState, ExitClass};

//! Structured logging bootstrap shared by the router, agent server, and CLI
//! binaries.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global `tracing` subscriber with JSON-formatted
/// structured records and an `RUST_LOG`-driven filter.
///
/// Safe to call once per process; calling it a second time is a no-op
/// error from `tracing`'s perspective and is ignored here since binaries
/// only ever call this once at startup.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init();
}

//! Structured logging init, driven by [`EngineConfig::log_level`].

use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

/// Install a global `tracing` subscriber filtered at `level`. Safe to call
/// more than once; subsequent calls are no-ops (the global default can only
/// be set once per process).
pub fn init(level: LogLevel) {
    let filter = EnvFilter::try_new(level.as_str()).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

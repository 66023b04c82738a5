//! Tracing and logging setup shared by batchline hosts.

/// Initialize process-wide logging from the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize process-wide logging with an explicit configuration.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_with(config: ObservabilityConfig) -> bool {
    tracing::try_init(&config)
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::{LogFormat, ObservabilityConfig};

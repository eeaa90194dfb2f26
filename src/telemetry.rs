//! Tracing setup for binaries and demos

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "wardview=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, defaulting to `wardview=info`
///
/// Returns an error when a global subscriber is already installed.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

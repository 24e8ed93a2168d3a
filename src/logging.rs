//! Tracing setup for binaries and tests embedding the library
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the embedder's choice. `RUST_LOG` overrides the default filter.

use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber at `info` level (or `RUST_LOG`)
pub fn init() -> anyhow::Result<()> {
    init_with_filter("info")
}

/// Install a formatted subscriber with the given default filter directives
pub fn init_with_filter(directives: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directives))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;

    Ok(())
}

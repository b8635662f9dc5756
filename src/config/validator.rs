//! Configuration validation

use super::FarmConfig;
use anyhow::{Context, Result};
use std::net::SocketAddr;

/// Validate complete configuration
pub fn validate_config(config: &FarmConfig) -> Result<()> {
    if config.workers == 0 {
        anyhow::bail!("workers must be at least 1");
    }

    if config.wait_interval_ms == 0 {
        anyhow::bail!("wait_interval_ms must be greater than 0");
    }

    validate_address(&config.listen).context("Invalid listen address")?;

    // connect may name a host, so only check it has a port
    if !config.connect.contains(':') {
        anyhow::bail!("connect address '{}' has no port", config.connect);
    }

    Ok(())
}

fn validate_address(addr: &str) -> Result<()> {
    addr.parse::<SocketAddr>()
        .with_context(|| format!("'{}' is not a socket address", addr))?;
    Ok(())
}

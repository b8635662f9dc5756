//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod toml;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Farm configuration shared by every execution mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmConfig {
    /// Number of workers (local mode spawns them, coordinator mode waits for them)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Worker back-off after a `wait` directive, in milliseconds
    #[serde(default = "default_wait_interval_ms")]
    pub wait_interval_ms: u64,
    /// Address the coordinator listens on
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Coordinator address a worker connects to
    #[serde(default = "default_connect")]
    pub connect: String,
}

impl FarmConfig {
    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis(self.wait_interval_ms)
    }
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            wait_interval_ms: default_wait_interval_ms(),
            listen: default_listen(),
            connect: default_connect(),
        }
    }
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_wait_interval_ms() -> u64 {
    5000
}

fn default_listen() -> String {
    "0.0.0.0:9999".to_string()
}

fn default_connect() -> String {
    "127.0.0.1:9999".to_string()
}

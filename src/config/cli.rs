//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Local mode (default) - coordinator and workers in one process
    Local,
    /// Coordinator mode - hand out work to connected workers
    Coordinator,
    /// Worker mode - connect to a coordinator and run tasks
    Worker,
}

/// taskfarm - distribute function calls over a pool of workers
#[derive(Parser, Debug)]
#[command(name = "taskfarm")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: local, coordinator, or worker
    #[arg(long, value_enum, default_value = "local")]
    pub mode: ExecutionMode,

    /// Number of workers (local: spawned, coordinator: connections to accept)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Address to listen on (coordinator mode only, e.g. "0.0.0.0:9999")
    #[arg(long)]
    pub listen: Option<String>,

    /// Coordinator address to connect to (worker mode only, e.g. "10.0.1.10:9999")
    #[arg(long)]
    pub connect: Option<String>,

    /// Built-in function to apply to every argument set
    #[arg(short = 'f', long, default_value = "add")]
    pub function: String,

    /// JSON file holding an array of argument arrays
    ///
    /// Not used in worker mode (the coordinator sends the work)
    #[arg(long, value_name = "FILE")]
    pub tasks: Option<PathBuf>,

    /// Milliseconds a worker sleeps after a wait directive
    #[arg(long)]
    pub wait_ms: Option<u64>,

    /// TOML configuration file (CLI options take precedence)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write results and errors as JSON to this file
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mode != ExecutionMode::Worker && self.tasks.is_none() {
            anyhow::bail!("--tasks is required in {:?} mode", self.mode);
        }
        if self.mode == ExecutionMode::Worker && self.tasks.is_some() {
            anyhow::bail!("--tasks is not accepted in worker mode");
        }
        if self.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }
        Ok(())
    }
}

//! taskfarm CLI entry point

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, Instant};
use taskfarm::config::cli::{Cli, ExecutionMode};
use taskfarm::config::{toml::load_config, validator::validate_config, FarmConfig};
use taskfarm::output::json::{write_json_output, JsonDuration, JsonRunInfo, JsonRunOutput};
use taskfarm::output::text::print_results;
use taskfarm::transport::tcp::{local_node_id, TcpCoordinator, TcpWorker};
use taskfarm::{builtins, farm, Coordinator, Outcome, Worker};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.debug);

    println!("taskfarm v{}", env!("CARGO_PKG_VERSION"));
    println!();

    cli.validate()?;
    let config = load_config(&cli)?;
    validate_config(&config).context("Configuration validation failed")?;

    let runtime = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?;

    match cli.mode {
        ExecutionMode::Local => runtime.block_on(run_local(&cli, &config)),
        ExecutionMode::Coordinator => runtime.block_on(run_coordinator(&cli, &config)),
        ExecutionMode::Worker => runtime.block_on(run_worker(&config)),
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run coordinator and workers in this process
async fn run_local(cli: &Cli, config: &FarmConfig) -> Result<()> {
    let argument_sets = load_tasks(cli)?;
    println!("Mode:     local ({} workers)", config.workers);
    println!("Function: {}", cli.function);
    println!("Tasks:    {}", argument_sets.len());
    println!();

    let start = Instant::now();
    let outcome = farm::run_local(builtins::registry(), config, cli.function.as_str(), argument_sets)
        .await
        .context("Local run failed")?;

    report(cli, config, "local", &outcome, start.elapsed())
}

/// Wait for workers on the listen address and hand out the work
async fn run_coordinator(cli: &Cli, config: &FarmConfig) -> Result<()> {
    let argument_sets = load_tasks(cli)?;
    println!("Mode:     coordinator on {} ({} workers)", config.listen, config.workers);
    println!("Function: {}", cli.function);
    println!("Tasks:    {}", argument_sets.len());
    println!();

    let transport = TcpCoordinator::bind(config.listen.as_str(), config.workers)
        .await
        .with_context(|| format!("Failed to accept workers on {}", config.listen))?;

    let start = Instant::now();
    let mut coordinator = Coordinator::new(transport);
    coordinator
        .submit(cli.function.as_str(), argument_sets)
        .context("Invalid task file")?;
    let outcome = coordinator.run().await.context("Coordinator failed")?;
    let elapsed = start.elapsed();

    coordinator
        .into_transport()
        .shutdown()
        .await
        .context("Failed to close worker connections")?;

    report(cli, config, "coordinator", &outcome, elapsed)
}

/// Connect to a coordinator and run tasks until told to stop
async fn run_worker(config: &FarmConfig) -> Result<()> {
    let node_id = local_node_id();
    println!("Mode: worker on {} connecting to {}", node_id, config.connect);

    let transport = TcpWorker::connect(config.connect.as_str(), node_id)
        .await
        .with_context(|| format!("Failed to connect to coordinator at {}", config.connect))?;

    let mut worker = Worker::new(transport, builtins::registry(), config.wait_interval());
    let report = worker.run().await.context("Worker failed")?;

    println!(
        "Worker {} done: {} completed, {} failed, {} waits",
        worker.id(),
        report.tasks_completed,
        report.tasks_failed,
        report.waits
    );
    Ok(())
}

fn load_tasks(cli: &Cli) -> Result<Vec<Value>> {
    let path = cli
        .tasks
        .as_deref()
        .context("--tasks is required")?;
    parse_task_file(path)
}

/// Read a JSON array of argument arrays
fn parse_task_file(path: &Path) -> Result<Vec<Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read task file: {}", path.display()))?;
    let sets: Vec<Value> = serde_json::from_str(&contents)
        .with_context(|| format!("Task file {} is not a JSON array", path.display()))?;
    Ok(sets)
}

fn report(cli: &Cli, config: &FarmConfig, mode: &str, outcome: &Outcome, elapsed: Duration) -> Result<()> {
    print_results(outcome, elapsed, &cli.function);

    if let Some(ref path) = cli.output {
        let run = JsonRunInfo {
            mode: mode.to_string(),
            function: cli.function.clone(),
            workers: config.workers,
            elapsed: JsonDuration::from_duration(elapsed),
        };
        write_json_output(path, &JsonRunOutput::new(run, outcome), true)?;
        println!("Results written to {}", path.display());
    }
    Ok(())
}

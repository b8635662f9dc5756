//! In-process farm
//!
//! Runs a coordinator and a pool of workers as tokio tasks in one process,
//! connected by the local transport.

use crate::config::FarmConfig;
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::task::{FunctionId, Outcome};
use crate::transport::local;
use crate::worker::{Worker, WorkerReport};
use serde_json::Value;
use tracing::{debug, info};

/// Apply `function` to every argument set on `config.workers` local workers
///
/// Submission is validated before any worker is started, so a malformed
/// `argument_sets` fails with `Error::InvalidInput` and nothing runs.
pub async fn run_local(
    registry: Registry,
    config: &FarmConfig,
    function: impl Into<FunctionId>,
    argument_sets: Vec<Value>,
) -> Result<Outcome> {
    if config.workers == 0 {
        return Err(Error::InvalidInput("a farm needs at least one worker".to_string()));
    }

    let (transport, worker_ends) = local::pool(config.workers);
    let mut coordinator = Coordinator::new(transport);
    coordinator.submit(function, argument_sets)?;

    info!(workers = config.workers, tasks = coordinator.pending().len(), "starting local farm");

    let handles: Vec<_> = worker_ends
        .into_iter()
        .map(|end| {
            let mut worker = Worker::new(end, registry.clone(), config.wait_interval());
            tokio::spawn(async move { worker.run().await })
        })
        .collect();

    let outcome = match coordinator.run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            for handle in &handles {
                handle.abort();
            }
            return Err(e);
        }
    };

    // the coordinator end stays alive until every worker has read `end`
    let mut total = WorkerReport::default();
    for handle in handles {
        let report = handle.await??;
        total.tasks_completed += report.tasks_completed;
        total.tasks_failed += report.tasks_failed;
        total.waits += report.waits;
        total.requests += report.requests;
    }
    debug!(?total, "all workers stopped");

    drop(coordinator);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::arg;
    use serde_json::json;

    fn config(workers: usize) -> FarmConfig {
        FarmConfig {
            workers,
            wait_interval_ms: 5,
            ..FarmConfig::default()
        }
    }

    fn registry() -> Registry {
        Registry::new().register("double", |args| Ok(json!(arg::<i64>(args, 0)? * 2)))
    }

    #[tokio::test]
    async fn test_run_local() {
        let sets = (0..20).map(|i| json!([i])).collect();
        let outcome = run_local(registry(), &config(3), "double", sets).await.unwrap();

        let mut results: Vec<i64> = outcome.results.iter().filter_map(Value::as_i64).collect();
        results.sort();
        assert_eq!(results, (0..20).map(|i| i * 2).collect::<Vec<_>>());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_more_workers_than_tasks() {
        let outcome = run_local(registry(), &config(8), "double", vec![json!([21])])
            .await
            .unwrap();
        assert_eq!(outcome.results, vec![json!(42)]);
    }

    #[tokio::test]
    async fn test_invalid_input_runs_nothing() {
        let err = run_local(registry(), &config(2), "double", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = run_local(registry(), &config(0), "double", vec![json!([1])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}

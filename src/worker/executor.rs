//! Task execution
//!
//! Runs one work item through the registry and turns every way it can go
//! wrong into a [`TaskExecutionError`]. Nothing escapes: a panicking work
//! function is caught here, so the worker loop always gets an outcome back.
//!
//! Work functions are plain blocking calls. The worker loop goes through
//! [`execute_blocking`], which moves the call onto tokio's blocking pool so
//! a long computation never occupies a runtime thread.

use crate::registry::{Registry, WorkFn};
use crate::task::{FunctionId, WorkItem};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Why a task failed
///
/// Stays on the worker: the coordinator only learns that the arguments failed.
#[derive(Debug, Error)]
pub enum TaskExecutionError {
    #[error("function '{0}' is not registered on this worker")]
    UnknownFunction(FunctionId),

    #[error("function returned an error: {0:#}")]
    Failed(anyhow::Error),

    #[error("function panicked: {0}")]
    Panicked(String),

    #[error("blocking task was cancelled: {0}")]
    Aborted(String),
}

/// Result of running one task
pub type TaskOutcome = std::result::Result<Value, TaskExecutionError>;

/// Run `item` with the function registered under its identifier
pub fn execute(registry: &Registry, item: &WorkItem) -> TaskOutcome {
    let function = registry
        .get(item.function())
        .ok_or_else(|| TaskExecutionError::UnknownFunction(item.function().clone()))?;

    call(&function, item.args())
}

/// Run `item` on the blocking thread pool
pub async fn execute_blocking(registry: &Registry, item: &WorkItem) -> TaskOutcome {
    let function = registry
        .get(item.function())
        .ok_or_else(|| TaskExecutionError::UnknownFunction(item.function().clone()))?;
    let args = item.args().to_vec();

    tokio::task::spawn_blocking(move || call(&function, &args))
        .await
        .unwrap_or_else(|e| Err(TaskExecutionError::Aborted(e.to_string())))
}

fn call(function: &WorkFn, args: &[Value]) -> TaskOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| function(args))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TaskExecutionError::Failed(e)),
        Err(payload) => Err(TaskExecutionError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::arg;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::new()
            .register("add", |args| {
                let a: i64 = arg(args, 0)?;
                let b: i64 = arg(args, 1)?;
                Ok(json!(a + b))
            })
            .register("explode", |_| panic!("boom"))
    }

    #[test]
    fn test_execute_success() {
        let item = WorkItem::new("add".into(), vec![json!(5), json!(6)]);
        assert_eq!(execute(&registry(), &item).unwrap(), json!(11));
    }

    #[test]
    fn test_execute_function_error() {
        let item = WorkItem::new("add".into(), vec![json!("five"), json!(6)]);
        let err = execute(&registry(), &item).unwrap_err();
        assert!(matches!(err, TaskExecutionError::Failed(_)));
    }

    #[test]
    fn test_execute_panic_contained() {
        let item = WorkItem::new("explode".into(), vec![]);
        match execute(&registry(), &item).unwrap_err() {
            TaskExecutionError::Panicked(msg) => assert_eq!(msg, "boom"),
            other => panic!("Wrong error type: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_blocking_matches_execute() {
        let item = WorkItem::new("add".into(), vec![json!(5), json!(6)]);
        assert_eq!(execute_blocking(&registry(), &item).await.unwrap(), json!(11));

        let item = WorkItem::new("explode".into(), vec![]);
        let err = execute_blocking(&registry(), &item).await.unwrap_err();
        assert!(matches!(err, TaskExecutionError::Panicked(msg) if msg == "boom"));

        let item = WorkItem::new("missing".into(), vec![]);
        let err = execute_blocking(&registry(), &item).await.unwrap_err();
        assert!(matches!(err, TaskExecutionError::UnknownFunction(_)));
    }

    #[test]
    fn test_execute_unknown_function() {
        let item = WorkItem::new("missing".into(), vec![]);
        let err = execute(&registry(), &item).unwrap_err();
        assert!(matches!(err, TaskExecutionError::UnknownFunction(id) if id.as_str() == "missing"));
    }
}

//! Units of work and their outcomes

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Stable identifier of a callable registered on every worker
///
/// Only the identifier crosses the wire; each side resolves it through its
/// own [`Registry`](crate::registry::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId(String);

impl FunctionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FunctionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FunctionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One function applied to one positional argument list
///
/// Fields are private: a work item is never modified after it is enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    function: FunctionId,
    args: Vec<Value>,
}

impl WorkItem {
    pub fn new(function: FunctionId, args: Vec<Value>) -> Self {
        Self { function, args }
    }

    pub fn function(&self) -> &FunctionId {
        &self.function
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Consume the item, keeping only its arguments
    pub fn into_args(self) -> Vec<Value> {
        self.args
    }
}

/// Arguments of a work item whose execution failed
pub type ErrorRecord = Vec<Value>;

/// Everything a coordinator collected during `run()`
///
/// Results are in arrival order, which need not match dispatch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub results: Vec<Value>,
    pub errors: Vec<ErrorRecord>,
}

impl Outcome {
    /// Number of work items that resolved, successfully or not
    pub fn resolved(&self) -> usize {
        self.results.len() + self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_work_item_keeps_args() {
        let item = WorkItem::new("add".into(), vec![json!(1), json!(2)]);
        assert_eq!(item.function().as_str(), "add");
        assert_eq!(item.args(), &[json!(1), json!(2)]);
        assert_eq!(item.into_args(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_outcome_resolved() {
        let outcome = Outcome {
            results: vec![json!(3), json!(7)],
            errors: vec![vec![json!("x")]],
        };
        assert_eq!(outcome.resolved(), 3);
    }
}

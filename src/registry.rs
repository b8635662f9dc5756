//! Function registry
//!
//! Work functions cannot travel over the wire, so every process that runs a
//! worker installs the same registry before its loop starts. A [`WorkItem`]
//! carries only the [`FunctionId`]; the worker resolves it here.
//!
//! # Example
//!
//! ```
//! use taskfarm::registry::{arg, Registry};
//! use serde_json::json;
//!
//! let registry = Registry::new()
//!     .register("add", |args| {
//!         let a: i64 = arg(args, 0)?;
//!         let b: i64 = arg(args, 1)?;
//!         Ok(json!(a + b))
//!     });
//!
//! let add = registry.get(&"add".into()).unwrap();
//! assert_eq!(add(&[json!(1), json!(2)]).unwrap(), json!(3));
//! ```
//!
//! [`WorkItem`]: crate::task::WorkItem

use crate::task::FunctionId;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A registered work function
pub type WorkFn = Arc<dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// Mapping from function identifiers to callables
#[derive(Clone, Default)]
pub struct Registry {
    functions: HashMap<FunctionId, WorkFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under `id`, replacing any previous entry
    pub fn register<F>(mut self, id: impl Into<FunctionId>, function: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(id.into(), Arc::new(function));
        self
    }

    pub fn get(&self, id: &FunctionId) -> Option<WorkFn> {
        self.functions.get(id).cloned()
    }

    pub fn contains(&self, id: &FunctionId) -> bool {
        self.functions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered identifiers, sorted
    pub fn ids(&self) -> Vec<&FunctionId> {
        let mut ids: Vec<_> = self.functions.keys().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("functions", &self.ids()).finish()
    }
}

/// Deserialize the positional argument at `index`
pub fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> anyhow::Result<T> {
    let value = args
        .get(index)
        .with_context(|| format!("missing argument {} (got {} arguments)", index, args.len()))?;
    serde_json::from_value(value.clone())
        .with_context(|| format!("argument {} has the wrong type: {}", index, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_and_get() {
        let registry = Registry::new()
            .register("one", |_| Ok(json!(1)))
            .register("echo", |args| Ok(Value::Array(args.to_vec())));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&"one".into()));
        assert!(registry.get(&"missing".into()).is_none());

        let echo = registry.get(&"echo".into()).unwrap();
        assert_eq!(echo(&[json!("a")]).unwrap(), json!(["a"]));
    }

    #[test]
    fn test_ids_sorted() {
        let registry = Registry::new()
            .register("b", |_| Ok(Value::Null))
            .register("a", |_| Ok(Value::Null));
        let ids: Vec<_> = registry.ids().iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_arg_errors() {
        let args = [json!("text")];
        assert!(arg::<i64>(&args, 0).is_err());
        assert!(arg::<String>(&args, 1).is_err());
        assert_eq!(arg::<String>(&args, 0).unwrap(), "text");
    }
}

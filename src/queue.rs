//! Coordinator-owned work bookkeeping
//!
//! An item lives in exactly one of [`PendingQueue`] or [`InFlightSet`] until it
//! resolves: dispatch moves it from the queue into the set, and the worker's
//! `done`/`error` report takes it out of the set.

use crate::error::{Error, Result};
use crate::task::{FunctionId, WorkItem};
use crate::transport::WorkerId;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// FIFO queue of work not yet handed to any worker
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: VecDeque<WorkItem>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one work item per argument set
    ///
    /// Every element of `argument_sets` must itself be a list of positional
    /// arguments. Validation happens before anything is enqueued, so a
    /// rejected submission leaves the queue untouched.
    pub fn submit(&mut self, function: impl Into<FunctionId>, argument_sets: Vec<Value>) -> Result<usize> {
        if argument_sets.is_empty() {
            return Err(Error::InvalidInput("no argument sets submitted".to_string()));
        }

        let function = function.into();
        let mut items = Vec::with_capacity(argument_sets.len());
        for (index, set) in argument_sets.into_iter().enumerate() {
            match set {
                Value::Array(args) => items.push(WorkItem::new(function.clone(), args)),
                other => {
                    return Err(Error::InvalidInput(format!(
                        "argument set {} is not a list of arguments: {}",
                        index, other
                    )));
                }
            }
        }

        let count = items.len();
        self.items.extend(items);
        Ok(count)
    }

    /// Enqueue an already-built item
    pub fn push(&mut self, item: WorkItem) {
        self.items.push_back(item);
    }

    pub fn dequeue_front(&mut self) -> Option<WorkItem> {
        self.items.pop_front()
    }

    /// Keep only the items for which `keep` returns true
    pub fn retain(&mut self, keep: impl FnMut(&WorkItem) -> bool) {
        self.items.retain(keep);
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A task handed to a worker and not yet reported back
#[derive(Debug)]
pub struct InFlight {
    pub item: WorkItem,

    /// Recorded at dispatch; never compared against a deadline
    pub dispatched_at: Instant,
}

/// Tasks currently held by workers, at most one per worker
#[derive(Debug, Default)]
pub struct InFlightSet {
    tasks: HashMap<WorkerId, InFlight>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, worker: WorkerId, item: WorkItem) -> Result<()> {
        if self.tasks.contains_key(&worker) {
            return Err(Error::protocol(format!("worker {} already holds a task", worker)));
        }
        self.tasks.insert(
            worker,
            InFlight {
                item,
                dispatched_at: Instant::now(),
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, worker: WorkerId) -> Result<InFlight> {
        self.tasks
            .remove(&worker)
            .ok_or_else(|| Error::protocol(format!("worker {} reported a task it was never given", worker)))
    }

    pub fn get(&self, worker: WorkerId) -> Option<&InFlight> {
        self.tasks.get(&worker)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_submit_in_order() {
        let mut queue = PendingQueue::new();
        let count = queue.submit("add", vec![json!([1, 2]), json!([3, 4])]).unwrap();
        assert_eq!(count, 2);

        let first = queue.dequeue_front().unwrap();
        assert_eq!(first.args(), &[json!(1), json!(2)]);
        assert_eq!(first.function().as_str(), "add");
        assert_eq!(queue.dequeue_front().unwrap().args(), &[json!(3), json!(4)]);
        assert!(queue.dequeue_front().is_none());
    }

    #[test]
    fn test_submit_empty_rejected() {
        let mut queue = PendingQueue::new();
        let err = queue.submit("add", vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_submit_bare_values_rejected() {
        let mut queue = PendingQueue::new();
        let err = queue.submit("add", vec![json!(1), json!(2), json!(3)]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_submit_mixed_rejected_atomically() {
        let mut queue = PendingQueue::new();
        let err = queue.submit("add", vec![json!([1, 2]), json!("oops")]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_empty_argument_list_is_allowed() {
        let mut queue = PendingQueue::new();
        queue.submit("now", vec![json!([])]).unwrap();
        assert!(queue.dequeue_front().unwrap().args().is_empty());
    }

    #[test]
    fn test_in_flight_one_per_worker() {
        let mut set = InFlightSet::new();
        let item = WorkItem::new("f".into(), vec![]);
        set.insert(1, item.clone()).unwrap();

        let err = set.insert(1, item.clone()).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));

        set.insert(2, item).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_in_flight_remove_unknown() {
        let mut set = InFlightSet::new();
        assert!(matches!(set.remove(3).unwrap_err(), Error::Protocol(_)));

        set.insert(3, WorkItem::new("f".into(), vec![json!(1)])).unwrap();
        let entry = set.remove(3).unwrap();
        assert_eq!(entry.item.args(), &[json!(1)]);
        assert!(set.is_empty());
    }
}

//! Coordinator
//!
//! The coordinator owns all work bookkeeping:
//! - Pending queue of work not yet dispatched
//! - In-flight set, at most one task per worker
//! - Collected results and failed argument sets
//!
//! It hands out work only when a worker asks for it, and stops once the queue
//! is empty and no worker holds a task. At that point every worker is sent
//! exactly one `end` directive.
//!
//! # Example
//!
//! ```
//! use taskfarm::coordinator::Coordinator;
//! use taskfarm::registry::{arg, Registry};
//! use taskfarm::transport::local;
//! use taskfarm::worker::Worker;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> taskfarm::Result<()> {
//! let registry = Registry::new().register("add", |args| {
//!     Ok(json!(arg::<i64>(args, 0)? + arg::<i64>(args, 1)?))
//! });
//!
//! let (transport, workers) = local::pool(2);
//! for end in workers {
//!     let mut worker = Worker::new(end, registry.clone(), Duration::from_millis(10));
//!     tokio::spawn(async move { worker.run().await });
//! }
//!
//! let mut coordinator = Coordinator::new(transport);
//! coordinator.submit("add", vec![json!([1, 2]), json!([3, 4]), json!([5, 6])])?;
//! let outcome = coordinator.run().await?;
//!
//! let mut results: Vec<i64> = outcome.results.iter().filter_map(|v| v.as_i64()).collect();
//! results.sort();
//! assert_eq!(results, vec![3, 7, 11]);
//! assert!(outcome.errors.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod hooks;

use crate::error::{Error, Result};
use crate::protocol::{Directive, Kind, Message, Status};
use crate::queue::{InFlightSet, PendingQueue};
use crate::task::{FunctionId, Outcome};
use crate::transport::{CoordinatorTransport, WorkerId};
use hooks::{HookContext, ResultHook, StartHook};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Work queue owner and termination authority
pub struct Coordinator<T> {
    transport: T,
    pending: PendingQueue,
    in_flight: InFlightSet,
    outcome: Outcome,
    terminated: bool,
    dispatched: usize,
    on_start: Option<StartHook>,
    on_result: Option<ResultHook>,
}

impl<T: CoordinatorTransport> Coordinator<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            pending: PendingQueue::new(),
            in_flight: InFlightSet::new(),
            outcome: Outcome::default(),
            terminated: false,
            dispatched: 0,
            on_start: None,
            on_result: None,
        }
    }

    /// Set a hook that runs once before the main loop
    pub fn on_start<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&mut HookContext<'_>) + Send + 'static,
    {
        self.on_start = Some(Box::new(hook));
        self
    }

    /// Route every result through `hook` instead of collecting it
    pub fn on_result<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut HookContext<'_>, Value) + Send + 'static,
    {
        self.on_result = Some(Box::new(hook));
        self
    }

    /// Queue one work item per argument set
    ///
    /// Each element of `argument_sets` must be a list of positional arguments.
    /// Fails with `Error::InvalidInput` on an empty or malformed submission,
    /// and with `Error::Terminated` once `end` has been broadcast.
    pub fn submit(&mut self, function: impl Into<FunctionId>, argument_sets: Vec<Value>) -> Result<usize> {
        if self.terminated {
            return Err(Error::Terminated);
        }
        let count = self.pending.submit(function, argument_sets)?;
        debug!(count, pending = self.pending.len(), "work submitted");
        Ok(count)
    }

    /// Drive the protocol until all work has resolved and every worker was told to stop
    ///
    /// Returns the collected results and failed argument sets. On an already
    /// terminated coordinator this sends nothing and returns an empty outcome.
    pub async fn run(&mut self) -> Result<Outcome> {
        if self.terminated {
            warn!("run() called on a terminated coordinator");
            return Ok(Outcome::default());
        }

        if let Some(hook) = self.on_start.take() {
            hook(&mut HookContext {
                pending: &mut self.pending,
                outcome: &mut self.outcome,
            });
        }

        info!(
            pending = self.pending.len(),
            workers = self.transport.workers().len(),
            "coordinator started"
        );

        loop {
            let (worker, msg) = self.transport.recv_any(Kind::Status).await?;
            let status = msg.into_status()?;
            debug!(worker, ?status, "received status signal");

            match status {
                Status::Ready => self.dispatch(worker).await?,
                Status::Done => self.collect_result(worker).await?,
                Status::Error => self.collect_failure(worker).await?,
            }

            if self.is_drained() {
                self.terminate().await?;
                break;
            }
        }

        info!(
            dispatched = self.dispatched,
            results = self.outcome.results.len(),
            errors = self.outcome.errors.len(),
            "all tasks finished"
        );
        Ok(std::mem::take(&mut self.outcome))
    }

    async fn dispatch(&mut self, worker: WorkerId) -> Result<()> {
        if self.in_flight.get(worker).is_some() {
            return Err(Error::protocol(format!(
                "worker {} asked for work while holding a task",
                worker
            )));
        }

        let Some(item) = self.pending.dequeue_front() else {
            debug!(worker, "queue empty, sending wait");
            return self.transport.send(worker, Message::Directive(Directive::Wait)).await;
        };

        self.in_flight.insert(worker, item.clone())?;
        self.dispatched += 1;
        debug!(worker, function = %item.function(), args = ?item.args(), "dispatching task");

        self.transport.send(worker, Message::Directive(Directive::Task)).await?;
        self.transport.send(worker, Message::Task(item)).await
    }

    async fn collect_result(&mut self, worker: WorkerId) -> Result<()> {
        let value = self.transport.recv_from(worker, Kind::Result).await?.into_result()?;
        let task = self.in_flight.remove(worker)?;
        debug!(
            worker,
            elapsed_ms = task.dispatched_at.elapsed().as_millis() as u64,
            result = %value,
            "task done"
        );

        match self.on_result.as_mut() {
            Some(hook) => hook(
                &mut HookContext {
                    pending: &mut self.pending,
                    outcome: &mut self.outcome,
                },
                value,
            ),
            None => self.outcome.results.push(value),
        }
        Ok(())
    }

    async fn collect_failure(&mut self, worker: WorkerId) -> Result<()> {
        let item = self
            .transport
            .recv_from(worker, Kind::FailedTask)
            .await?
            .into_failed_task()?;
        let task = self.in_flight.remove(worker)?;
        debug!(
            worker,
            elapsed_ms = task.dispatched_at.elapsed().as_millis() as u64,
            args = ?item.args(),
            "task failed"
        );

        self.outcome.errors.push(item.into_args());
        Ok(())
    }

    fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }

    async fn terminate(&mut self) -> Result<()> {
        debug!("all tasks finished, sending end to every worker");
        let workers = self.transport.workers().to_vec();
        for worker in workers {
            debug!(worker, "sending end");
            self.transport.send(worker, Message::Directive(Directive::End)).await?;
        }
        self.terminated = true;
        Ok(())
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::WorkItem;
    use crate::transport::mock::MockCoordinatorTransport;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn ready() -> Message {
        Message::Status(Status::Ready)
    }

    fn done() -> Message {
        Message::Status(Status::Done)
    }

    fn failed() -> Message {
        Message::Status(Status::Error)
    }

    fn ends_sent(transport: &MockCoordinatorTransport, worker: WorkerId) -> usize {
        transport
            .sent_to(worker)
            .iter()
            .filter(|msg| **msg == Message::Directive(Directive::End))
            .count()
    }

    #[test]
    fn test_submit_rejects_bad_input() {
        let mut coordinator = Coordinator::new(MockCoordinatorTransport::new(vec![1]));

        assert!(matches!(coordinator.submit("add", vec![]), Err(Error::InvalidInput(_))));
        assert!(matches!(
            coordinator.submit("add", vec![json!(1), json!(2), json!(3)]),
            Err(Error::InvalidInput(_))
        ));
        assert!(coordinator.pending().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_collect_terminate() {
        let transport = MockCoordinatorTransport::new(vec![1, 2])
            .script(1, ready())
            .script(2, ready())
            .script(2, done())
            .script(2, Message::Result(json!(7)))
            .script(1, done())
            .script(1, Message::Result(json!(3)));

        let mut coordinator = Coordinator::new(transport);
        coordinator.submit("add", vec![json!([1, 2]), json!([3, 4])]).unwrap();
        let outcome = coordinator.run().await.unwrap();

        assert_eq!(outcome.results, vec![json!(7), json!(3)]);
        assert!(outcome.errors.is_empty());
        assert!(coordinator.is_terminated());

        let transport = coordinator.transport();
        assert_eq!(
            transport.sent_to(1),
            vec![
                Message::Directive(Directive::Task),
                Message::Task(WorkItem::new("add".into(), vec![json!(1), json!(2)])),
                Message::Directive(Directive::End),
            ]
        );
        assert_eq!(
            transport.sent_to(2),
            vec![
                Message::Directive(Directive::Task),
                Message::Task(WorkItem::new("add".into(), vec![json!(3), json!(4)])),
                Message::Directive(Directive::End),
            ]
        );
    }

    #[tokio::test]
    async fn test_ready_on_empty_queue_gets_wait() {
        let transport = MockCoordinatorTransport::new(vec![1, 2])
            .script(1, ready())
            .script(2, ready())
            .script(1, done())
            .script(1, Message::Result(json!("ok")));

        let mut coordinator = Coordinator::new(transport);
        coordinator.submit("f", vec![json!([])]).unwrap();
        coordinator.run().await.unwrap();

        let to_two = coordinator.transport().sent_to(2);
        assert_eq!(
            to_two,
            vec![Message::Directive(Directive::Wait), Message::Directive(Directive::End)]
        );
    }

    #[tokio::test]
    async fn test_failures_recorded_not_requeued() {
        let transport = MockCoordinatorTransport::new(vec![1])
            .script(1, ready())
            .script(1, failed())
            .script(1, Message::FailedTask(WorkItem::new("f".into(), vec![json!("a")])))
            .script(1, ready())
            .script(1, failed())
            .script(1, Message::FailedTask(WorkItem::new("f".into(), vec![json!("b")])));

        let mut coordinator = Coordinator::new(transport);
        coordinator.submit("f", vec![json!(["a"]), json!(["b"])]).unwrap();
        let outcome = coordinator.run().await.unwrap();

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.errors, vec![vec![json!("a")], vec![json!("b")]]);

        let tasks_sent = coordinator
            .transport()
            .sent_to(1)
            .iter()
            .filter(|msg| matches!(msg, Message::Task(_)))
            .count();
        assert_eq!(tasks_sent, 2);
    }

    #[tokio::test]
    async fn test_termination_is_idempotent() {
        let transport = MockCoordinatorTransport::new(vec![1, 2, 3])
            .script(2, ready())
            .script(2, done())
            .script(2, Message::Result(json!(1)));

        let mut coordinator = Coordinator::new(transport);
        coordinator.submit("f", vec![json!([])]).unwrap();
        coordinator.run().await.unwrap();

        for worker in [1, 2, 3] {
            assert_eq!(ends_sent(coordinator.transport(), worker), 1);
        }

        assert!(matches!(coordinator.submit("f", vec![json!([])]), Err(Error::Terminated)));
        let again = coordinator.run().await.unwrap();
        assert_eq!(again, Outcome::default());

        let sent = coordinator.transport().sent_messages();
        assert_eq!(sent.iter().filter(|(_, m)| matches!(m, Message::Task(_))).count(), 1);
        for worker in [1, 2, 3] {
            assert_eq!(ends_sent(coordinator.transport(), worker), 1);
        }
    }

    #[tokio::test]
    async fn test_on_result_hook_replaces_append() {
        let transport = MockCoordinatorTransport::new(vec![1])
            .script(1, ready())
            .script(1, done())
            .script(1, Message::Result(json!(4)))
            .script(1, ready())
            .script(1, done())
            .script(1, Message::Result(json!(6)));

        let total = Arc::new(Mutex::new(0i64));
        let sink = Arc::clone(&total);
        let mut coordinator = Coordinator::new(transport).on_result(move |_, value| {
            *sink.lock().unwrap() += value.as_i64().unwrap_or(0);
        });
        coordinator.submit("f", vec![json!([]), json!([])]).unwrap();
        let outcome = coordinator.run().await.unwrap();

        assert!(outcome.results.is_empty());
        assert_eq!(*total.lock().unwrap(), 10);
    }

    #[tokio::test]
    async fn test_on_start_hook_seeds_queue() {
        let transport = MockCoordinatorTransport::new(vec![1])
            .script(1, ready())
            .script(1, done())
            .script(1, Message::Result(json!("seeded")));

        let mut coordinator = Coordinator::new(transport).on_start(|ctx| {
            ctx.pending.submit("seed", vec![json!([1])]).unwrap();
        });
        let outcome = coordinator.run().await.unwrap();

        assert_eq!(outcome.results, vec![json!("seeded")]);
        let sent = coordinator.transport().sent_to(1);
        assert_eq!(sent[1], Message::Task(WorkItem::new("seed".into(), vec![json!(1)])));
    }

    #[tokio::test]
    async fn test_done_without_task_is_protocol_error() {
        let transport = MockCoordinatorTransport::new(vec![1])
            .script(1, done())
            .script(1, Message::Result(json!(1)));

        let mut coordinator = Coordinator::new(transport);
        coordinator.submit("f", vec![json!([])]).unwrap();
        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_ready_while_holding_task_is_protocol_error() {
        let transport = MockCoordinatorTransport::new(vec![1])
            .script(1, ready())
            .script(1, ready());

        let mut coordinator = Coordinator::new(transport);
        coordinator.submit("f", vec![json!([]), json!([])]).unwrap();
        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(coordinator.in_flight().len(), 1);
        assert_eq!(coordinator.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_non_status_signal_is_protocol_error() {
        let transport = MockCoordinatorTransport::new(vec![1]).script(1, Message::Result(json!(1)));

        let mut coordinator = Coordinator::new(transport);
        coordinator.submit("f", vec![json!([])]).unwrap();
        assert!(matches!(coordinator.run().await.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_lost_worker_keeps_task_in_flight() {
        let transport = MockCoordinatorTransport::new(vec![1])
            .script(1, ready())
            .script_error(1, Error::Disconnected("peer closed the connection".to_string()));

        let mut coordinator = Coordinator::new(transport);
        coordinator.submit("f", vec![json!([])]).unwrap();
        let err = coordinator.run().await.unwrap_err();

        assert!(matches!(err, Error::Disconnected(_)));
        assert!(!coordinator.is_terminated());
        assert_eq!(coordinator.in_flight().len(), 1);
        assert!(coordinator.in_flight().get(1).is_some());
    }
}

//! Worker loop
//!
//! A worker asks the coordinator for work, runs what it is given, reports the
//! outcome, and asks again until it is told to stop.
//!
//! # State Machine
//!
//! ```text
//!            send READY
//!   Idle ─────────────────> AwaitingDirective
//!    ^                        │    │     │
//!    │            WAIT ───────┘    │     └─────── END ──> Terminated
//!    │             v               │ TASK
//!    ├──────── Waiting             v
//!    │  (slept)                Computing
//!    └──────────────────────────── ┘ (DONE/ERROR sent)
//! ```
//!
//! A task failure never ends the loop; it is reported as an `error` status
//! followed by the original work item.
//!
//! # Example
//!
//! ```no_run
//! use taskfarm::registry::Registry;
//! use taskfarm::transport::tcp::{local_node_id, TcpWorker};
//! use taskfarm::worker::Worker;
//! use std::time::Duration;
//!
//! # async fn example() -> taskfarm::Result<()> {
//! let transport = TcpWorker::connect("10.0.1.10:9999", local_node_id()).await?;
//! let registry = Registry::new().register("noop", |_| Ok(serde_json::Value::Null));
//! let mut worker = Worker::new(transport, registry, Duration::from_secs(5));
//! let report = worker.run().await?;
//! println!("completed {} tasks", report.tasks_completed);
//! # Ok(())
//! # }
//! ```

pub mod executor;

use crate::error::{Error, Result};
use crate::protocol::{Directive, Kind, Message, Status};
use crate::registry::Registry;
use crate::transport::{WorkerId, WorkerTransport};
use executor::execute_blocking;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a worker is in its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    AwaitingDirective,
    Waiting,
    Computing,
    Terminated,
}

impl WorkerState {
    /// Whether the loop may move from `self` to `next`
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Idle, AwaitingDirective)
                | (AwaitingDirective, Waiting)
                | (AwaitingDirective, Computing)
                | (AwaitingDirective, Terminated)
                | (Waiting, Idle)
                | (Computing, Idle)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Idle => "idle",
            WorkerState::AwaitingDirective => "awaiting-directive",
            WorkerState::Waiting => "waiting",
            WorkerState::Computing => "computing",
            WorkerState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Counters returned when a worker terminates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// `ready` signals sent
    pub requests: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    /// `wait` directives received
    pub waits: usize,
}

/// A worker bound to one transport endpoint
pub struct Worker<T> {
    transport: T,
    registry: Registry,
    wait_interval: Duration,
    state: WorkerState,
    report: WorkerReport,
}

impl<T: WorkerTransport> Worker<T> {
    pub fn new(transport: T, registry: Registry, wait_interval: Duration) -> Self {
        Self {
            transport,
            registry,
            wait_interval,
            state: WorkerState::Idle,
            report: WorkerReport::default(),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.transport.id()
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run until the coordinator sends `end`
    ///
    /// Returns an error only for transport or protocol failures; task
    /// failures are reported to the coordinator and the loop continues.
    /// After such an error the exchange is out of step, and a further call
    /// fails without sending anything.
    pub async fn run(&mut self) -> Result<WorkerReport> {
        if self.state == WorkerState::Terminated {
            return Ok(self.report);
        }
        if self.state != WorkerState::Idle {
            return Err(Error::protocol(format!(
                "worker {} cannot resume from state {}",
                self.id(),
                self.state
            )));
        }

        let id = self.id();
        info!(worker = id, "worker started");

        loop {
            self.transport.send(Message::Status(Status::Ready)).await?;
            self.report.requests += 1;
            self.transition(WorkerState::AwaitingDirective)?;

            let directive = self.transport.recv(Kind::Directive).await?.into_directive()?;
            debug!(worker = id, ?directive, "received directive");

            match directive {
                Directive::Wait => {
                    self.transition(WorkerState::Waiting)?;
                    self.report.waits += 1;
                    tokio::time::sleep(self.wait_interval).await;
                    self.transition(WorkerState::Idle)?;
                }
                Directive::End => {
                    self.transition(WorkerState::Terminated)?;
                    break;
                }
                Directive::Task => {
                    self.transition(WorkerState::Computing)?;
                    self.run_task().await?;
                    self.transition(WorkerState::Idle)?;
                }
            }
        }

        info!(
            worker = id,
            completed = self.report.tasks_completed,
            failed = self.report.tasks_failed,
            "worker terminated"
        );
        Ok(self.report)
    }

    async fn run_task(&mut self) -> Result<()> {
        let id = self.id();
        let item = self.transport.recv(Kind::Task).await?.into_task()?;
        debug!(worker = id, function = %item.function(), args = ?item.args(), "executing task");

        match execute_blocking(&self.registry, &item).await {
            Ok(value) => {
                self.transport.send(Message::Status(Status::Done)).await?;
                self.transport.send(Message::Result(value)).await?;
                self.report.tasks_completed += 1;
            }
            Err(e) => {
                warn!(worker = id, function = %item.function(), args = ?item.args(), error = %e, "task failed");
                self.transport.send(Message::Status(Status::Error)).await?;
                self.transport.send(Message::FailedTask(item)).await?;
                self.report.tasks_failed += 1;
            }
        }
        Ok(())
    }

    fn transition(&mut self, next: WorkerState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::protocol(format!(
                "worker {} cannot move from {} to {}",
                self.id(),
                self.state,
                next
            )));
        }
        self.state = next;
        Ok(())
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

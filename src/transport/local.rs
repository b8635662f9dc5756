//! In-process transport
//!
//! Connects a coordinator and N workers living in the same process through
//! unbounded tokio channels. Used by the local farm and by tests.

use super::mailbox::{Envelope, Mailbox};
use super::{CoordinatorTransport, WorkerId, WorkerTransport};
use crate::error::{Error, Result};
use crate::protocol::{Kind, Message};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Coordinator end of a local pool
pub struct LocalCoordinator {
    workers: Vec<WorkerId>,
    outbound: HashMap<WorkerId, mpsc::UnboundedSender<Message>>,
    mailbox: Mailbox,
}

/// Worker end of a local pool
pub struct LocalWorker {
    id: WorkerId,
    to_coordinator: mpsc::UnboundedSender<Envelope>,
    inbound: mpsc::UnboundedReceiver<Message>,
}

/// Create a coordinator end and `workers` worker ends, identities `1..=workers`
pub fn pool(workers: usize) -> (LocalCoordinator, Vec<LocalWorker>) {
    let (to_coordinator, inbound) = mpsc::unbounded_channel();

    let mut outbound = HashMap::with_capacity(workers);
    let mut worker_ends = Vec::with_capacity(workers);
    for id in 1..=workers {
        let (tx, rx) = mpsc::unbounded_channel();
        outbound.insert(id, tx);
        worker_ends.push(LocalWorker {
            id,
            to_coordinator: to_coordinator.clone(),
            inbound: rx,
        });
    }

    let coordinator = LocalCoordinator {
        workers: (1..=workers).collect(),
        outbound,
        mailbox: Mailbox::new(inbound),
    };

    (coordinator, worker_ends)
}

impl CoordinatorTransport for LocalCoordinator {
    fn workers(&self) -> &[WorkerId] {
        &self.workers
    }

    async fn send(&mut self, to: WorkerId, msg: Message) -> Result<()> {
        let tx = self
            .outbound
            .get(&to)
            .ok_or_else(|| Error::protocol(format!("unknown worker {}", to)))?;
        tx.send(msg)
            .map_err(|_| Error::Disconnected(format!("worker {} is gone", to)))
    }

    async fn recv_any(&mut self, kind: Kind) -> Result<(WorkerId, Message)> {
        self.mailbox.recv_any(kind).await
    }

    async fn recv_from(&mut self, from: WorkerId, kind: Kind) -> Result<Message> {
        self.mailbox.recv_from(from, kind).await
    }
}

impl WorkerTransport for LocalWorker {
    fn id(&self) -> WorkerId {
        self.id
    }

    async fn send(&mut self, msg: Message) -> Result<()> {
        self.to_coordinator
            .send((self.id, Ok(msg)))
            .map_err(|_| Error::Disconnected("coordinator is gone".to_string()))
    }

    async fn recv(&mut self, kind: Kind) -> Result<Message> {
        let msg = self
            .inbound
            .recv()
            .await
            .ok_or_else(|| Error::Disconnected("coordinator is gone".to_string()))?;
        if msg.kind() != kind {
            return Err(Error::protocol(format!(
                "coordinator sent a {} message where {} was expected",
                msg.kind(),
                kind
            )));
        }
        Ok(msg)
    }
}

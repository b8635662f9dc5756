//! Scripted transports for testing
//!
//! The mock transports play back a fixed list of inbound messages and record
//! every message sent through them, so protocol tests can assert the exact
//! exchange without running real peers. When the script runs out, receives
//! fail with `Error::Disconnected`.
//!
//! # Example
//!
//! ```
//! use taskfarm::protocol::{Directive, Message, Status};
//! use taskfarm::transport::mock::MockCoordinatorTransport;
//!
//! let transport = MockCoordinatorTransport::new(vec![1])
//!     .script(1, Message::Status(Status::Ready));
//! let sent = transport.sent_handle();
//! // ... hand `transport` to a Coordinator and run it ...
//! assert!(sent.lock().unwrap().is_empty());
//! ```

use super::mailbox::{Envelope, Mailbox};
use super::{CoordinatorTransport, WorkerId, WorkerTransport};
use crate::error::{Error, Result};
use crate::protocol::{Kind, Message};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Messages recorded by a mock transport, in send order
pub type SentLog = Arc<Mutex<Vec<(WorkerId, Message)>>>;

/// Coordinator-side mock: inbound messages come from a script
pub struct MockCoordinatorTransport {
    workers: Vec<WorkerId>,
    script: Option<mpsc::UnboundedSender<Envelope>>,
    mailbox: Mailbox,
    sent: SentLog,
}

impl MockCoordinatorTransport {
    pub fn new(workers: Vec<WorkerId>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            workers,
            script: Some(tx),
            mailbox: Mailbox::new(rx),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append a message the coordinator will receive from `from`
    pub fn script(self, from: WorkerId, msg: Message) -> Self {
        self.script_envelope((from, Ok(msg)))
    }

    /// Append a transport failure the coordinator will observe
    pub fn script_error(self, from: WorkerId, error: Error) -> Self {
        self.script_envelope((from, Err(error)))
    }

    fn script_envelope(self, envelope: Envelope) -> Self {
        if let Some(tx) = &self.script {
            // the receiving half lives in `self.mailbox`, so this cannot fail
            let _ = tx.send(envelope);
        }
        self
    }

    /// Shared handle to the record of sent messages
    pub fn sent_handle(&self) -> SentLog {
        Arc::clone(&self.sent)
    }

    /// Copy of all sent messages
    pub fn sent_messages(&self) -> Vec<(WorkerId, Message)> {
        self.sent.lock().unwrap().clone()
    }

    /// Messages sent to one worker
    pub fn sent_to(&self, worker: WorkerId) -> Vec<Message> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| *to == worker)
            .map(|(_, msg)| msg.clone())
            .collect()
    }
}

impl CoordinatorTransport for MockCoordinatorTransport {
    fn workers(&self) -> &[WorkerId] {
        &self.workers
    }

    async fn send(&mut self, to: WorkerId, msg: Message) -> Result<()> {
        if !self.workers.contains(&to) {
            return Err(Error::protocol(format!("unknown worker {}", to)));
        }
        self.sent.lock().unwrap().push((to, msg));
        Ok(())
    }

    async fn recv_any(&mut self, kind: Kind) -> Result<(WorkerId, Message)> {
        // close the script so an exhausted script reads as a disconnect
        self.script.take();
        self.mailbox.recv_any(kind).await
    }

    async fn recv_from(&mut self, from: WorkerId, kind: Kind) -> Result<Message> {
        self.script.take();
        self.mailbox.recv_from(from, kind).await
    }
}

/// Worker-side mock: directives and tasks come from a script
pub struct MockWorkerTransport {
    id: WorkerId,
    script: VecDeque<Message>,
    sent: Arc<Mutex<Vec<Message>>>,
}

impl MockWorkerTransport {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            script: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append a message the worker will receive
    pub fn script(mut self, msg: Message) -> Self {
        self.script.push_back(msg);
        self
    }

    /// Shared handle to the record of sent messages
    pub fn sent_handle(&self) -> Arc<Mutex<Vec<Message>>> {
        Arc::clone(&self.sent)
    }
}

impl WorkerTransport for MockWorkerTransport {
    fn id(&self) -> WorkerId {
        self.id
    }

    async fn send(&mut self, msg: Message) -> Result<()> {
        self.sent.lock().unwrap().push(msg);
        Ok(())
    }

    async fn recv(&mut self, kind: Kind) -> Result<Message> {
        let msg = self
            .script
            .pop_front()
            .ok_or_else(|| Error::Disconnected("script exhausted".to_string()))?;
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

//! Message transport between the coordinator and its workers
//!
//! The coordinator and worker loops are written against the two traits in this
//! module and never see how messages actually move. Three implementations ship
//! with the crate:
//!
//! - `local`: in-process channels, one coordinator plus N worker tasks
//! - `tcp`: length-framed MessagePack over TCP, one connection per worker
//! - `mock`: scripted inbound messages and recorded outbound messages for tests
//!
//! # Identities
//!
//! Workers are addressed by [`WorkerId`]. Identity [`COORDINATOR_ID`] (0) is
//! reserved for the coordinator, so workers are numbered `1..=N`.
//!
//! # Message Kinds
//!
//! Every receive names the [`Kind`] it expects, the way a tag selects messages
//! in rank-based message passing. Receiving a different kind from the addressed
//! sender is a protocol violation.

pub mod local;
pub mod mailbox;
pub mod mock;
pub mod tcp;

use crate::protocol::{Kind, Message};
use crate::Result;
use std::future::Future;

/// Identity of a worker
pub type WorkerId = usize;

/// Identity reserved for the coordinator
pub const COORDINATOR_ID: WorkerId = 0;

/// Coordinator side of a transport
pub trait CoordinatorTransport: Send {
    /// All worker identities reachable through this transport
    fn workers(&self) -> &[WorkerId];

    /// Send a message to one worker
    fn send(&mut self, to: WorkerId, msg: Message) -> impl Future<Output = Result<()>> + Send;

    /// Receive the next message of `kind` from any worker, with its sender
    fn recv_any(&mut self, kind: Kind) -> impl Future<Output = Result<(WorkerId, Message)>> + Send;

    /// Receive the next message from a specific worker, which must be of `kind`
    fn recv_from(&mut self, from: WorkerId, kind: Kind) -> impl Future<Output = Result<Message>> + Send;
}

/// Worker side of a transport
pub trait WorkerTransport: Send {
    /// This worker's identity
    fn id(&self) -> WorkerId;

    /// Send a message to the coordinator
    fn send(&mut self, msg: Message) -> impl Future<Output = Result<()>> + Send;

    /// Receive the next message from the coordinator, which must be of `kind`
    fn recv(&mut self, kind: Kind) -> impl Future<Output = Result<Message>> + Send;
}

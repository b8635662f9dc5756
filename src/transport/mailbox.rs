//! Coordinator inbox shared by the channel-backed transports
//!
//! All workers feed one inbound channel. When the coordinator waits for a
//! payload from one worker, messages from other workers that arrive first are
//! stashed and handed out later in arrival order. Per-sender order is never
//! changed.

use super::WorkerId;
use crate::error::{Error, Result};
use crate::protocol::{Kind, Message};
use std::collections::VecDeque;
use tokio::sync::mpsc;

/// One inbound message, or the failure that ended a sender's stream
pub type Envelope = (WorkerId, Result<Message>);

pub struct Mailbox {
    inbound: mpsc::UnboundedReceiver<Envelope>,
    stash: VecDeque<(WorkerId, Message)>,
}

impl Mailbox {
    pub fn new(inbound: mpsc::UnboundedReceiver<Envelope>) -> Self {
        Self {
            inbound,
            stash: VecDeque::new(),
        }
    }

    /// Next message from any sender; it must be of `kind`
    pub async fn recv_any(&mut self, kind: Kind) -> Result<(WorkerId, Message)> {
        let (from, msg) = match self.stash.pop_front() {
            Some(stashed) => stashed,
            None => self.next().await?,
        };
        expect_kind(from, &msg, kind)?;
        Ok((from, msg))
    }

    /// Next message from `from`; it must be of `kind`
    pub async fn recv_from(&mut self, from: WorkerId, kind: Kind) -> Result<Message> {
        if let Some(pos) = self.stash.iter().position(|(sender, _)| *sender == from) {
            if let Some((_, msg)) = self.stash.remove(pos) {
                expect_kind(from, &msg, kind)?;
                return Ok(msg);
            }
        }

        loop {
            let (sender, msg) = self.next().await?;
            if sender == from {
                expect_kind(from, &msg, kind)?;
                return Ok(msg);
            }
            self.stash.push_back((sender, msg));
        }
    }

    /// Number of messages held back for later delivery
    pub fn stashed(&self) -> usize {
        self.stash.len()
    }

    async fn next(&mut self) -> Result<(WorkerId, Message)> {
        match self.inbound.recv().await {
            Some((from, Ok(msg))) => Ok((from, msg)),
            Some((from, Err(e))) => Err(match e {
                Error::Disconnected(reason) => Error::Disconnected(format!("worker {}: {}", from, reason)),
                other => other,
            }),
            None => Err(Error::Disconnected("all workers closed their connections".to_string())),
        }
    }
}

fn expect_kind(from: WorkerId, msg: &Message, kind: Kind) -> Result<()> {
    if msg.kind() == kind {
        Ok(())
    } else {
        Err(Error::protocol(format!(
            "worker {} sent a {} message where {} was expected",
            from,
            msg.kind(),
            kind
        )))
    }
}

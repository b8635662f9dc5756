//! TCP transport
//!
//! The coordinator listens; each worker process connects, sends `HELLO`, and
//! receives `WELCOME` with its identity. After the handshake the coordinator
//! splits every connection: a reader task per worker forwards decoded frames
//! into the shared [`Mailbox`], and the write halves stay with the coordinator.

use super::mailbox::{Envelope, Mailbox};
use super::{CoordinatorTransport, WorkerId, WorkerTransport};
use crate::error::{Error, Result};
use crate::protocol::*;
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How long a new connection may take to send `HELLO`
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Coordinator end of a TCP pool
pub struct TcpCoordinator {
    workers: Vec<WorkerId>,
    writers: HashMap<WorkerId, OwnedWriteHalf>,
    node_ids: HashMap<WorkerId, String>,
    mailbox: Mailbox,
    readers: Vec<JoinHandle<()>>,
}

impl TcpCoordinator {
    /// Bind `addr` and wait until `workers` workers have connected
    pub async fn bind<A: ToSocketAddrs>(addr: A, workers: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Self::accept(listener, workers).await
    }

    /// Accept `workers` handshaken connections on an already bound listener
    ///
    /// Connections that fail the handshake, or stay silent for longer than
    /// [`HANDSHAKE_TIMEOUT`], are dropped and do not count.
    pub async fn accept(listener: TcpListener, workers: usize) -> Result<Self> {
        Self::accept_with_timeout(listener, workers, HANDSHAKE_TIMEOUT).await
    }

    /// Like [`accept`](Self::accept) with a custom handshake deadline
    pub async fn accept_with_timeout(
        listener: TcpListener,
        workers: usize,
        handshake_timeout: Duration,
    ) -> Result<Self> {
        info!(addr = ?listener.local_addr().ok(), workers, "waiting for workers to connect");

        let (tx, inbound) = mpsc::unbounded_channel();
        let mut writers = HashMap::with_capacity(workers);
        let mut node_ids = HashMap::with_capacity(workers);
        let mut readers = Vec::with_capacity(workers);

        let mut next_id: WorkerId = 1;
        while next_id <= workers {
            let (mut stream, peer) = listener.accept().await?;

            let hello = match tokio::time::timeout(handshake_timeout, handshake(&mut stream, next_id)).await {
                Ok(Ok(hello)) => hello,
                Ok(Err(e)) => {
                    warn!(%peer, error = %e, "rejected worker connection");
                    continue;
                }
                Err(_) => {
                    warn!(%peer, timeout_ms = handshake_timeout.as_millis() as u64, "handshake timed out");
                    continue;
                }
            };

            info!(worker = next_id, %peer, node = %hello.node_id, "worker connected");

            let (read_half, write_half) = stream.into_split();
            readers.push(tokio::spawn(forward_frames(next_id, read_half, tx.clone())));
            writers.insert(next_id, write_half);
            node_ids.insert(next_id, hello.node_id);
            next_id += 1;
        }

        Ok(Self {
            workers: (1..=workers).collect(),
            writers,
            node_ids,
            mailbox: Mailbox::new(inbound),
            readers,
        })
    }

    /// Node identifier reported by a worker during the handshake
    pub fn node_id(&self, worker: WorkerId) -> Option<&str> {
        self.node_ids.get(&worker).map(String::as_str)
    }

    /// Wait until every worker has closed its connection
    ///
    /// Call after `end` has been broadcast. A worker that was sleeping on a
    /// `wait` still sends one last `ready` before it reads `end`, so the
    /// connections must stay open until the workers hang up.
    pub async fn shutdown(mut self) -> Result<()> {
        for reader in self.readers.drain(..) {
            reader.await?;
        }
        debug!("all worker connections closed");
        Ok(())
    }
}

impl Drop for TcpCoordinator {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

async fn handshake(stream: &mut TcpStream, worker_id: WorkerId) -> Result<HelloMessage> {
    let hello = read_message(stream).await?.into_hello()?;
    if hello.protocol_version != PROTOCOL_VERSION {
        return Err(Error::protocol(format!(
            "protocol version mismatch: coordinator={}, worker={}",
            PROTOCOL_VERSION, hello.protocol_version
        )));
    }

    let welcome = WelcomeMessage {
        protocol_version: PROTOCOL_VERSION,
        worker_id,
    };
    write_message(stream, &Message::Welcome(welcome)).await?;
    Ok(hello)
}

/// Forward frames from one worker until its stream ends or fails
async fn forward_frames(worker: WorkerId, mut read_half: OwnedReadHalf, tx: mpsc::UnboundedSender<Envelope>) {
    loop {
        let frame = read_message(&mut read_half).await;
        let failed = frame.is_err();
        if tx.send((worker, frame)).is_err() || failed {
            debug!(worker, "reader stopped");
            break;
        }
    }
}

impl CoordinatorTransport for TcpCoordinator {
    fn workers(&self) -> &[WorkerId] {
        &self.workers
    }

    async fn send(&mut self, to: WorkerId, msg: Message) -> Result<()> {
        let writer = self
            .writers
            .get_mut(&to)
            .ok_or_else(|| Error::protocol(format!("unknown worker {}", to)))?;
        write_message(writer, &msg).await
    }

    async fn recv_any(&mut self, kind: Kind) -> Result<(WorkerId, Message)> {
        self.mailbox.recv_any(kind).await
    }

    async fn recv_from(&mut self, from: WorkerId, kind: Kind) -> Result<Message> {
        self.mailbox.recv_from(from, kind).await
    }
}

/// Worker end of a TCP connection
pub struct TcpWorker {
    id: WorkerId,
    stream: TcpStream,
}

impl TcpWorker {
    /// Connect to the coordinator and complete the handshake
    pub async fn connect<A: ToSocketAddrs>(addr: A, node_id: impl Into<String>) -> Result<Self> {
        let mut stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let hello = HelloMessage {
            protocol_version: PROTOCOL_VERSION,
            node_id: node_id.into(),
        };
        write_message(&mut stream, &Message::Hello(hello)).await?;

        let welcome = read_message(&mut stream).await?.into_welcome()?;
        if welcome.protocol_version != PROTOCOL_VERSION {
            return Err(Error::protocol(format!(
                "protocol version mismatch: coordinator={}, worker={}",
                welcome.protocol_version, PROTOCOL_VERSION
            )));
        }

        debug!(worker = welcome.worker_id, "handshake complete");
        Ok(Self {
            id: welcome.worker_id,
            stream,
        })
    }
}

impl WorkerTransport for TcpWorker {
    fn id(&self) -> WorkerId {
        self.id
    }

    async fn send(&mut self, msg: Message) -> Result<()> {
        write_message(&mut self.stream, &msg).await
    }

    async fn recv(&mut self, kind: Kind) -> Result<Message> {
        let msg = read_message(&mut self.stream).await?;
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

/// Node identifier for handshakes: the hostname, or "unknown"
pub fn local_node_id() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

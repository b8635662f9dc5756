//! Coordinator/worker protocol
//!
//! Defines the messages exchanged between the coordinator and its workers and
//! the frame format used when they travel over a byte stream.
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                      Worker
//!     |                              |
//!     |<------- STATUS(ready) -------|
//!     |-------- DIRECTIVE(task) ---->|
//!     |-------- TASK(item) --------->|
//!     |                              |  (computes)
//!     |<------- STATUS(done) --------|
//!     |<------- RESULT(value) -------|
//!     |                              |
//!     |<------- STATUS(ready) -------|
//!     |-------- DIRECTIVE(wait) ---->|  (sleeps, then ready again)
//!     |                              |
//!     |<------- STATUS(error) -------|
//!     |<------- FAILED_TASK(item) ---|
//!     |                              |
//!     |-------- DIRECTIVE(end) ----->|  (once queue and in-flight set are empty)
//! ```
//!
//! Over TCP a worker first sends `HELLO(protocol_version, node_id)` and the
//! coordinator answers `WELCOME(worker_id)` before the loop above starts.
//!
//! # Message Framing
//!
//! Each message is prefixed with a 4-byte length field (little-endian u32):
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use crate::error::{Error, Result};
use crate::task::WorkItem;
use crate::transport::WorkerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Checked during the TCP handshake; coordinator and workers must match.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound for a single frame body
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Worker → coordinator status signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Idle and asking for work
    Ready,
    /// Finished a task; a `Result` payload follows
    Done,
    /// A task failed; a `FailedTask` payload follows
    Error,
}

/// Coordinator → worker directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    /// A `Task` payload follows
    Task,
    /// Nothing to hand out right now; ask again after the wait interval
    Wait,
    /// Stop the worker loop
    End,
}

/// Handshake sent by a worker right after connecting over TCP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloMessage {
    pub protocol_version: u32,

    /// Node identifier (hostname)
    pub node_id: String,
}

/// Handshake reply assigning the worker its identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeMessage {
    pub protocol_version: u32,
    pub worker_id: WorkerId,
}

/// Protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Connection handshake (Worker → Coordinator, TCP only)
    Hello(HelloMessage),

    /// Handshake reply (Coordinator → Worker, TCP only)
    Welcome(WelcomeMessage),

    /// Status signal (Worker → Coordinator)
    Status(Status),

    /// Directive (Coordinator → Worker)
    Directive(Directive),

    /// Work item payload (Coordinator → Worker), follows `Directive::Task`
    Task(WorkItem),

    /// Result payload (Worker → Coordinator), follows `Status::Done`
    Result(Value),

    /// Original work item echoed back (Worker → Coordinator), follows `Status::Error`
    FailedTask(WorkItem),
}

/// Message kind, the equivalent of a tag in rank-based message passing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Hello,
    Welcome,
    Status,
    Directive,
    Task,
    Result,
    FailedTask,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Hello => "hello",
            Kind::Welcome => "welcome",
            Kind::Status => "status",
            Kind::Directive => "directive",
            Kind::Task => "task",
            Kind::Result => "result",
            Kind::FailedTask => "failed-task",
        };
        f.write_str(name)
    }
}

impl Message {
    pub fn kind(&self) -> Kind {
        match self {
            Message::Hello(_) => Kind::Hello,
            Message::Welcome(_) => Kind::Welcome,
            Message::Status(_) => Kind::Status,
            Message::Directive(_) => Kind::Directive,
            Message::Task(_) => Kind::Task,
            Message::Result(_) => Kind::Result,
            Message::FailedTask(_) => Kind::FailedTask,
        }
    }

    pub fn into_status(self) -> Result<Status> {
        match self {
            Message::Status(status) => Ok(status),
            other => Err(unexpected(Kind::Status, &other)),
        }
    }

    pub fn into_directive(self) -> Result<Directive> {
        match self {
            Message::Directive(directive) => Ok(directive),
            other => Err(unexpected(Kind::Directive, &other)),
        }
    }

    pub fn into_task(self) -> Result<WorkItem> {
        match self {
            Message::Task(item) => Ok(item),
            other => Err(unexpected(Kind::Task, &other)),
        }
    }

    pub fn into_result(self) -> Result<Value> {
        match self {
            Message::Result(value) => Ok(value),
            other => Err(unexpected(Kind::Result, &other)),
        }
    }

    pub fn into_failed_task(self) -> Result<WorkItem> {
        match self {
            Message::FailedTask(item) => Ok(item),
            other => Err(unexpected(Kind::FailedTask, &other)),
        }
    }

    pub fn into_hello(self) -> Result<HelloMessage> {
        match self {
            Message::Hello(hello) => Ok(hello),
            other => Err(unexpected(Kind::Hello, &other)),
        }
    }

    pub fn into_welcome(self) -> Result<WelcomeMessage> {
        match self {
            Message::Welcome(welcome) => Ok(welcome),
            other => Err(unexpected(Kind::Welcome, &other)),
        }
    }
}

fn unexpected(expected: Kind, got: &Message) -> Error {
    Error::protocol(format!("expected {} message, got {}", expected, got.kind()))
}

/// Serialize a message to a length-prefixed frame
pub fn serialize_message(msg: &Message) -> Result<Vec<u8>> {
    let msg_bytes = rmp_serde::to_vec(msg)?;

    let msg_len = u32::try_from(msg_bytes.len())
        .ok()
        .filter(|len| *len as usize <= MAX_FRAME_LEN)
        .ok_or_else(|| Error::protocol(format!("message too large: {} bytes", msg_bytes.len())))?;

    let mut framed = Vec::with_capacity(4 + msg_bytes.len());
    framed.extend_from_slice(&msg_len.to_le_bytes());
    framed.extend_from_slice(&msg_bytes);

    Ok(framed)
}

/// Deserialize a message from a buffer holding at least one complete frame
///
/// Returns (message, bytes_consumed) where bytes_consumed includes the length prefix.
pub fn deserialize_message(buf: &[u8]) -> Result<(Message, usize)> {
    if buf.len() < 4 {
        return Err(Error::protocol(format!(
            "buffer too small for message length (need 4 bytes, got {})",
            buf.len()
        )));
    }

    let msg_len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if msg_len > MAX_FRAME_LEN {
        return Err(Error::protocol(format!("message too large: {} bytes", msg_len)));
    }
    if buf.len() < 4 + msg_len {
        return Err(Error::protocol(format!(
            "incomplete message (need {} bytes, got {})",
            4 + msg_len,
            buf.len()
        )));
    }

    let msg = rmp_serde::from_slice(&buf[4..4 + msg_len])?;
    Ok((msg, 4 + msg_len))
}

/// Read one framed message from a stream
///
/// Returns `Error::Disconnected` if the peer closed the stream before a new frame began.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(Error::Disconnected("peer closed the connection".to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    let msg_len = u32::from_le_bytes(len_buf) as usize;
    if msg_len > MAX_FRAME_LEN {
        return Err(Error::protocol(format!("message too large: {} bytes", msg_len)));
    }

    let mut msg_buf = vec![0u8; msg_len];
    reader.read_exact(&mut msg_buf).await?;

    Ok(rmp_serde::from_slice(&msg_buf)?)
}

/// Write one framed message to a stream and flush it
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, msg: &Message) -> Result<()> {
    let framed = serialize_message(msg)?;
    writer.write_all(&framed).await?;
    writer.flush().await?;
    Ok(())
}

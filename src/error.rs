//! Error types for taskfarm
//!
//! Task execution failures are not errors here: a failing work function is
//! contained at the worker and reported as an `error` status. This enum covers
//! what can actually stop a coordinator or worker loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed submission (empty argument sets, or a set that is not a list)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A peer sent something the protocol does not allow at this point
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Work was submitted after the coordinator broadcast `end`
    #[error("coordinator already terminated")]
    Terminated,

    /// The transport lost its peer
    #[error("disconnected: {0}")]
    Disconnected(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// A worker task spawned by the local farm panicked or was cancelled
    #[error("worker task failed: {0}")]
    WorkerTask(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }
}

//! taskfarm - coordinator/worker task distribution
//!
//! One coordinator owns a queue of work items and hands them out to a pool
//! of workers that ask for work when they are idle. Results and failed
//! argument sets flow back to the coordinator, which stops every worker once
//! the queue is drained and nothing is in flight.
//!
//! # Architecture
//!
//! - **Coordinator**: pending queue, in-flight set, termination broadcast
//! - **Worker**: ready/directive loop with a fixed back-off on `wait`
//! - **Registry**: work functions are named, never shipped
//! - **Transports**: in-process channels, TCP with MessagePack frames, scripted mocks
//! - **Farm**: coordinator plus local workers in one call

pub mod builtins;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod farm;
pub mod output;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod task;
pub mod transport;
pub mod worker;

// Re-export commonly used types
pub use config::FarmConfig;
pub use coordinator::Coordinator;
pub use error::{Error, Result};
pub use registry::Registry;
pub use task::{FunctionId, Outcome, WorkItem};
pub use worker::Worker;

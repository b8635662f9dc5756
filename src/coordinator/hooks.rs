//! Caller-supplied hooks run by the coordinator

use crate::queue::PendingQueue;
use crate::task::Outcome;
use serde_json::Value;

/// What a hook may touch: the pending queue and the collected outcome
///
/// In-flight tasks are not reachable from a hook.
pub struct HookContext<'a> {
    pub pending: &'a mut PendingQueue,
    pub outcome: &'a mut Outcome,
}

/// Runs once before the main loop; may seed or reshape the pending queue
pub type StartHook = Box<dyn FnOnce(&mut HookContext<'_>) + Send>;

/// Receives every result in place of the default append to `Outcome::results`
pub type ResultHook = Box<dyn FnMut(&mut HookContext<'_>, Value) + Send>;

//! Task lifecycle phases.

use serde::{Deserialize, Serialize};

/// Where a task is in its lifecycle, derived from its flags.
///
/// State transitions:
/// - Pending -> AwaitingDispatch -> Delivered -> CleanupPending -> (removed)
/// - Pending -> AwaitingDispatch -> CleanupPending -> (removed), when dropped at dispatch
/// - Pending -> CleanupPending -> (removed), when the query fails
///
/// `Delivered` has no automatic exit: the callback owns the task until it
/// asks for cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    /// Not executed yet.
    Pending,

    /// Executed, dispatcher has not looked at it.
    AwaitingDispatch,

    /// Handed to a callback; waiting for an explicit free.
    Delivered,

    /// Marked for removal by the worker's next pass.
    CleanupPending,
}

impl TaskPhase {
    /// Whether the worker will remove the task on its next pass.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskPhase::CleanupPending)
    }
}

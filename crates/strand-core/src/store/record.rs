//! Task record: one queued query, its delivery context and its result.
//!
//! Field ownership between the two threads:
//! - Set at creation and immutable afterwards: everything in [`QueryRequest`].
//! - Written once by the worker: the execution outcome (result or failure).
//! - Written by the host thread: `complete`, and `cleanup` on free/drop.
//!   The worker also sets `cleanup`, but only when publishing a failure.
//!
//! The outcome is a `OnceLock`, so publishing the result and flagging the
//! task as done is one operation and a reader that sees `done` also sees
//! the result.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use chrono::{DateTime, Utc};

use super::TaskPhase;
use crate::domain::{CallbackRef, EntityId, Epoch, IdentityToken, LookupError, TaskArgument, TaskId};
use crate::ports::ResultSet;

/// Maximum query length in bytes, including the terminator slot.
pub const MAX_QUERY_LEN: usize = 1024;

/// Host object a task is bound to, with its identity at creation time.
///
/// `identity` is `None` when the object did not exist when the task was
/// created; such a task is never delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTarget {
    pub entity: EntityId,
    pub identity: Option<IdentityToken>,
}

/// Everything the caller decides at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    query: String,
    epoch: Epoch,
    callback: Option<CallbackRef>,
    argument: Option<TaskArgument>,
    target: Option<TaskTarget>,
    save: bool,
}

impl QueryRequest {
    /// New request created during `epoch`. Overlong query text is truncated.
    pub fn new(query: impl Into<String>, epoch: Epoch) -> Self {
        Self {
            query: bounded_query(query.into()),
            epoch,
            callback: None,
            argument: None,
            target: None,
            save: true,
        }
    }

    pub fn with_callback(mut self, callback: Option<CallbackRef>) -> Self {
        self.callback = callback;
        self
    }

    pub fn with_argument(mut self, argument: Option<TaskArgument>) -> Self {
        self.argument = argument;
        self
    }

    pub fn with_target(mut self, target: TaskTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Execute the query but never deliver its result.
    pub fn nosave(mut self) -> Self {
        self.save = false;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

fn bounded_query(mut query: String) -> String {
    let limit = MAX_QUERY_LEN - 1;
    if query.len() > limit {
        let mut cut = limit;
        while !query.is_char_boundary(cut) {
            cut -= 1;
        }
        query.truncate(cut);
    }
    query
}

enum Execution {
    Succeeded(Mutex<Box<dyn ResultSet>>),
    Failed,
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Execution::Succeeded(_) => f.write_str("Succeeded(..)"),
            Execution::Failed => f.write_str("Failed"),
        }
    }
}

/// A live task. Owned by the [`super::TaskStore`]; shared as `Arc<Task>`.
#[derive(Debug)]
pub struct Task {
    id: TaskId,
    request: QueryRequest,
    created_at: DateTime<Utc>,
    execution: OnceLock<Execution>,
    complete: AtomicBool,
    cleanup: AtomicBool,
}

impl Task {
    pub(crate) fn new(id: TaskId, request: QueryRequest) -> Self {
        Self {
            id,
            request,
            created_at: Utc::now(),
            execution: OnceLock::new(),
            complete: AtomicBool::new(false),
            cleanup: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn query(&self) -> &str {
        &self.request.query
    }

    pub fn epoch(&self) -> Epoch {
        self.request.epoch
    }

    pub fn callback(&self) -> Option<CallbackRef> {
        self.request.callback
    }

    pub fn argument(&self) -> Option<&TaskArgument> {
        self.request.argument.as_ref()
    }

    pub fn target(&self) -> Option<TaskTarget> {
        self.request.target
    }

    pub fn save(&self) -> bool {
        self.request.save
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Execution was attempted and its outcome published.
    pub fn is_done(&self) -> bool {
        self.execution.get().is_some()
    }

    pub fn has_failed(&self) -> bool {
        matches!(self.execution.get(), Some(Execution::Failed))
    }

    pub fn has_result(&self) -> bool {
        matches!(self.execution.get(), Some(Execution::Succeeded(_)))
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn cleanup_requested(&self) -> bool {
        self.cleanup.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> TaskPhase {
        if self.cleanup_requested() {
            TaskPhase::CleanupPending
        } else if !self.is_done() {
            TaskPhase::Pending
        } else if !self.is_complete() {
            TaskPhase::AwaitingDispatch
        } else {
            TaskPhase::Delivered
        }
    }

    /// Worker only. Returns `false` if an outcome was already published.
    pub(crate) fn publish_result(&self, result: Box<dyn ResultSet>) -> bool {
        self.execution
            .set(Execution::Succeeded(Mutex::new(result)))
            .is_ok()
    }

    /// Worker only. A failed task is finalized: no result, no dispatch.
    pub(crate) fn publish_failure(&self) -> bool {
        let published = self.execution.set(Execution::Failed).is_ok();
        if published {
            self.cleanup.store(true, Ordering::Release);
        }
        published
    }

    /// Dispatcher only. `true` exactly once, on the false -> true transition.
    pub(crate) fn mark_complete(&self) -> bool {
        debug_assert!(self.is_done(), "complete implies done");
        !self.complete.swap(true, Ordering::AcqRel)
    }

    /// Idempotent.
    pub(crate) fn request_cleanup(&self) {
        self.cleanup.store(true, Ordering::Release);
    }

    /// Run `f` against the result set.
    pub fn with_result<R>(
        &self,
        f: impl FnOnce(&mut dyn ResultSet) -> R,
    ) -> Result<R, LookupError> {
        match self.execution.get() {
            Some(Execution::Succeeded(result)) => {
                let mut guard = result.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(f(guard.as_mut()))
            }
            _ => Err(LookupError::ResultUnavailable(self.id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::MaterializedResult;

    fn task() -> Task {
        Task::new(TaskId::new(1), QueryRequest::new("SELECT 1", Epoch::new(1)))
    }

    #[test]
    fn new_task_is_pending() {
        let t = task();
        assert!(!t.is_done());
        assert!(!t.is_complete());
        assert!(!t.cleanup_requested());
        assert!(t.save());
        assert_eq!(t.phase(), TaskPhase::Pending);
    }

    #[test]
    fn result_is_published_once() {
        let t = task();
        assert!(t.publish_result(Box::new(MaterializedResult::empty())));
        assert!(!t.publish_result(Box::new(MaterializedResult::empty())));
        assert!(!t.publish_failure());
        assert!(t.is_done());
        assert!(t.has_result());
        assert!(!t.cleanup_requested());
        assert_eq!(t.phase(), TaskPhase::AwaitingDispatch);
    }

    #[test]
    fn failure_finalizes_without_result() {
        let t = task();
        assert!(t.publish_failure());
        assert!(t.is_done());
        assert!(t.has_failed());
        assert!(!t.has_result());
        assert!(t.cleanup_requested());
        assert_eq!(
            t.with_result(|r| r.num_rows()),
            Err(LookupError::ResultUnavailable(TaskId::new(1)))
        );
    }

    #[test]
    fn complete_transitions_exactly_once() {
        let t = task();
        t.publish_result(Box::new(MaterializedResult::empty()));
        assert!(t.mark_complete());
        assert!(!t.mark_complete());
        assert_eq!(t.phase(), TaskPhase::Delivered);
    }

    #[test]
    fn result_unavailable_before_execution() {
        let t = task();
        assert!(t.with_result(|r| r.num_fields()).is_err());
    }

    #[test]
    fn long_query_is_truncated_on_char_boundary() {
        let long = "é".repeat(MAX_QUERY_LEN);
        let request = QueryRequest::new(long, Epoch::new(0));
        assert!(request.query().len() <= MAX_QUERY_LEN - 1);
        assert!(request.query().chars().all(|c| c == 'é'));

        let exact = "x".repeat(MAX_QUERY_LEN - 1);
        assert_eq!(QueryRequest::new(exact.clone(), Epoch::new(0)).query(), exact);
    }

    #[test]
    fn nosave_request() {
        let request = QueryRequest::new("DELETE FROM t", Epoch::new(2))
            .with_callback(Some(CallbackRef::new(9)))
            .nosave();
        let t = Task::new(TaskId::new(3), request);
        assert!(!t.save());
        assert_eq!(t.callback(), Some(CallbackRef::new(9)));
        assert_eq!(t.epoch(), Epoch::new(2));
    }
}

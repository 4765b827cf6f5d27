//! Dispatcher - 結果の配送（ホストスレッド専用）
//!
//! Runs once per host tick. Visits done tasks in creation order, flips
//! `complete` and either invokes the task's callback or marks the task for
//! cleanup. A delivered task stays alive: the callback owns it until it
//! frees it.

use serde::Serialize;

use crate::domain::{HostValue, TaskId};
use crate::ports::HostRuntime;
use crate::store::{Task, TaskStore};

/// Why a finished task was dropped instead of delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    RuntimeInactive,
    NotSaved,
    NoCallback,
    /// Created in an earlier session/round.
    StaleEpoch,
    /// The target did not exist at creation or no longer exists.
    TargetMissing,
    /// The target slot now holds a different object.
    TargetRecycled,
}

/// What one dispatch tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: Vec<TaskId>,
    pub dropped: Vec<(TaskId, DropReason)>,
}

impl DispatchReport {
    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty() && self.dropped.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher;

impl Dispatcher {
    pub fn new() -> Self {
        Self
    }

    /// One dispatch tick. Must be called from the host thread.
    pub fn check_done<H>(&self, store: &TaskStore, host: &mut H) -> DispatchReport
    where
        H: HostRuntime + ?Sized,
    {
        let mut report = DispatchReport::default();

        for entry in store.snapshot() {
            let task = &entry.task;

            // failed tasks were finalized by the worker
            if !task.is_done() || task.has_failed() {
                continue;
            }
            if !task.mark_complete() {
                continue;
            }

            match eligibility(task, host) {
                Ok(()) => {
                    deliver(task, host);
                    report.delivered.push(task.id());
                }
                Err(reason) => {
                    task.request_cleanup();
                    tracing::debug!(task_id = %task.id(), ?reason, "delivery dropped");
                    report.dropped.push((task.id(), reason));
                }
            }
        }

        report
    }
}

fn eligibility<H>(task: &Task, host: &H) -> Result<(), DropReason>
where
    H: HostRuntime + ?Sized,
{
    if !host.is_active() {
        return Err(DropReason::RuntimeInactive);
    }
    if !task.save() {
        return Err(DropReason::NotSaved);
    }
    if task.callback().is_none() {
        return Err(DropReason::NoCallback);
    }
    if task.epoch() != host.current_epoch() {
        return Err(DropReason::StaleEpoch);
    }
    if let Some(target) = task.target() {
        let Some(expected) = target.identity else {
            return Err(DropReason::TargetMissing);
        };
        match host.identity_of(target.entity) {
            None => return Err(DropReason::TargetMissing),
            Some(live) if live != expected => return Err(DropReason::TargetRecycled),
            Some(_) => {}
        }
    }
    Ok(())
}

fn deliver<H>(task: &Task, host: &mut H)
where
    H: HostRuntime + ?Sized,
{
    let Some(callback) = task.callback() else {
        return;
    };

    let mut args = vec![HostValue::Int(task.id().get())];
    if let Some(argument) = task.argument() {
        args.push(HostValue::from(argument));
    }

    let target = task.target().map(|t| t.entity);
    let thread = host.invoke(callback, target, args);
    host.free_thread(thread);
    tracing::debug!(task_id = %task.id(), %callback, "result delivered");
}

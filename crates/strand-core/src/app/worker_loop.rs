//! WorkerLoop - クエリ実行ループ
//!
//! One pass:
//! 1. snapshot the store (creation order)
//! 2. execute every task that is not done yet, one at a time, on the
//!    single connection; the store lock is not held while a query runs
//! 3. remove every task whose cleanup flag is set
//!
//! Passes repeat every `poll_interval` until shutdown is requested.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::Serialize;

use super::status::SharedStatus;
use crate::ports::Connection;
use crate::store::{Task, TaskStore};

/// What one worker pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Execution attempts, failed ones included.
    pub executed: usize,
    pub failed: usize,
    pub removed: usize,
}

impl PassReport {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Worker-side state. Owns the connection for its whole life.
pub struct WorkerLoop {
    store: Arc<TaskStore>,
    connection: Box<dyn Connection>,
    status: Arc<SharedStatus>,
}

impl WorkerLoop {
    pub fn new(
        store: Arc<TaskStore>,
        connection: Box<dyn Connection>,
        status: Arc<SharedStatus>,
    ) -> Self {
        Self {
            store,
            connection,
            status,
        }
    }

    /// Run a single pass over the store.
    pub fn run_pass(&mut self) -> PassReport {
        let mut report = PassReport::default();

        for entry in self.store.snapshot() {
            if !entry.task.is_done() {
                self.execute(&entry.task, &mut report);
            }

            if entry.task.cleanup_requested() && self.store.remove_and_release(entry.key) {
                report.removed += 1;
            }
        }

        report
    }

    fn execute(&mut self, task: &Task, report: &mut PassReport) {
        report.executed += 1;

        match self.connection.execute(task.query()) {
            Ok(result) => {
                self.status.record_success(self.connection.affected_rows());
                task.publish_result(result);
                tracing::debug!(task_id = %task.id(), "query executed");
            }
            Err(err) => {
                report.failed += 1;
                self.status.record_failure(&err);
                task.publish_failure();
                tracing::warn!(
                    task_id = %task.id(),
                    code = err.code,
                    error = %err.message,
                    "query failed"
                );
            }
        }
    }

    /// Loop until `shutdown` fires or its sender is dropped.
    ///
    /// An in-flight query always finishes; shutdown is only observed
    /// between passes.
    pub fn run(mut self, shutdown: Receiver<()>, poll_interval: Duration) {
        tracing::info!(poll_ms = poll_interval.as_millis() as u64, "query worker started");

        loop {
            let report = self.run_pass();
            if !report.is_idle() {
                tracing::debug!(
                    executed = report.executed,
                    failed = report.failed,
                    removed = report.removed,
                    "worker pass"
                );
            }

            match shutdown.recv_timeout(poll_interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::info!("query worker stopped");
    }
}

/// Handle to the background worker thread.
/// - `request_shutdown()` drops the sender; the thread stops after its current pass
/// - `shutdown_and_join()` also waits for it (and for the connection to close)
pub struct Worker {
    shutdown_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(worker: WorkerLoop, poll_interval: Duration) -> io::Result<Self> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let join = thread::Builder::new()
            .name("strand-worker".to_string())
            .spawn(move || worker.run(shutdown_rx, poll_interval))?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            join: Some(join),
        })
    }

    pub fn request_shutdown(&mut self) {
        // disconnect wakes the worker out of recv_timeout
        self.shutdown_tx.take();
    }

    pub fn shutdown_and_join(mut self) {
        self.request_shutdown();
        if let Some(join) = self.join.take()
            && join.join().is_err()
        {
            tracing::warn!("query worker panicked");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.request_shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Epoch, TaskId};
    use crate::store::QueryRequest;
    use crate::testing::ScriptedConnector;
    use std::time::Instant;

    fn setup() -> (Arc<TaskStore>, Arc<SharedStatus>, ScriptedConnector, WorkerLoop) {
        let store = Arc::new(TaskStore::new());
        let status = Arc::new(SharedStatus::new());
        let connector = ScriptedConnector::new();
        let worker = WorkerLoop::new(Arc::clone(&store), connector.connection(), Arc::clone(&status));
        (store, status, connector, worker)
    }

    fn create(store: &TaskStore, query: &str) -> TaskId {
        store.create(QueryRequest::new(query, Epoch::new(1)))
    }

    #[test]
    fn executes_in_creation_order() {
        let (store, _status, connector, mut worker) = setup();
        create(&store, "SELECT 1");
        create(&store, "SELECT 2");
        create(&store, "SELECT 3");

        let report = worker.run_pass();
        assert_eq!(report.executed, 3);
        assert_eq!(connector.executed(), vec!["SELECT 1", "SELECT 2", "SELECT 3"]);

        // done tasks are not executed again
        assert!(worker.run_pass().is_idle());
        assert_eq!(connector.executed().len(), 3);
    }

    #[test]
    fn successful_task_keeps_its_result() {
        let (store, status, _connector, mut worker) = setup();
        let id = create(&store, "SELECT 1");

        worker.run_pass();
        let task = store.lookup(id).unwrap();
        assert!(task.is_done());
        assert!(task.has_result());
        assert!(!task.cleanup_requested());
        assert_eq!(status.snapshot().errno, 0);
    }

    #[test]
    fn failed_task_is_removed_in_the_same_pass() {
        let (store, status, _connector, mut worker) = setup();
        let id = create(&store, "FAIL please");

        let report = worker.run_pass();
        assert_eq!(report, PassReport { executed: 1, failed: 1, removed: 1 });
        assert!(store.lookup(id).is_none());

        let snap = status.snapshot();
        assert_eq!(snap.errno, ScriptedConnector::FAIL_CODE);
        assert!(!snap.error.is_empty());
    }

    #[test]
    fn cleanup_releases_result_exactly_once() {
        let (store, _status, connector, mut worker) = setup();
        let id = create(&store, "SELECT 1");
        worker.run_pass();
        assert_eq!(connector.released(), 0);

        assert!(store.mark_for_cleanup(id));
        assert_eq!(worker.run_pass().removed, 1);
        assert_eq!(connector.released(), 1);
        assert!(store.lookup(id).is_none());

        // unknown id: no-op
        assert!(!store.mark_for_cleanup(id));
        assert!(worker.run_pass().is_idle());
        assert_eq!(connector.released(), 1);
    }

    #[test]
    fn freed_before_execution_still_runs_once() {
        let (store, _status, connector, mut worker) = setup();
        let id = create(&store, "UPDATE t SET x = 1");
        store.mark_for_cleanup(id);

        let report = worker.run_pass();
        assert_eq!(report.executed, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(connector.executed(), vec!["UPDATE t SET x = 1"]);
        assert_eq!(connector.released(), 1);
    }

    #[test]
    fn background_worker_executes_and_shuts_down() {
        let store = Arc::new(TaskStore::new());
        let status = Arc::new(SharedStatus::new());
        let connector = ScriptedConnector::new();
        let id = create(&store, "SELECT 1");

        let worker = Worker::spawn(
            WorkerLoop::new(Arc::clone(&store), connector.connection(), status),
            Duration::from_millis(1),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !store.lookup(id).unwrap().is_done() {
            assert!(Instant::now() < deadline, "worker never executed the task");
            thread::sleep(Duration::from_millis(1));
        }

        worker.shutdown_and_join();
        assert!(connector.connection_closed());
    }
}

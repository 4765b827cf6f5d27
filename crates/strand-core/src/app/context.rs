//! QueryContext - 接続・タスクストア・ワーカーの所有者
//!
//! Built once by `initialize`, passed to every host-side operation, torn
//! down by `close`. Holds no global state.

use std::sync::Arc;

use super::dispatcher::{DispatchReport, Dispatcher};
use super::status::{ConnectionStatus, SharedStatus};
use super::worker_loop::{Worker, WorkerLoop};
use crate::config::WorkerConfig;
use crate::domain::{InitError, LookupError, StrandError, TaskId};
use crate::observability::{TaskCounts, TaskView};
use crate::ports::{ConnectOptions, Connector, HostRuntime, ResultSet};
use crate::store::{QueryRequest, TaskStore};

pub struct QueryContext {
    store: Arc<TaskStore>,
    status: Arc<SharedStatus>,
    connector: Arc<dyn Connector>,
    dispatcher: Dispatcher,
    worker: Option<Worker>,
}

impl QueryContext {
    /// Connect and start the background worker.
    pub fn initialize(
        connector: Arc<dyn Connector>,
        options: &ConnectOptions,
        worker: &WorkerConfig,
    ) -> Result<Self, StrandError> {
        let (mut context, worker_loop) = Self::initialize_detached(connector, options)?;
        let handle =
            Worker::spawn(worker_loop, worker.poll_interval()).map_err(InitError::SpawnWorker)?;
        context.worker = Some(handle);

        tracing::info!(
            database = %options.database,
            poll_ms = worker.poll_interval_ms,
            "async connection initialized"
        );
        Ok(context)
    }

    /// Connect without starting a thread; the caller drives the returned
    /// [`WorkerLoop`] itself (tests, or hosts with their own scheduler).
    pub fn initialize_detached(
        connector: Arc<dyn Connector>,
        options: &ConnectOptions,
    ) -> Result<(Self, WorkerLoop), StrandError> {
        Self::initialize_detached_with_store(connector, options, TaskStore::new())
    }

    pub fn initialize_detached_with_store(
        connector: Arc<dyn Connector>,
        options: &ConnectOptions,
        store: TaskStore,
    ) -> Result<(Self, WorkerLoop), StrandError> {
        let connection = connector.connect(options).map_err(InitError::Connect)?;
        let store = Arc::new(store);
        let status = Arc::new(SharedStatus::new());
        let worker_loop = WorkerLoop::new(Arc::clone(&store), connection, Arc::clone(&status));

        let context = Self {
            store,
            status,
            connector,
            dispatcher: Dispatcher::new(),
            worker: None,
        };
        Ok((context, worker_loop))
    }

    /// Queue a query. Never blocks on execution.
    pub fn create_query(&self, request: QueryRequest) -> TaskId {
        self.store.create(request)
    }

    /// One dispatch tick.
    pub fn check_done<H>(&self, host: &mut H) -> DispatchReport
    where
        H: HostRuntime + ?Sized,
    {
        self.dispatcher.check_done(&self.store, host)
    }

    fn with_result<R>(
        &self,
        id: TaskId,
        f: impl FnOnce(&mut dyn ResultSet) -> R,
    ) -> Result<R, StrandError> {
        let task = self
            .store
            .lookup(id)
            .ok_or(LookupError::UnknownTask(id))?;
        Ok(task.with_result(f)?)
    }

    pub fn num_rows(&self, id: TaskId) -> Result<u64, StrandError> {
        self.with_result(id, |r| r.num_rows())
    }

    pub fn num_fields(&self, id: TaskId) -> Result<u32, StrandError> {
        self.with_result(id, |r| r.num_fields())
    }

    /// Returns the previous field offset.
    pub fn field_seek(&self, id: TaskId, offset: u32) -> Result<u32, StrandError> {
        self.with_result(id, |r| r.field_seek(offset))
    }

    pub fn fetch_field(&self, id: TaskId) -> Result<Option<String>, StrandError> {
        self.with_result(id, |r| r.fetch_field())
    }

    pub fn fetch_row(&self, id: TaskId) -> Result<Option<Vec<Option<String>>>, StrandError> {
        self.with_result(id, |r| r.fetch_row())
    }

    /// Request removal. The worker releases the task on its next pass.
    pub fn free_task(&self, id: TaskId) -> Result<(), StrandError> {
        if self.store.mark_for_cleanup(id) {
            Ok(())
        } else {
            Err(LookupError::UnknownTask(id).into())
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.snapshot()
    }

    pub fn errno(&self) -> u32 {
        self.status.snapshot().errno
    }

    pub fn error(&self) -> String {
        self.status.snapshot().error
    }

    pub fn affected_rows(&self) -> u64 {
        self.status.snapshot().affected_rows
    }

    pub fn escape(&self, raw: &str) -> String {
        self.connector.escape(raw)
    }

    pub fn counts(&self) -> TaskCounts {
        self.store.counts()
    }

    pub fn views(&self) -> Vec<TaskView> {
        self.store.views()
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Stop the worker after its current query and close the connection.
    ///
    /// Live tasks are dropped with the store.
    pub fn close(mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown_and_join();
        }
        tracing::info!(remaining = self.store.len(), "async connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallbackRef, EntityId, Epoch, HostValue, IdentityToken, TaskArgument};
    use crate::impls::SqliteConnector;
    use crate::ports::SequentialIdGenerator;
    use crate::store::TaskTarget;
    use crate::testing::{RecordingHost, ScriptedConnector, sqlite_memory};
    use std::thread;
    use std::time::{Duration, Instant};

    const EPOCH: Epoch = Epoch::new(1);
    const CALLBACK: CallbackRef = CallbackRef::new(5);

    fn sqlite() -> (QueryContext, WorkerLoop) {
        QueryContext::initialize_detached(Arc::new(SqliteConnector::new()), &sqlite_memory())
            .unwrap()
    }

    #[test]
    fn delivered_result_stays_readable_until_freed() {
        let (context, mut worker) = sqlite();
        let mut host = RecordingHost::new(EPOCH);

        context.create_query(QueryRequest::new("CREATE TABLE t (id INTEGER, name TEXT)", EPOCH));
        context.create_query(QueryRequest::new(
            "INSERT INTO t VALUES (1, 'one'), (2, NULL)",
            EPOCH,
        ));
        let id = context.create_query(
            QueryRequest::new("SELECT id, name FROM t ORDER BY id", EPOCH)
                .with_callback(Some(CALLBACK))
                .with_argument(Some(TaskArgument::Int(42))),
        );
        worker.run_pass();

        let report = context.check_done(&mut host);
        assert_eq!(report.delivered, vec![id]);
        assert_eq!(
            host.invocations[0].args,
            vec![HostValue::Int(id.get()), HostValue::Int(42)]
        );

        // the callback reads after dispatch
        assert_eq!(context.num_rows(id).unwrap(), 2);
        assert_eq!(context.num_fields(id).unwrap(), 2);
        assert_eq!(context.fetch_field(id).unwrap().as_deref(), Some("id"));
        assert_eq!(context.field_seek(id, 0).unwrap(), 1);
        assert_eq!(
            context.fetch_row(id).unwrap(),
            Some(vec![Some("1".into()), Some("one".into())])
        );
        assert_eq!(
            context.fetch_row(id).unwrap(),
            Some(vec![Some("2".into()), None])
        );
        assert_eq!(context.fetch_row(id).unwrap(), None);

        // survives more passes and ticks
        worker.run_pass();
        context.check_done(&mut host);
        assert_eq!(host.invocations.len(), 1);
        assert!(context.num_rows(id).is_ok());

        context.free_task(id).unwrap();
        worker.run_pass();
        assert!(matches!(
            context.num_rows(id),
            Err(StrandError::Lookup(LookupError::UnknownTask(_)))
        ));
        assert!(context.free_task(id).is_err());
    }

    #[test]
    fn recycled_target_never_gets_a_callback() {
        let (context, mut worker) = sqlite();
        let mut host = RecordingHost::new(EPOCH);
        let entity = EntityId::new(8);
        host.spawn_entity(entity, IdentityToken::new(100));

        let id = context.create_query(
            QueryRequest::new("SELECT 1", EPOCH)
                .with_callback(Some(CALLBACK))
                .with_target(TaskTarget {
                    entity,
                    identity: host.identity_of(entity),
                }),
        );
        worker.run_pass();

        // the slot is reused by a new object before the tick
        host.spawn_entity(entity, IdentityToken::new(101));
        context.check_done(&mut host);
        assert!(host.invocations.is_empty());

        worker.run_pass();
        assert!(context.store().lookup(id).is_none());
        assert!(context.store().is_empty());
    }

    #[test]
    fn failed_query_is_removed_and_reported() {
        let (context, mut worker) = sqlite();
        let mut host = RecordingHost::new(EPOCH);
        let id = context.create_query(
            QueryRequest::new("SELECT * FROM missing_table", EPOCH).with_callback(Some(CALLBACK)),
        );

        let report = worker.run_pass();
        assert_eq!(report.failed, 1);
        assert_eq!(report.removed, 1);
        assert!(context.num_rows(id).is_err());
        assert!(context.fetch_row(id).is_err());

        context.check_done(&mut host);
        assert!(host.invocations.is_empty());
        assert_ne!(context.errno(), 0);
        assert!(context.error().contains("missing_table"), "{}", context.error());
    }

    #[test]
    fn result_unavailable_before_execution() {
        let (context, _worker) = sqlite();
        let id = context.create_query(QueryRequest::new("SELECT 1", EPOCH));
        assert!(matches!(
            context.num_rows(id),
            Err(StrandError::Lookup(LookupError::ResultUnavailable(_)))
        ));
        assert_eq!(context.counts().pending, 1);
    }

    #[test]
    fn affected_rows_follow_the_last_statement() {
        let (context, mut worker) = sqlite();
        context.create_query(QueryRequest::new("CREATE TABLE t (x INTEGER)", EPOCH));
        context.create_query(QueryRequest::new("INSERT INTO t VALUES (1), (2), (3)", EPOCH));
        worker.run_pass();
        assert_eq!(context.affected_rows(), 3);
        assert_eq!(context.errno(), 0);
        assert_eq!(context.error(), "");
    }

    #[test]
    fn ids_wrap_through_the_context() {
        let (context, _worker) = QueryContext::initialize_detached_with_store(
            Arc::new(ScriptedConnector::new()),
            &sqlite_memory(),
            TaskStore::with_id_generator(Box::new(SequentialIdGenerator::starting_at(i32::MAX))),
        )
        .unwrap();

        assert_eq!(context.create_query(QueryRequest::new("a", EPOCH)), TaskId::new(i32::MAX));
        assert_eq!(context.create_query(QueryRequest::new("b", EPOCH)), TaskId::new(0));
    }

    #[test]
    fn connect_failure_leaves_nothing_behind() {
        let err = QueryContext::initialize(
            Arc::new(ScriptedConnector::refusing()),
            &sqlite_memory(),
            &WorkerConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, StrandError::Init(InitError::Connect(_))));
    }

    #[test]
    fn background_worker_round_trip() {
        let connector = ScriptedConnector::new();
        let context = QueryContext::initialize(
            Arc::new(connector.clone()),
            &sqlite_memory(),
            &WorkerConfig { poll_interval_ms: 1 },
        )
        .unwrap();
        let mut host = RecordingHost::new(EPOCH);
        let id = context.create_query(QueryRequest::new("SELECT 1", EPOCH).with_callback(Some(CALLBACK)));

        let deadline = Instant::now() + Duration::from_secs(5);
        while context.check_done(&mut host).delivered.is_empty() {
            assert!(Instant::now() < deadline, "no delivery");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(context.fetch_row(id).unwrap(), Some(vec![Some("SELECT 1".into())]));

        context.free_task(id).unwrap();
        while connector.released() == 0 {
            assert!(Instant::now() < deadline, "task never released");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(context.store().is_empty());
        assert_eq!(connector.released(), 1);

        context.close();
        assert!(connector.connection_closed());
    }
}

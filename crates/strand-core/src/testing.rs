//! Test doubles for the host runtime and the database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{CallbackRef, DatabaseError, EntityId, Epoch, HostValue, IdentityToken};
use crate::impls::MaterializedResult;
use crate::ports::{
    CallFrame, ConnectOptions, Connection, Connector, HostRuntime, ResultSet, ThreadHandle,
};

/// One callback invocation seen by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub callback: CallbackRef,
    pub target: Option<EntityId>,
    pub args: Vec<HostValue>,
    pub thread: ThreadHandle,
}

/// Host runtime that records invocations instead of running scripts.
#[derive(Debug)]
pub struct RecordingHost {
    pub active: bool,
    pub epoch: Epoch,
    pub identities: HashMap<EntityId, IdentityToken>,
    pub invocations: Vec<Invocation>,
    pub freed: Vec<ThreadHandle>,
    next_thread: u32,
}

impl RecordingHost {
    pub fn new(epoch: Epoch) -> Self {
        Self {
            active: true,
            epoch,
            identities: HashMap::new(),
            invocations: Vec::new(),
            freed: Vec::new(),
            next_thread: 1,
        }
    }

    pub fn spawn_entity(&mut self, entity: EntityId, identity: IdentityToken) {
        self.identities.insert(entity, identity);
    }

    pub fn despawn_entity(&mut self, entity: EntityId) {
        self.identities.remove(&entity);
    }
}

impl HostRuntime for RecordingHost {
    fn is_active(&self) -> bool {
        self.active
    }

    fn current_epoch(&self) -> Epoch {
        self.epoch
    }

    fn identity_of(&self, entity: EntityId) -> Option<IdentityToken> {
        self.identities.get(&entity).copied()
    }

    fn invoke(
        &mut self,
        callback: CallbackRef,
        target: Option<EntityId>,
        args: Vec<HostValue>,
    ) -> ThreadHandle {
        let thread = ThreadHandle(self.next_thread);
        self.next_thread += 1;
        self.invocations.push(Invocation {
            callback,
            target,
            args,
            thread,
        });
        thread
    }

    fn free_thread(&mut self, thread: ThreadHandle) {
        self.freed.push(thread);
    }
}

/// Builtin call frame with a fixed parameter list.
#[derive(Debug, Default)]
pub struct TestFrame {
    params: Vec<HostValue>,
    pub pushed: Vec<HostValue>,
    pub errors: Vec<String>,
}

impl TestFrame {
    pub fn new(params: Vec<HostValue>) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// The single value the builtin pushed.
    pub fn result(&self) -> &HostValue {
        assert_eq!(self.pushed.len(), 1, "builtin must push exactly one value");
        &self.pushed[0]
    }
}

impl CallFrame for TestFrame {
    fn params(&self) -> &[HostValue] {
        &self.params
    }

    fn push(&mut self, value: HostValue) {
        self.pushed.push(value);
    }

    fn raise(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

#[derive(Debug, Default)]
struct Shared {
    executed: Mutex<Vec<String>>,
    released: AtomicUsize,
    closed: AtomicBool,
}

/// Connector whose connections answer every query with one row holding the
/// query text. Queries starting with `FAIL` fail.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    shared: Arc<Shared>,
    refuse: bool,
}

impl ScriptedConnector {
    pub const FAIL_CODE: u32 = 1064;

    pub fn new() -> Self {
        Self::default()
    }

    /// A connector whose `connect` always fails.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn connection(&self) -> Box<dyn Connection> {
        Box::new(ScriptedConnection {
            shared: Arc::clone(&self.shared),
            affected_rows: 0,
        })
    }

    pub fn executed(&self) -> Vec<String> {
        self.shared.executed.lock().unwrap().clone()
    }

    /// Result sets dropped so far.
    pub fn released(&self) -> usize {
        self.shared.released.load(Ordering::SeqCst)
    }

    pub fn connection_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _options: &ConnectOptions) -> Result<Box<dyn Connection>, DatabaseError> {
        if self.refuse {
            return Err(DatabaseError::new(2003, "connection refused"));
        }
        Ok(self.connection())
    }

    fn escape(&self, raw: &str) -> String {
        raw.replace('\'', "\\'")
    }
}

struct ScriptedConnection {
    shared: Arc<Shared>,
    affected_rows: u64,
}

impl Connection for ScriptedConnection {
    fn execute(&mut self, query: &str) -> Result<Box<dyn ResultSet>, DatabaseError> {
        self.shared.executed.lock().unwrap().push(query.to_string());
        if query.starts_with("FAIL") {
            return Err(DatabaseError::new(
                ScriptedConnector::FAIL_CODE,
                format!("scripted failure: {query}"),
            ));
        }
        self.affected_rows = 1;
        Ok(Box::new(TrackedResult {
            inner: MaterializedResult::new(
                vec!["query".to_string()],
                vec![vec![Some(query.to_string())]],
            ),
            shared: Arc::clone(&self.shared),
        }))
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }
}

struct TrackedResult {
    inner: MaterializedResult,
    shared: Arc<Shared>,
}

impl ResultSet for TrackedResult {
    fn num_rows(&self) -> u64 {
        self.inner.num_rows()
    }

    fn num_fields(&self) -> u32 {
        self.inner.num_fields()
    }

    fn field_seek(&mut self, offset: u32) -> u32 {
        self.inner.field_seek(offset)
    }

    fn fetch_field(&mut self) -> Option<String> {
        self.inner.fetch_field()
    }

    fn fetch_row(&mut self) -> Option<Vec<Option<String>>> {
        self.inner.fetch_row()
    }
}

impl Drop for TrackedResult {
    fn drop(&mut self) {
        self.shared.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn sqlite_memory() -> ConnectOptions {
    ConnectOptions {
        database: ":memory:".to_string(),
        ..ConnectOptions::default()
    }
}

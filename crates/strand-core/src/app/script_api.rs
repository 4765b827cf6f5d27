//! ScriptApi - ホストスクリプト向けビルトイン
//!
//! One method per builtin. Each reads its parameters from a [`CallFrame`]
//! and pushes exactly one value. On error it raises `"<name>() <message>"`
//! and pushes `Undefined`.
//!
//! Parameters are validated before the initialization check.

use std::sync::Arc;

use super::context::QueryContext;
use super::dispatcher::DispatchReport;
use crate::config::WorkerConfig;
use crate::domain::{CallbackRef, EntityId, HostValue, StrandError, TaskArgument, TaskId};
use crate::ports::{CallFrame, ConnectOptions, Connector, HostRuntime};
use crate::store::{QueryRequest, TaskTarget};

pub struct ScriptApi {
    connector: Arc<dyn Connector>,
    worker: WorkerConfig,
    context: Option<QueryContext>,
}

fn respond(frame: &mut dyn CallFrame, name: &str, result: Result<HostValue, StrandError>) {
    match result {
        Ok(value) => frame.push(value),
        Err(err) => {
            frame.raise(&format!("{name}() {err}"));
            frame.push(HostValue::Undefined);
        }
    }
}

fn string_at(params: &[HostValue], index: usize) -> Option<&str> {
    match params.get(index) {
        Some(HostValue::String(s)) => Some(s),
        _ => None,
    }
}

fn int_at(params: &[HostValue], index: usize) -> Option<i32> {
    match params.get(index) {
        Some(HostValue::Int(v)) => Some(*v),
        _ => None,
    }
}

fn function_at(params: &[HostValue], index: usize) -> Option<CallbackRef> {
    match params.get(index) {
        Some(HostValue::Function(f)) => Some(*f),
        _ => None,
    }
}

fn task_id(params: &[HostValue]) -> Result<TaskId, StrandError> {
    int_at(params, 0)
        .map(TaskId::new)
        .ok_or_else(StrandError::argument)
}

fn saturating_int(value: u64) -> HostValue {
    HostValue::Int(i32::try_from(value).unwrap_or(i32::MAX))
}

impl ScriptApi {
    pub fn new(connector: Arc<dyn Connector>, worker: WorkerConfig) -> Self {
        Self {
            connector,
            worker,
            context: None,
        }
    }

    /// Use an already built context, e.g. one whose worker the caller drives.
    pub fn with_context(
        connector: Arc<dyn Connector>,
        worker: WorkerConfig,
        context: QueryContext,
    ) -> Self {
        Self {
            connector,
            worker,
            context: Some(context),
        }
    }

    pub fn context(&self) -> Option<&QueryContext> {
        self.context.as_ref()
    }

    fn ctx(&self) -> Result<&QueryContext, StrandError> {
        self.context.as_ref().ok_or(StrandError::NotInitialized)
    }

    /// `initialize(host, user, password, database, port)`
    pub fn initialize(&mut self, frame: &mut dyn CallFrame) {
        let result = self.try_initialize(frame.params());
        respond(frame, "initialize", result);
    }

    fn try_initialize(&mut self, params: &[HostValue]) -> Result<HostValue, StrandError> {
        let (Some(host), Some(user), Some(password), Some(database), Some(port)) = (
            string_at(params, 0),
            string_at(params, 1),
            string_at(params, 2),
            string_at(params, 3),
            int_at(params, 4),
        ) else {
            return Err(StrandError::arguments());
        };
        let port = u16::try_from(port).map_err(|_| StrandError::arguments())?;

        if self.context.is_some() {
            tracing::debug!("async connection already initialized");
            return Ok(HostValue::Int(1));
        }

        let options = ConnectOptions {
            host: host.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            database: database.to_string(),
            port,
        };
        let context = QueryContext::initialize(Arc::clone(&self.connector), &options, &self.worker)?;
        self.context = Some(context);
        Ok(HostValue::Int(1))
    }

    /// `close()` - 1 if a connection was open, else 0.
    pub fn close(&mut self, frame: &mut dyn CallFrame) {
        let closed = match self.context.take() {
            Some(context) => {
                context.close();
                1
            }
            None => 0,
        };
        frame.push(HostValue::Int(closed));
    }

    pub fn create_query(&mut self, host: &dyn HostRuntime, frame: &mut dyn CallFrame) {
        let result = self.try_create(host, frame.params(), None, true);
        respond(frame, "create_query", result);
    }

    pub fn create_query_nosave(&mut self, host: &dyn HostRuntime, frame: &mut dyn CallFrame) {
        let result = self.try_create(host, frame.params(), None, false);
        respond(frame, "create_query_nosave", result);
    }

    /// Method form, called on `entity`. Parameters are the same as
    /// `create_query`.
    pub fn create_entity_query(
        &mut self,
        host: &dyn HostRuntime,
        entity: EntityId,
        frame: &mut dyn CallFrame,
    ) {
        let result = self.try_create(host, frame.params(), Some(entity), true);
        respond(frame, "create_entity_query", result);
    }

    pub fn create_entity_query_nosave(
        &mut self,
        host: &dyn HostRuntime,
        entity: EntityId,
        frame: &mut dyn CallFrame,
    ) {
        let result = self.try_create(host, frame.params(), Some(entity), false);
        respond(frame, "create_entity_query_nosave", result);
    }

    // params: query, callback?, argument?
    fn try_create(
        &self,
        host: &dyn HostRuntime,
        params: &[HostValue],
        entity: Option<EntityId>,
        save: bool,
    ) -> Result<HostValue, StrandError> {
        let query = string_at(params, 0).ok_or_else(StrandError::argument)?;
        let context = self.ctx()?;

        let mut request = QueryRequest::new(query, host.current_epoch())
            .with_callback(function_at(params, 1))
            .with_argument(params.get(2).and_then(TaskArgument::from_host));
        if let Some(entity) = entity {
            request = request.with_target(TaskTarget {
                entity,
                identity: host.identity_of(entity),
            });
        }
        if !save {
            request = request.nosave();
        }

        context.create_query(request);
        Ok(HostValue::Int(1))
    }

    /// `checkdone()` - run one dispatch tick. Does nothing before
    /// `initialize`.
    pub fn check_done(&self, host: &mut dyn HostRuntime) -> DispatchReport {
        match &self.context {
            Some(context) => context.check_done(host),
            None => DispatchReport::default(),
        }
    }

    pub fn errno(&self, frame: &mut dyn CallFrame) {
        let result = self.ctx().map(|c| saturating_int(u64::from(c.errno())));
        respond(frame, "errno", result);
    }

    pub fn error(&self, frame: &mut dyn CallFrame) {
        let result = self.ctx().map(|c| HostValue::String(c.error()));
        respond(frame, "error", result);
    }

    pub fn affected_rows(&self, frame: &mut dyn CallFrame) {
        let result = self.ctx().map(|c| saturating_int(c.affected_rows()));
        respond(frame, "affected_rows", result);
    }

    pub fn num_rows(&self, frame: &mut dyn CallFrame) {
        let result = task_id(frame.params())
            .and_then(|id| self.ctx()?.num_rows(id))
            .map(saturating_int);
        respond(frame, "num_rows", result);
    }

    pub fn num_fields(&self, frame: &mut dyn CallFrame) {
        let result = task_id(frame.params())
            .and_then(|id| self.ctx()?.num_fields(id))
            .map(|n| saturating_int(u64::from(n)));
        respond(frame, "num_fields", result);
    }

    /// `field_seek(id, offset)` - previous offset.
    pub fn field_seek(&self, frame: &mut dyn CallFrame) {
        let params = frame.params();
        let args = int_at(params, 0)
            .zip(int_at(params, 1))
            .and_then(|(id, offset)| Some((TaskId::new(id), u32::try_from(offset).ok()?)));
        let result = match args {
            Some((id, offset)) => self
                .ctx()
                .and_then(|c| c.field_seek(id, offset))
                .map(|prev| saturating_int(u64::from(prev))),
            None => Err(StrandError::arguments()),
        };
        respond(frame, "field_seek", result);
    }

    /// Field name, or `Undefined` once the cursor is past the last field.
    pub fn fetch_field(&self, frame: &mut dyn CallFrame) {
        let result = task_id(frame.params())
            .and_then(|id| self.ctx()?.fetch_field(id))
            .map(HostValue::from);
        respond(frame, "fetch_field", result);
    }

    /// Row as an array (NULL columns are `Undefined`), or `Undefined` when
    /// the rows are exhausted.
    pub fn fetch_row(&self, frame: &mut dyn CallFrame) {
        let result = task_id(frame.params())
            .and_then(|id| self.ctx()?.fetch_row(id))
            .map(|row| match row {
                Some(columns) => {
                    HostValue::Array(columns.into_iter().map(HostValue::from).collect())
                }
                None => HostValue::Undefined,
            });
        respond(frame, "fetch_row", result);
    }

    pub fn free_task(&self, frame: &mut dyn CallFrame) {
        let result = task_id(frame.params())
            .and_then(|id| self.ctx()?.free_task(id))
            .map(|()| HostValue::Int(1));
        respond(frame, "free_task", result);
    }

    pub fn real_escape_string(&self, frame: &mut dyn CallFrame) {
        let result = match string_at(frame.params(), 0) {
            Some(raw) => self.ctx().map(|c| HostValue::String(c.escape(raw))),
            None => Err(StrandError::arguments()),
        };
        respond(frame, "real_escape_string", result);
    }
}

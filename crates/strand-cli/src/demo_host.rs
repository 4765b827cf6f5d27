//! DemoHost - 擬似ホストランタイム
//!
//! Stands in for a game server's script VM: a round counter (epoch), a
//! table of live entities, and a queue of callback invocations that the
//! main loop runs after each dispatch tick.

use std::collections::{HashMap, VecDeque};

use strand_core::domain::{CallbackRef, EntityId, Epoch, HostValue, IdentityToken};
use strand_core::ports::{CallFrame, HostRuntime, ThreadHandle};

/// A callback the dispatcher asked the host to run.
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub callback: CallbackRef,
    pub target: Option<EntityId>,
    pub args: Vec<HostValue>,
}

#[derive(Debug)]
pub struct DemoHost {
    epoch: Epoch,
    entities: HashMap<EntityId, IdentityToken>,
    next_identity: u32,
    next_thread: u32,
    live_threads: usize,
    pending: VecDeque<PendingCall>,
}

impl DemoHost {
    pub fn new() -> Self {
        Self {
            epoch: Epoch::new(1),
            entities: HashMap::new(),
            next_identity: 1,
            next_thread: 1,
            live_threads: 0,
            pending: VecDeque::new(),
        }
    }

    /// Put a fresh object in `entity`'s slot.
    pub fn spawn(&mut self, entity: EntityId) {
        let identity = IdentityToken::new(self.next_identity);
        self.next_identity += 1;
        self.entities.insert(entity, identity);
        tracing::info!(%entity, %identity, "entity spawned");
    }

    /// Start a new round. Results of queries from earlier rounds are dropped.
    pub fn next_round(&mut self) {
        self.epoch = Epoch::new(self.epoch.get() + 1);
        tracing::info!(epoch = %self.epoch, "new round");
    }

    pub fn take_pending(&mut self) -> Vec<PendingCall> {
        self.pending.drain(..).collect()
    }

    pub fn live_threads(&self) -> usize {
        self.live_threads
    }
}

impl Default for DemoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime for DemoHost {
    fn is_active(&self) -> bool {
        true
    }

    fn current_epoch(&self) -> Epoch {
        self.epoch
    }

    fn identity_of(&self, entity: EntityId) -> Option<IdentityToken> {
        self.entities.get(&entity).copied()
    }

    fn invoke(
        &mut self,
        callback: CallbackRef,
        target: Option<EntityId>,
        args: Vec<HostValue>,
    ) -> ThreadHandle {
        let thread = ThreadHandle(self.next_thread);
        self.next_thread += 1;
        self.live_threads += 1;
        self.pending.push_back(PendingCall {
            callback,
            target,
            args,
        });
        thread
    }

    fn free_thread(&mut self, _thread: ThreadHandle) {
        self.live_threads -= 1;
    }
}

/// Call frame for one builtin call.
#[derive(Debug, Default)]
pub struct DemoFrame {
    params: Vec<HostValue>,
    result: Option<HostValue>,
}

impl DemoFrame {
    pub fn new(params: Vec<HostValue>) -> Self {
        Self {
            params,
            result: None,
        }
    }

    pub fn into_result(self) -> HostValue {
        self.result.unwrap_or(HostValue::Undefined)
    }
}

impl CallFrame for DemoFrame {
    fn params(&self) -> &[HostValue] {
        &self.params
    }

    fn push(&mut self, value: HostValue) {
        self.result = Some(value);
    }

    fn raise(&mut self, message: &str) {
        tracing::error!(target: "strand::script", "{message}");
    }
}

//! Host port - the single-threaded scripting runtime.
//!
//! Nothing here is `Send`: host objects stay on the host thread, and the
//! worker only ever sees task state.

use crate::domain::{CallbackRef, EntityId, Epoch, HostValue, IdentityToken};

/// Handle to a script thread started by [`HostRuntime::invoke`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadHandle(pub u32);

/// What the dispatcher needs from the host.
pub trait HostRuntime {
    /// Whether scripts can currently run.
    fn is_active(&self) -> bool;

    fn current_epoch(&self) -> Epoch;

    /// Live identity token of `entity`, or `None` if the slot is empty.
    fn identity_of(&self, entity: EntityId) -> Option<IdentityToken>;

    /// Run `callback`, bound to `target` or to the global scope.
    ///
    /// `args` are in callee order: the task id first, then the creation
    /// argument if one was given. The returned handle must be passed to
    /// [`HostRuntime::free_thread`].
    fn invoke(
        &mut self,
        callback: CallbackRef,
        target: Option<EntityId>,
        args: Vec<HostValue>,
    ) -> ThreadHandle;

    fn free_thread(&mut self, thread: ThreadHandle);
}

/// One builtin invocation: its parameters and its result/error channel.
pub trait CallFrame {
    fn params(&self) -> &[HostValue];

    fn push(&mut self, value: HostValue);

    /// Report a script-visible error. Never unwinds.
    fn raise(&mut self, message: &str);
}

//! Domain identifiers (strongly-typed IDs).
//!
//! `TaskId` is the 32-bit id handed to host scripts. The other ids are opaque
//! 32-bit tokens that come from the host runtime; they share one generic
//! implementation so an `Epoch` can never be passed where an `EntityId` is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Identifier of a queued query.
///
/// Unique only among tasks that are alive at the same time. The allocator
/// wraps to zero after `i32::MAX`, see [`crate::ports::SequentialIdGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(i32);

impl TaskId {
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Marker trait for host-issued ids.
///
/// Provides the prefix used by `Display`.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic host-issued id.
///
/// `T` is a zero-sized marker; it only exists at compile time.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    raw: u32,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub const fn new(raw: u32) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn get(self) -> u32 {
        self.raw
    }
}

impl<T: IdMarker> From<u32> for Id<T> {
    fn from(raw: u32) -> Self {
        Self::new(raw)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.raw)
    }
}

/// Marker for the host's session/round token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EpochKind {}

impl IdMarker for EpochKind {
    fn prefix() -> &'static str {
        "epoch-"
    }
}

/// Marker for host-side object numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {}

impl IdMarker for EntityKind {
    fn prefix() -> &'static str {
        "entity-"
    }
}

/// Marker for an object's generation/slot token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityKind {}

impl IdMarker for IdentityKind {
    fn prefix() -> &'static str {
        "ident-"
    }
}

/// Marker for references to host-side executable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallbackKind {}

impl IdMarker for CallbackKind {
    fn prefix() -> &'static str {
        "fn-"
    }
}

/// Session/round token; dispatch requires it to equal the host's current one.
pub type Epoch = Id<EpochKind>;

/// Numeric id of a host-side object. Ids are recycled by the host.
pub type EntityId = Id<EntityKind>;

/// Snapshot of an object's generation marker, used to detect id recycling.
pub type IdentityToken = Id<IdentityKind>;

/// Opaque reference to a host script function.
pub type CallbackRef = Id<CallbackKind>;

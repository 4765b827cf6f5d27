//! IdGenerator port - task id allocation.
//!
//! Ids are plain 32-bit integers because host scripts store them in their own
//! int slots.

use crate::domain::TaskId;

/// Issues task ids.
///
/// Called with the store lock held, so implementations need no
/// synchronization of their own.
pub trait IdGenerator: Send {
    fn next_task_id(&mut self) -> TaskId;
}

/// Monotonic counter starting at zero.
///
/// After issuing `i32::MAX` the next id is `0`. There is no check against ids
/// still held by live tasks, so a task that outlives a full wrap can collide
/// with a new one. Lookups then resolve to the older task.
#[derive(Debug, Clone, Default)]
pub struct SequentialIdGenerator {
    next: i32,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn starting_at(next: i32) -> Self {
        Self { next }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_task_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next);
        self.next = if self.next == i32::MAX { 0 } else { self.next + 1 };
        id
    }
}

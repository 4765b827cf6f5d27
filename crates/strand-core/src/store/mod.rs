//! Task store: the shared collection of live tasks.
//!
//! Guarded by a single mutex. The host thread creates and looks up tasks,
//! the worker snapshots and removes them. Critical sections stay short:
//! queries run and callbacks fire outside the lock, against `Arc<Task>`
//! handles taken from a snapshot.

mod arena;
mod record;
mod state;

pub use arena::SlotKey;
pub use record::{MAX_QUERY_LEN, QueryRequest, Task, TaskTarget};
pub use state::TaskPhase;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arena::Arena;

use crate::domain::TaskId;
use crate::observability::{TaskCounts, TaskView};
use crate::ports::{IdGenerator, SequentialIdGenerator};

/// A task together with the key needed to remove it.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub key: SlotKey,
    pub task: Arc<Task>,
}

struct StoreInner {
    arena: Arena<Arc<Task>>,
    ids: Box<dyn IdGenerator>,
}

pub struct TaskStore {
    inner: Mutex<StoreInner>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self::with_id_generator(Box::new(SequentialIdGenerator::new()))
    }

    pub fn with_id_generator(ids: Box<dyn IdGenerator>) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                arena: Arena::new(),
                ids,
            }),
        }
    }

    // A panic while holding the lock leaves the arena consistent (every
    // mutation is a single push/remove), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate an id and append a new pending task.
    pub fn create(&self, request: QueryRequest) -> TaskId {
        let mut inner = self.lock();
        let id = inner.ids.next_task_id();
        inner.arena.insert(Arc::new(Task::new(id, request)));
        tracing::trace!(task_id = %id, "task created");
        id
    }

    /// First live task with `id`, in creation order.
    pub fn lookup(&self, id: TaskId) -> Option<Arc<Task>> {
        self.lock()
            .arena
            .iter()
            .find(|(_, task)| task.id() == id)
            .map(|(_, task)| Arc::clone(task))
    }

    /// Flag the task for removal. `false` if no live task has `id`.
    pub fn mark_for_cleanup(&self, id: TaskId) -> bool {
        match self.lookup(id) {
            Some(task) => {
                task.request_cleanup();
                true
            }
            None => false,
        }
    }

    /// Live tasks in creation order.
    pub fn snapshot(&self) -> Vec<TaskEntry> {
        self.lock()
            .arena
            .iter()
            .map(|(key, task)| TaskEntry {
                key,
                task: Arc::clone(task),
            })
            .collect()
    }

    /// Unlink the task at `key`. Returns `false` if it was already removed.
    ///
    /// The store's reference is dropped after the lock is released, so
    /// freeing a large result set does not stall the host thread.
    pub fn remove_and_release(&self, key: SlotKey) -> bool {
        let removed = self.lock().arena.remove(key);
        match removed {
            Some(task) => {
                tracing::trace!(task_id = %task.id(), "task released");
                drop(task);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for (_, task) in self.lock().arena.iter() {
            counts.record(task.phase());
        }
        counts
    }

    pub fn views(&self) -> Vec<TaskView> {
        self.lock()
            .arena
            .iter()
            .map(|(_, task)| TaskView {
                id: task.id(),
                query: task.query().to_string(),
                phase: task.phase(),
                epoch: task.epoch(),
                created_at: task.created_at(),
            })
            .collect()
    }
}

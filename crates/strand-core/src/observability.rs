use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Epoch, TaskId};
use crate::store::TaskPhase;

/// Live tasks by phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub awaiting_dispatch: usize,
    pub delivered: usize,
    pub cleanup_pending: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.pending + self.awaiting_dispatch + self.delivered + self.cleanup_pending
    }

    pub(crate) fn record(&mut self, phase: TaskPhase) {
        match phase {
            TaskPhase::Pending => self.pending += 1,
            TaskPhase::AwaitingDispatch => self.awaiting_dispatch += 1,
            TaskPhase::Delivered => self.delivered += 1,
            TaskPhase::CleanupPending => self.cleanup_pending += 1,
        }
    }
}

/// Read-only view of one live task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub id: TaskId,
    pub query: String,
    pub phase: TaskPhase,
    pub epoch: Epoch,
    pub created_at: DateTime<Utc>,
}

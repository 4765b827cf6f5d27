//! Status - 接続ステータス
//!
//! The connection belongs to the worker thread, so the host cannot ask it
//! for its last error directly. The worker publishes errno/error and the
//! affected-row count here after every statement.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::domain::DatabaseError;

/// Outcome of the most recent statement on the shared connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// 0 when the last statement succeeded.
    pub errno: u32,
    /// Empty when the last statement succeeded.
    pub error: String,
    pub affected_rows: u64,
}

#[derive(Debug, Default)]
pub struct SharedStatus {
    inner: Mutex<ConnectionStatus>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success(&self, affected_rows: u64) {
        let mut status = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        status.errno = 0;
        status.error.clear();
        status.affected_rows = affected_rows;
    }

    pub(crate) fn record_failure(&self, err: &DatabaseError) {
        let mut status = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        status.errno = err.code;
        status.error = err.message.clone();
    }

    pub fn snapshot(&self) -> ConnectionStatus {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_then_success_resets_error() {
        let status = SharedStatus::new();
        status.record_failure(&DatabaseError::new(1, "near \"SELEC\": syntax error"));
        let snap = status.snapshot();
        assert_eq!(snap.errno, 1);
        assert!(snap.error.contains("syntax error"));

        status.record_success(4);
        assert_eq!(
            status.snapshot(),
            ConnectionStatus {
                errno: 0,
                error: String::new(),
                affected_rows: 4,
            }
        );
    }

    #[test]
    fn failure_keeps_previous_affected_rows() {
        let status = SharedStatus::new();
        status.record_success(2);
        status.record_failure(&DatabaseError::new(19, "constraint failed"));
        assert_eq!(status.snapshot().affected_rows, 2);
    }
}

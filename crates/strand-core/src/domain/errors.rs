//! Errors surfaced by the query bridge.
//!
//! Only synchronous, caller-visible failures live here. A failed query is not
//! an error value: the worker finalizes the task and records the detail in the
//! connection status. A stale dispatch context is not an error either, it is a
//! [`crate::app::DropReason`].

use thiserror::Error;

use super::ids::TaskId;

#[derive(Debug, Error)]
pub enum StrandError {
    /// Missing or mistyped parameter.
    #[error("{0}")]
    Argument(String),

    #[error("async connection is not initialized!")]
    NotInitialized,

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Init(#[from] InitError),
}

impl StrandError {
    pub fn argument() -> Self {
        Self::Argument("argument is undefined or has a wrong type".to_string())
    }

    pub fn arguments() -> Self {
        Self::Argument("one or more arguments is undefined or has a wrong type".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("no live task with id {0}")]
    UnknownTask(TaskId),

    /// Not executed yet, failed, or already released.
    #[error("{0} has no result")]
    ResultUnavailable(TaskId),
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to initialize async connection: {0}")]
    Connect(#[source] DatabaseError),

    #[error("failed to start query worker: {0}")]
    SpawnWorker(#[source] std::io::Error),
}

/// Error reported by the database collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("database error {code}: {message}")]
pub struct DatabaseError {
    pub code: u32,
    pub message: String,
}

impl DatabaseError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

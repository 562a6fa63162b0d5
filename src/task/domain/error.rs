//! Error types for task domain validation and parsing.

use super::{TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The external identifier is empty after trimming.
    #[error("external identifier must not be empty")]
    EmptyExternalId,

    /// The magnet link does not use the `magnet:?` scheme.
    #[error("invalid magnet link '{0}'")]
    InvalidMagnetLink(String),

    /// The task already carries a different external identifier.
    #[error("task {task_id} is already bound to external entry {existing}")]
    ExternalIdAlreadyAssigned {
        /// Task identifier.
        task_id: TaskId,
        /// Identifier the task is already bound to.
        existing: String,
    },

    /// The requested lifecycle transition is not allowed.
    #[error("invalid task status transition for {task_id}: {from} -> {to}")]
    InvalidStatusTransition {
        /// Task identifier.
        task_id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },
}

/// Error returned while parsing task statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

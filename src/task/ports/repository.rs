//! Repository port for task persistence and lookup.

use crate::task::domain::{ExternalId, Task, TaskId, TaskStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Task persistence contract.
///
/// The store is the single source of truth. Writers follow a
/// read-then-conditionally-write discipline through [`TaskRepository::update_from`]
/// so that overlapping passes cannot both apply the same transition.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID already
    /// exists or [`TaskRepositoryError::DuplicateExternalId`] when another task
    /// already owns the task's external identifier.
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Persists changes to an existing task, provided its stored status still
    /// equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist,
    /// [`TaskRepositoryError::StatusConflict`] when the stored status moved
    /// on, and [`TaskRepositoryError::DuplicateExternalId`] when another task
    /// already owns the external identifier.
    async fn update_from(&self, task: &Task, expected: TaskStatus) -> TaskRepositoryResult<()>;

    /// Finds a task by internal task identifier.
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns every stored task ordered by creation time.
    async fn find_all(&self) -> TaskRepositoryResult<Vec<Task>>;

    /// Finds the task bound to a download client entry.
    async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> TaskRepositoryResult<Option<Task>>;

    /// Finds the task whose recorded placement uses `file_name`.
    async fn find_by_file_name(&self, file_name: &str) -> TaskRepositoryResult<Option<Task>>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// Another task already owns the external identifier.
    #[error("external identifier {0} is already owned by another task")]
    DuplicateExternalId(ExternalId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The stored status changed since the task was read.
    #[error("task {task_id} status is {actual}, expected {expected}")]
    StatusConflict {
        /// Task identifier.
        task_id: TaskId,
        /// Status the writer read.
        expected: TaskStatus,
        /// Status currently stored.
        actual: TaskStatus,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

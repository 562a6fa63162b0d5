//! In-memory task repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{ExternalId, Task, TaskId, TaskStatus},
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

/// Thread-safe in-memory task repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<TaskId, Task>,
    external_index: HashMap<ExternalId, TaskId>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(err: impl ToString) -> TaskRepositoryError {
    TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

/// Rejects `task` when its external identifier belongs to another task.
fn ensure_external_id_free(state: &InMemoryTaskState, task: &Task) -> TaskRepositoryResult<()> {
    let Some(external_id) = task.external_id() else {
        return Ok(());
    };
    match state.external_index.get(external_id) {
        Some(owner) if *owner != task.id() => {
            Err(TaskRepositoryError::DuplicateExternalId(external_id.clone()))
        }
        _ => Ok(()),
    }
}

fn index_external_id(state: &mut InMemoryTaskState, task: &Task) {
    if let Some(external_id) = task.external_id() {
        state.external_index.insert(external_id.clone(), task.id());
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        ensure_external_id_free(&state, task)?;

        index_external_id(&mut state, task);
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update_from(&self, task: &Task, expected: TaskStatus) -> TaskRepositoryResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;

        let stored = state
            .tasks
            .get(&task.id())
            .ok_or(TaskRepositoryError::NotFound(task.id()))?;
        if stored.status() != expected {
            return Err(TaskRepositoryError::StatusConflict {
                task_id: task.id(),
                expected,
                actual: stored.status(),
            });
        }
        let previous_external_id = stored.external_id().cloned();
        ensure_external_id_free(&state, task)?;

        if let Some(old) = previous_external_id.filter(|old| task.external_id() != Some(old)) {
            state.external_index.remove(&old);
        }
        index_external_id(&mut state, task);
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find_all(&self) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.state.read().map_err(lock_error)?;
        let mut tasks: Vec<Task> = state.tasks.values().cloned().collect();
        tasks.sort_by_key(|task| (task.created_at(), task.id().into_inner()));
        Ok(tasks)
    }

    async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> TaskRepositoryResult<Option<Task>> {
        let state = self.state.read().map_err(lock_error)?;
        let task = state
            .external_index
            .get(external_id)
            .and_then(|task_id| state.tasks.get(task_id))
            .cloned();
        Ok(task)
    }

    async fn find_by_file_name(&self, file_name: &str) -> TaskRepositoryResult<Option<Task>> {
        let state = self.state.read().map_err(lock_error)?;
        let mut matches: Vec<&Task> = state
            .tasks
            .values()
            .filter(|task| {
                task.placement()
                    .is_some_and(|placement| placement.file_name == file_name)
            })
            .collect();
        matches.sort_by_key(|task| task.created_at());
        Ok(matches.first().map(|task| (*task).clone()))
    }
}

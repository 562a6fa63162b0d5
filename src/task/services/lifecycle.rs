//! Task lifecycle orchestration: creation, resolution, observation and
//! organization of download tasks.

use super::messages::{self, MessageError};
use crate::task::{
    domain::{
        ConversationId, ExternalEntry, ExternalId, FilePlacement, Observation, RequesterId, Task,
        TaskDomainError, TaskId, TaskOrigin, TaskStatus,
    },
    ports::{GatewayError, Notifier, TaskRepository, TaskRepositoryError},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Duration;
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

/// Conditional writes retried after losing a race with another pass.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The external identifier conflicts with the task's binding or with
    /// another task's.
    #[error("external identifier {external_id} conflicts with task {task_id}")]
    Conflict {
        /// Task being bound.
        task_id: TaskId,
        /// Identifier that could not be bound.
        external_id: ExternalId,
    },

    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),

    /// Download client operation failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A chat message could not be rendered.
    #[error(transparent)]
    Message(#[from] MessageError),
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Task lifecycle orchestration service.
///
/// Every mutation follows read, apply, conditional write: the write only
/// lands if the stored status is still the one that was read. A lost race is
/// retried against the fresh state, so the completion notice is sent by
/// exactly one writer.
pub struct TaskLifecycleService<R, N, C>
where
    R: TaskRepository,
    N: Notifier,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    notifier: Arc<N>,
    clock: Arc<C>,
    placement_root: Option<Utf8PathBuf>,
}

impl<R, N, C> Clone for TaskLifecycleService<R, N, C>
where
    R: TaskRepository,
    N: Notifier,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            notifier: Arc::clone(&self.notifier),
            clock: Arc::clone(&self.clock),
            placement_root: self.placement_root.clone(),
        }
    }
}

impl<R, N, C> TaskLifecycleService<R, N, C>
where
    R: TaskRepository,
    N: Notifier,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub const fn new(repository: Arc<R>, notifier: Arc<N>, clock: Arc<C>) -> Self {
        Self {
            repository,
            notifier,
            clock,
            placement_root: None,
        }
    }

    /// Records file placements under `root` when completion is observed.
    #[must_use]
    pub fn with_placement_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.placement_root = Some(root.into());
        self
    }

    /// Returns the configured placement root.
    #[must_use]
    pub fn placement_root(&self) -> Option<&Utf8Path> {
        self.placement_root.as_deref()
    }

    /// Returns the notifier used for requester replies.
    #[must_use]
    pub const fn notifier(&self) -> &Arc<N> {
        &self.notifier
    }

    /// Returns the clock used to stamp mutations.
    #[must_use]
    pub const fn clock(&self) -> &Arc<C> {
        &self.clock
    }

    /// Persists a new pending task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the store rejects the
    /// task.
    pub async fn create_task(
        &self,
        origin: TaskOrigin,
        requester: RequesterId,
        conversation: ConversationId,
    ) -> TaskLifecycleResult<Task> {
        let task = Task::new(origin, requester, conversation, &*self.clock);
        self.repository.store(&task).await?;
        tracing::info!(
            task_id = %task.id(),
            origin = task.origin().kind(),
            conversation = conversation.value(),
            "task created"
        );
        Ok(task)
    }

    /// Binds a task to the download client entry that was resolved for it.
    ///
    /// Returns `false` when the task was already bound to `external_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Conflict`] when the task is bound to a
    /// different entry or another task owns `external_id`, and
    /// [`TaskLifecycleError::NotFound`] when the task does not exist.
    pub async fn apply_resolved_identifier(
        &self,
        task_id: TaskId,
        external_id: ExternalId,
    ) -> TaskLifecycleResult<bool> {
        let conflict = || TaskLifecycleError::Conflict {
            task_id,
            external_id: external_id.clone(),
        };

        let mut task = self.load(task_id).await?;
        let owner = self.repository.find_by_external_id(&external_id).await?;
        if owner.is_some_and(|owner| owner.id() != task_id) {
            return Err(conflict());
        }

        let bound = task
            .bind_external_id(external_id.clone(), &*self.clock)
            .map_err(|_| conflict())?;
        if !bound {
            return Ok(false);
        }

        match self.repository.update_from(&task, task.status()).await {
            Ok(()) => {}
            Err(TaskRepositoryError::DuplicateExternalId(_)) => return Err(conflict()),
            Err(err) => return Err(err.into()),
        }
        tracing::info!(task_id = %task_id, external_id = %external_id, "task resolved");
        Ok(true)
    }

    /// Applies a live entry observation to a task.
    ///
    /// The first observation that moves the task to `Completed` stamps the
    /// completion time, records the file placement and sends the completion
    /// notice.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] when the task does not exist
    /// and [`TaskLifecycleError::Repository`] when the write fails.
    pub async fn apply_observed_state(
        &self,
        task_id: TaskId,
        entry: &ExternalEntry,
    ) -> TaskLifecycleResult<Observation> {
        let (task, observation) = self
            .write_with_retry(task_id, |task| Ok(self.observe(task, entry)))
            .await?;

        if observation.changed() {
            tracing::info!(
                task_id = %task_id,
                external_id = %entry.id,
                from = %observation.previous,
                to = %observation.current,
                "task status changed"
            );
        }
        if observation.completed_now() {
            self.notify_completion(&task).await;
        }
        Ok(observation)
    }

    /// Moves a task to `Organized` after its files were promoted.
    ///
    /// `entry` is applied first, so a task the reconciliation loop has not
    /// yet seen complete still gets its single completion notice. Returns
    /// `false` when the task was already organized.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] when the entry does not show a
    /// finished payload or the task has failed.
    pub async fn mark_organized(
        &self,
        task_id: TaskId,
        entry: &ExternalEntry,
    ) -> TaskLifecycleResult<bool> {
        let (task, outcome) = self
            .write_with_retry(task_id, |task| {
                if task.status() == TaskStatus::Organized {
                    return Ok(None);
                }
                let observation = self.observe(task, entry);
                task.mark_organized(&*self.clock)?;
                Ok(Some(observation))
            })
            .await?;

        let Some(observation) = outcome else {
            return Ok(false);
        };
        if observation.completed_now() {
            self.notify_completion(&task).await;
        }
        tracing::info!(task_id = %task_id, "task organized");
        Ok(true)
    }

    /// Fails a task that never resolved to a download client entry within
    /// `expiry` of its creation. Returns `true` when the task was failed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] when the task does not exist
    /// and [`TaskLifecycleError::Repository`] when the write fails.
    pub async fn fail_unresolved(
        &self,
        task_id: TaskId,
        expiry: Duration,
    ) -> TaskLifecycleResult<bool> {
        let now = self.clock.utc();
        let (task, failed) = self
            .write_with_retry(task_id, |task| {
                let is_expired = task.external_id().is_none()
                    && task.status() == TaskStatus::Pending
                    && now - task.created_at() >= expiry;
                if !is_expired {
                    return Ok(None);
                }
                task.fail(messages::UNRESOLVED_TEXT, &*self.clock)?;
                Ok(Some(()))
            })
            .await?;

        if failed.is_none() {
            return Ok(false);
        }
        tracing::warn!(task_id = %task_id, "unresolved task expired");
        self.send(task.conversation(), messages::UNRESOLVED_TEXT).await;
        Ok(true)
    }

    /// Returns every stored task ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the lookup fails.
    pub async fn list_tasks(&self) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.find_all().await?)
    }

    /// Finds a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the lookup fails.
    pub async fn find_by_id(&self, task_id: TaskId) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.repository.find_by_id(task_id).await?)
    }

    /// Finds the task bound to a download client entry.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the lookup fails.
    pub async fn find_by_external_id(
        &self,
        external_id: &ExternalId,
    ) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.repository.find_by_external_id(external_id).await?)
    }

    /// Finds the task whose recorded placement uses `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the lookup fails.
    pub async fn find_by_file_name(&self, file_name: &str) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.repository.find_by_file_name(file_name).await?)
    }

    /// Renders the stored task listing.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError`] when the lookup or rendering fails.
    pub async fn render_task_list(&self) -> TaskLifecycleResult<String> {
        let tasks = self.list_tasks().await?;
        Ok(messages::render_task_list(&tasks)?)
    }

    /// Sends `text` to `conversation`, logging delivery failures.
    pub async fn send(&self, conversation: ConversationId, text: &str) {
        if let Err(err) = self.notifier.send(conversation, text).await {
            tracing::warn!(
                conversation = conversation.value(),
                error = %err,
                "failed to deliver chat message"
            );
        }
    }

    fn observe(&self, task: &mut Task, entry: &ExternalEntry) -> Observation {
        let observation = task.observe(entry, &*self.clock);
        if let Some(placement) = self
            .placement_for(entry)
            .filter(|_| observation.completed_now())
        {
            task.record_placement(placement, &*self.clock);
        }
        observation
    }

    fn placement_for(&self, entry: &ExternalEntry) -> Option<FilePlacement> {
        let root = self.placement_root.as_deref()?;
        if entry.save_path.is_empty() || entry.name.is_empty() {
            return None;
        }
        Some(FilePlacement::for_payload(
            &entry.name,
            Utf8Path::new(&entry.save_path),
            root,
        ))
    }

    async fn notify_completion(&self, task: &Task) {
        match messages::render_completion(task) {
            Ok(text) => {
                self.send(task.conversation(), &text).await;
                tracing::info!(task_id = %task.id(), "completion notice sent");
            }
            Err(err) => {
                tracing::warn!(task_id = %task.id(), error = %err, "completion notice not rendered");
            }
        }
    }

    async fn load(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        self.repository
            .find_by_id(task_id)
            .await?
            .ok_or(TaskLifecycleError::NotFound(task_id))
    }

    /// Loads the task, applies `mutate` and writes it back conditionally on
    /// the status that was read.
    ///
    /// `mutate` returns `None` to skip the write. A lost race reloads the task
    /// and applies `mutate` again.
    async fn write_with_retry<T, F>(
        &self,
        task_id: TaskId,
        mut mutate: F,
    ) -> TaskLifecycleResult<(Task, T)>
    where
        F: FnMut(&mut Task) -> TaskLifecycleResult<T> + Send,
        T: WriteOutcome + Send,
    {
        let mut attempt = 1;
        loop {
            let mut task = self.load(task_id).await?;
            let expected = task.status();
            let outcome = mutate(&mut task)?;
            if !outcome.should_write() {
                return Ok((task, outcome));
            }
            match self.repository.update_from(&task, expected).await {
                Ok(()) => return Ok((task, outcome)),
                Err(TaskRepositoryError::StatusConflict { .. }) if attempt < MAX_WRITE_ATTEMPTS => {
                    tracing::debug!(task_id = %task_id, attempt, "task changed concurrently; retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Whether a mutation produced something worth persisting.
trait WriteOutcome {
    fn should_write(&self) -> bool;
}

impl WriteOutcome for Observation {
    fn should_write(&self) -> bool {
        true
    }
}

impl<T> WriteOutcome for Option<T> {
    fn should_write(&self) -> bool {
        self.is_some()
    }
}

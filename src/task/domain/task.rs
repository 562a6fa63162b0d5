//! Task aggregate root and the observation rules that drive it.

use super::{
    ConversationId, ExternalEntry, ExternalId, FilePlacement, RequesterId, TaskDomainError,
    TaskId, TaskOrigin, TaskStatus,
};
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Generic failure text used when the download client gives no detail.
pub const GENERIC_FAILURE_DETAIL: &str = "the download client reported an error";

/// Values observed on the download client entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStats {
    /// Payload size in bytes.
    pub size_bytes: Option<u64>,
    /// Average speed in bytes per second, computed at completion.
    pub average_speed: Option<u64>,
    /// Connected seeders.
    pub seeders: Option<u32>,
    /// Connected leechers.
    pub leechers: Option<u32>,
    /// Client save path.
    pub save_path: Option<String>,
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    external_id: Option<ExternalId>,
    name: Option<String>,
    origin: TaskOrigin,
    requester: RequesterId,
    conversation: ConversationId,
    status: TaskStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    error_detail: Option<String>,
    stats: TransferStats,
    placement: Option<FilePlacement>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Bound download client identifier, if resolved.
    pub external_id: Option<ExternalId>,
    /// Display name, once observed.
    pub name: Option<String>,
    /// Persisted origin.
    pub origin: TaskOrigin,
    /// Requesting chat user.
    pub requester: RequesterId,
    /// Conversation receiving notifications.
    pub conversation: ConversationId,
    /// Persisted lifecycle status.
    pub status: TaskStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure detail.
    pub error_detail: Option<String>,
    /// Observed transfer statistics.
    pub stats: TransferStats,
    /// Recorded file placement.
    pub placement: Option<FilePlacement>,
}

/// Outcome of applying one entry observation to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Status before the observation.
    pub previous: TaskStatus,
    /// Status after the observation.
    pub current: TaskStatus,
}

impl Observation {
    /// Returns `true` when this observation moved the task into `Completed`.
    #[must_use]
    pub fn completed_now(self) -> bool {
        self.current == TaskStatus::Completed && !self.previous.is_completed_or_later()
    }

    /// Returns `true` when the status changed.
    #[must_use]
    pub fn changed(self) -> bool {
        self.previous != self.current
    }
}

impl Task {
    /// Creates a new pending task.
    #[must_use]
    pub fn new(
        origin: TaskOrigin,
        requester: RequesterId,
        conversation: ConversationId,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id: TaskId::new(),
            external_id: None,
            name: None,
            origin,
            requester,
            conversation,
            status: TaskStatus::Pending,
            created_at: timestamp,
            updated_at: timestamp,
            completed_at: None,
            error_detail: None,
            stats: TransferStats::default(),
            placement: None,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            external_id: data.external_id,
            name: data.name,
            origin: data.origin,
            requester: data.requester,
            conversation: data.conversation,
            status: data.status,
            created_at: data.created_at,
            updated_at: data.updated_at,
            completed_at: data.completed_at,
            error_detail: data.error_detail,
            stats: data.stats,
            placement: data.placement,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the bound download client identifier, if resolved.
    #[must_use]
    pub const fn external_id(&self) -> Option<&ExternalId> {
        self.external_id.as_ref()
    }

    /// Returns the display name, once observed.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the task origin.
    #[must_use]
    pub const fn origin(&self) -> &TaskOrigin {
        &self.origin
    }

    /// Returns the requesting user.
    #[must_use]
    pub const fn requester(&self) -> RequesterId {
        self.requester
    }

    /// Returns the conversation that receives notifications.
    #[must_use]
    pub const fn conversation(&self) -> ConversationId {
        self.conversation
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the completion timestamp.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the failure detail.
    #[must_use]
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    /// Returns observed transfer statistics.
    #[must_use]
    pub const fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// Returns the recorded file placement.
    #[must_use]
    pub const fn placement(&self) -> Option<&FilePlacement> {
        self.placement.as_ref()
    }

    /// Returns the time between creation and completion.
    #[must_use]
    pub fn download_duration(&self) -> Option<Duration> {
        self.completed_at
            .map(|completed_at| completed_at - self.created_at)
    }

    /// Binds the task to a download client entry.
    ///
    /// Returns `false` when the task was already bound to the same entry.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::ExternalIdAlreadyAssigned`] when the task is
    /// bound to a different entry.
    pub fn bind_external_id(
        &mut self,
        external_id: ExternalId,
        clock: &impl Clock,
    ) -> Result<bool, TaskDomainError> {
        match &self.external_id {
            Some(existing) if *existing == external_id => Ok(false),
            Some(existing) => Err(TaskDomainError::ExternalIdAlreadyAssigned {
                task_id: self.id,
                existing: existing.to_string(),
            }),
            None => {
                self.external_id = Some(external_id);
                self.touch(clock);
                Ok(true)
            }
        }
    }

    /// Applies a download client observation.
    ///
    /// Observed fields are always refreshed. The status only moves forward:
    /// a stale or flapping entry never pulls a completed task back to
    /// downloading, and terminal tasks keep their status.
    pub fn observe(&mut self, entry: &ExternalEntry, clock: &impl Clock) -> Observation {
        let previous = self.status;
        let now = clock.utc();

        self.name = Some(entry.name.clone());
        self.stats.size_bytes = Some(entry.size);
        self.stats.seeders = Some(entry.seeders);
        self.stats.leechers = Some(entry.leechers);
        if !entry.save_path.is_empty() {
            self.stats.save_path = Some(entry.save_path.clone());
        }

        if let Some(target) = entry.state.observed_status() {
            if previous.can_advance_to(target) {
                self.status = target;
                match target {
                    TaskStatus::Completed => self.complete(entry, now),
                    TaskStatus::Failed => {
                        self.error_detail = Some(
                            entry
                                .error_detail
                                .clone()
                                .filter(|detail| !detail.trim().is_empty())
                                .unwrap_or_else(|| GENERIC_FAILURE_DETAIL.to_owned()),
                        );
                    }
                    TaskStatus::Pending | TaskStatus::Downloading | TaskStatus::Organized => {}
                }
            }
        }

        self.updated_at = now;
        Observation {
            previous,
            current: self.status,
        }
    }

    fn complete(&mut self, entry: &ExternalEntry, now: DateTime<Utc>) {
        self.completed_at = Some(now);
        let elapsed_seconds = u64::try_from((now - self.created_at).num_seconds()).unwrap_or(0);
        self.stats.average_speed = Some(
            entry
                .size
                .checked_div(elapsed_seconds)
                .unwrap_or(entry.download_rate),
        );
    }

    /// Moves a completed task to `Organized`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStatusTransition`] unless the task is
    /// currently `Completed`.
    pub fn mark_organized(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.advance(TaskStatus::Organized, clock)
    }

    /// Marks the task as failed with a detail message.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStatusTransition`] when the task has
    /// already completed or reached a terminal status.
    pub fn fail(
        &mut self,
        detail: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.advance(TaskStatus::Failed, clock)?;
        self.error_detail = Some(detail.into());
        Ok(())
    }

    /// Records where the payload lives and where it should be copied to.
    pub fn record_placement(&mut self, placement: FilePlacement, clock: &impl Clock) {
        self.placement = Some(placement);
        self.touch(clock);
    }

    fn advance(&mut self, target: TaskStatus, clock: &impl Clock) -> Result<(), TaskDomainError> {
        let is_allowed = self.status.can_advance_to(target)
            && (target != TaskStatus::Organized || self.status == TaskStatus::Completed);
        if !is_allowed {
            return Err(TaskDomainError::InvalidStatusTransition {
                task_id: self.id,
                from: self.status,
                to: target,
            });
        }
        self.status = target;
        self.touch(clock);
        Ok(())
    }

    /// Updates the `updated_at` timestamp to the current clock time.
    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}

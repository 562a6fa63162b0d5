//! Promotion of finished payloads into target storage.

use super::file_copy::{self, LargeFilePolicy};
use super::lifecycle::{TaskLifecycleError, TaskLifecycleService};
use super::messages;
use crate::task::{
    domain::{ConversationId, ExternalEntry, TaskStatus},
    ports::{DownloadGateway, EntryFilter, GatewayError, Notifier, TaskRepository},
};
use camino::{Utf8Path, Utf8PathBuf};
use mockable::Clock;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while organizing files.
#[derive(Debug, Error)]
pub enum OrganizerError {
    /// The task lifecycle rejected the operation.
    #[error(transparent)]
    Lifecycle(#[from] TaskLifecycleError),

    /// Seeding entries could not be listed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A copy failed.
    #[error("failed to copy from {path}: {source}")]
    Copy {
        /// Source path of the failed copy.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The blocking copy task did not finish.
    #[error("copy task aborted: {0}")]
    Join(String),

    /// The entry carries no save path to copy from.
    #[error("entry {0} has no save path")]
    MissingSavePath(String),
}

/// Result type for organizer operations.
pub type OrganizerResult<T> = Result<T, OrganizerError>;

/// Counters describing one organizer pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrganizerReport {
    /// Seeding entries examined.
    pub examined: usize,
    /// Entries with no task, or whose task is organized or failed.
    pub skipped: usize,
    /// Tasks moved to organized.
    pub organized: usize,
    /// Files copied.
    pub files_copied: usize,
    /// Entries that hit an error; the pass carried on.
    pub errors: usize,
}

/// Outcome of handling a forwarded completion notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionCopy {
    /// The text is not a completion notice.
    NotANotice,
    /// No task has a placement for the file.
    UnknownFile(String),
    /// The task was already organized; nothing was copied.
    AlreadyOrganized(String),
    /// The file was copied to its target.
    Copied(String),
}

/// Timer-driven organizer of finished downloads.
pub struct FileOrganizer<G, R, N, C>
where
    G: DownloadGateway,
    R: TaskRepository,
    N: Notifier,
    C: Clock + Send + Sync,
{
    gateway: Arc<G>,
    lifecycle: TaskLifecycleService<R, N, C>,
    target_root: Utf8PathBuf,
    policy: LargeFilePolicy,
}

impl<G, R, N, C> FileOrganizer<G, R, N, C>
where
    G: DownloadGateway,
    R: TaskRepository,
    N: Notifier,
    C: Clock + Send + Sync,
{
    /// Creates an organizer copying into `target_root` with the default
    /// large-file policy.
    #[must_use]
    pub fn new(
        gateway: Arc<G>,
        lifecycle: TaskLifecycleService<R, N, C>,
        target_root: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            gateway,
            lifecycle,
            target_root: target_root.into(),
            policy: LargeFilePolicy::default(),
        }
    }

    /// Replaces the large-file policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: LargeFilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the target storage root.
    #[must_use]
    pub fn target_root(&self) -> &Utf8Path {
        &self.target_root
    }

    /// Runs one organizer pass over seeding entries.
    ///
    /// # Errors
    ///
    /// Returns [`OrganizerError::Gateway`] when the seeding entries cannot be
    /// listed. Per-entry failures are logged and counted.
    pub async fn run_pass(&self) -> OrganizerResult<OrganizerReport> {
        let entries = self.gateway.list_entries(&EntryFilter::seeding()).await?;
        let mut report = OrganizerReport::default();

        for entry in &entries {
            report.examined += 1;
            if let Err(err) = self.organize_entry(entry, &mut report).await {
                report.errors += 1;
                tracing::warn!(external_id = %entry.id, error = %err, "organizing entry failed");
            }
        }

        tracing::debug!(?report, "organizer pass finished");
        Ok(report)
    }

    async fn organize_entry(
        &self,
        entry: &ExternalEntry,
        report: &mut OrganizerReport,
    ) -> OrganizerResult<()> {
        let Some(task) = self.lifecycle.find_by_external_id(&entry.id).await? else {
            report.skipped += 1;
            return Ok(());
        };
        if matches!(task.status(), TaskStatus::Organized | TaskStatus::Failed) {
            report.skipped += 1;
            return Ok(());
        }
        if entry.save_path.is_empty() {
            return Err(OrganizerError::MissingSavePath(entry.id.to_string()));
        }

        let source_root = Utf8PathBuf::from(entry.save_path.as_str());
        let target_root = self.target_root.clone();
        let policy = self.policy;
        let copied = run_copy(source_root.clone(), move || {
            file_copy::copy_large_files(&source_root, &target_root, policy)
        })
        .await?;
        report.files_copied += copied.len();

        if self.lifecycle.mark_organized(task.id(), entry).await? {
            report.organized += 1;
            tracing::info!(
                task_id = %task.id(),
                external_id = %entry.id,
                files = copied.len(),
                "download organized"
            );
        }
        Ok(())
    }

    /// Handles a forwarded completion notice by copying the named file to
    /// its recorded target and replying to `conversation`.
    ///
    /// The task status is left alone; only a pass over seeding entries moves
    /// a task to `Organized`.
    ///
    /// # Errors
    ///
    /// Returns [`OrganizerError`] when the lookup or the copy fails.
    pub async fn handle_completion_notice(
        &self,
        conversation: ConversationId,
        text: &str,
    ) -> OrganizerResult<CompletionCopy> {
        let Some(file_name) = messages::completed_file_name(text) else {
            return Ok(CompletionCopy::NotANotice);
        };
        let Some(task) = self.lifecycle.find_by_file_name(file_name).await? else {
            tracing::warn!(file_name, "no task recorded for completed file");
            return Ok(CompletionCopy::UnknownFile(file_name.to_owned()));
        };
        if task.status() == TaskStatus::Organized {
            return Ok(CompletionCopy::AlreadyOrganized(file_name.to_owned()));
        }
        let Some(placement) = task.placement().cloned() else {
            return Ok(CompletionCopy::UnknownFile(file_name.to_owned()));
        };

        let source_path = placement.source_path.clone();
        run_copy(placement.source_path.clone(), move || {
            file_copy::copy_single_file(&placement.source_path, &placement.target_path)
        })
        .await?;
        tracing::info!(task_id = %task.id(), file = %source_path, "completed file copied");
        self.lifecycle
            .send(conversation, &format!("File copied: {file_name}"))
            .await;
        Ok(CompletionCopy::Copied(file_name.to_owned()))
    }
}

async fn run_copy<T, F>(path: Utf8PathBuf, copy: F) -> OrganizerResult<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(copy)
        .await
        .map_err(|err| OrganizerError::Join(err.to_string()))?
        .map_err(|source| OrganizerError::Copy { path, source })
}

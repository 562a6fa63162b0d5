//! Periodic reconciliation of stored tasks against live download client
//! entries.

use super::lifecycle::{TaskLifecycleResult, TaskLifecycleService};
use crate::task::{
    domain::{Task, TaskStatus},
    ports::{DownloadGateway, Notifier, TaskRepository},
};
use chrono::Duration;
use mockable::Clock;
use std::sync::Arc;

/// Counters describing one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Non-terminal tasks examined.
    pub examined: usize,
    /// Tasks skipped because no entry was resolved yet.
    pub unresolved: usize,
    /// Tasks whose entry was observed.
    pub observed: usize,
    /// Tasks that completed during this pass.
    pub completed: usize,
    /// Tasks that failed during this pass.
    pub failed: usize,
    /// Tasks whose entry no longer exists in the client.
    pub missing: usize,
    /// Unresolved tasks failed by the expiry policy.
    pub expired: usize,
    /// Tasks that hit an error; the pass carried on.
    pub errors: usize,
}

/// Timer-driven reconciliation of task state.
pub struct ReconciliationService<G, R, N, C>
where
    G: DownloadGateway,
    R: TaskRepository,
    N: Notifier,
    C: Clock + Send + Sync,
{
    gateway: Arc<G>,
    lifecycle: TaskLifecycleService<R, N, C>,
    resolution_expiry: Option<Duration>,
}

impl<G, R, N, C> ReconciliationService<G, R, N, C>
where
    G: DownloadGateway,
    R: TaskRepository,
    N: Notifier,
    C: Clock + Send + Sync,
{
    /// Creates a reconciliation service with unresolved-task expiry disabled.
    #[must_use]
    pub const fn new(gateway: Arc<G>, lifecycle: TaskLifecycleService<R, N, C>) -> Self {
        Self {
            gateway,
            lifecycle,
            resolution_expiry: None,
        }
    }

    /// Fails tasks still unresolved `expiry` after creation.
    #[must_use]
    pub const fn with_resolution_expiry(mut self, expiry: Duration) -> Self {
        self.resolution_expiry = Some(expiry);
        self
    }

    /// Runs one reconciliation pass.
    ///
    /// Failures for one task are logged and counted; they never stop the
    /// pass.
    ///
    /// # Errors
    ///
    /// Returns the repository error when the task list cannot be loaded.
    pub async fn run_pass(&self) -> TaskLifecycleResult<ReconciliationReport> {
        let tasks = self.lifecycle.list_tasks().await?;
        let mut report = ReconciliationReport::default();

        for task in tasks.iter().filter(|task| !task.status().is_terminal()) {
            report.examined += 1;
            if let Err(err) = self.reconcile_task(task, &mut report).await {
                report.errors += 1;
                tracing::warn!(task_id = %task.id(), error = %err, "task reconciliation failed");
            }
        }

        tracing::debug!(?report, "reconciliation pass finished");
        Ok(report)
    }

    async fn reconcile_task(
        &self,
        task: &Task,
        report: &mut ReconciliationReport,
    ) -> TaskLifecycleResult<()> {
        let Some(external_id) = task.external_id() else {
            return self.handle_unresolved(task, report).await;
        };

        let Some(entry) = self.gateway.get_entry(external_id).await? else {
            report.missing += 1;
            tracing::info!(
                task_id = %task.id(),
                external_id = %external_id,
                "download client entry is gone"
            );
            return Ok(());
        };

        let observation = self.lifecycle.apply_observed_state(task.id(), &entry).await?;
        report.observed += 1;
        if observation.completed_now() {
            report.completed += 1;
        }
        if observation.changed() && observation.current == TaskStatus::Failed {
            report.failed += 1;
        }
        Ok(())
    }

    async fn handle_unresolved(
        &self,
        task: &Task,
        report: &mut ReconciliationReport,
    ) -> TaskLifecycleResult<()> {
        let Some(expiry) = self.resolution_expiry else {
            report.unresolved += 1;
            return Ok(());
        };
        if self.lifecycle.fail_unresolved(task.id(), expiry).await? {
            report.expired += 1;
        } else {
            report.unresolved += 1;
        }
        Ok(())
    }
}

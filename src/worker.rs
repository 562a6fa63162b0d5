//! Fixed-period background jobs.
//!
//! Each tick runs the job on its own task, so a slow pass never delays the
//! schedule and consecutive passes may overlap. Services tolerate overlap
//! through conditional repository writes.

use crate::task::{
    ports::{DownloadGateway, Notifier, TaskRepository},
    services::{FileOrganizer, ReconciliationService},
};
use async_trait::async_trait;
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A unit of work run on a fixed period.
#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Runs one pass. Failures are logged by the job itself.
    async fn run_once(&self);
}

/// Spawns a loop that starts `job` every `period` until `shutdown` turns
/// `true` or its sender is dropped.
///
/// The first pass starts immediately. Passes already started are left to
/// finish.
#[must_use]
pub fn spawn_periodic<J>(
    job: Arc<J>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    J: PeriodicJob,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(job = job.name(), period_secs = period.as_secs(), "periodic job started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let pass = Arc::clone(&job);
                    tokio::spawn(async move { pass.run_once().await });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(job = job.name(), "periodic job stopped");
    })
}

#[async_trait]
impl<G, R, N, C> PeriodicJob for ReconciliationService<G, R, N, C>
where
    G: DownloadGateway + 'static,
    R: TaskRepository + 'static,
    N: Notifier + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "reconciliation"
    }

    async fn run_once(&self) {
        if let Err(err) = self.run_pass().await {
            tracing::error!(error = %err, "reconciliation pass aborted");
        }
    }
}

#[async_trait]
impl<G, R, N, C> PeriodicJob for FileOrganizer<G, R, N, C>
where
    G: DownloadGateway + 'static,
    R: TaskRepository + 'static,
    N: Notifier + 'static,
    C: Clock + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "organizer"
    }

    async fn run_once(&self) {
        if let Err(err) = self.run_pass().await {
            tracing::error!(error = %err, "organizer pass aborted");
        }
    }
}

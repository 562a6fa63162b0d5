//! Correlation of a submitted request with the download client entry it
//! produced.

use crate::task::{
    domain::{ExternalEntry, ExternalId, TaskId, TaskOrigin},
    ports::{DownloadGateway, EntryFilter, GatewayError, TaskRepository, TaskRepositoryError},
};
use std::collections::HashSet;
use std::hash::BuildHasher;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by [`HashResolver::resolve`].
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// No suitable entry was found. The task stays pending.
    #[error("no download client entry matches the request")]
    NotFound,

    /// The download client could not be listed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Owned identifiers could not be loaded.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
}

/// Picks the entry that corresponds to `origin` from a snapshot of entries.
///
/// A magnet origin selects the entry whose identifier starts with the magnet
/// info hash, ignoring case. When that entry already belongs to another task
/// nothing is selected. Without a hash match, the most recently added entry
/// that no other task owns is chosen; equal timestamps resolve to the
/// smallest identifier.
#[must_use]
pub fn select_entry<'a, S: BuildHasher>(
    origin: &TaskOrigin,
    entries: &'a [ExternalEntry],
    owned: &HashSet<ExternalId, S>,
) -> Option<&'a ExternalEntry> {
    let info_hash = origin.magnet().and_then(|link| link.info_hash());
    if let Some(hash) = info_hash {
        let matched = entries
            .iter()
            .filter(|entry| entry.id.starts_with_ignore_case(&hash))
            .min_by(|left, right| left.id.cmp(&right.id));
        if let Some(entry) = matched {
            return (!owned.contains(&entry.id)).then_some(entry);
        }
    }

    entries
        .iter()
        .filter(|entry| !owned.contains(&entry.id))
        .max_by(|left, right| {
            left.added_at
                .cmp(&right.added_at)
                .then_with(|| right.id.cmp(&left.id))
        })
}

/// Resolves pending tasks to download client entries.
pub struct HashResolver<G, R>
where
    G: DownloadGateway,
    R: TaskRepository,
{
    gateway: Arc<G>,
    repository: Arc<R>,
}

impl<G, R> Clone for HashResolver<G, R>
where
    G: DownloadGateway,
    R: TaskRepository,
{
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<G, R> HashResolver<G, R>
where
    G: DownloadGateway,
    R: TaskRepository,
{
    /// Creates a resolver.
    #[must_use]
    pub const fn new(gateway: Arc<G>, repository: Arc<R>) -> Self {
        Self {
            gateway,
            repository,
        }
    }

    /// Resolves the entry for `task_id` from a fresh snapshot of the client.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when no entry qualifies, and the
    /// wrapped gateway or repository error when the snapshot cannot be taken.
    pub async fn resolve(
        &self,
        task_id: TaskId,
        origin: &TaskOrigin,
    ) -> Result<ExternalId, ResolveError> {
        let entries = self.gateway.list_entries(&EntryFilter::all()).await?;
        let owned: HashSet<ExternalId> = self
            .repository
            .find_all()
            .await?
            .into_iter()
            .filter(|task| task.id() != task_id)
            .filter_map(|task| task.external_id().cloned())
            .collect();

        let selected = select_entry(origin, &entries, &owned).ok_or(ResolveError::NotFound)?;
        tracing::debug!(
            task_id = %task_id,
            external_id = %selected.id,
            candidates = entries.len(),
            "download client entry selected"
        );
        Ok(selected.id.clone())
    }
}

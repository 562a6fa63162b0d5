//! In-memory download gateway.

use crate::task::{
    domain::{EntryState, ExternalEntry, ExternalId},
    ports::{DownloadGateway, EntryFilter, EntrySort, GatewayError, GatewayResult, SubmitRequest},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// In-memory download gateway.
///
/// This adapter models the download client without a network. Tests seed
/// entries directly and inspect submissions; failures can be injected for the
/// next `list_entries` or `get_entry` call.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDownloadGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    entries: BTreeMap<ExternalId, ExternalEntry>,
    submissions: Vec<SubmitRequest>,
    authentications: usize,
    fail_next_read: Option<String>,
}

fn lock_error(err: impl ToString) -> GatewayError {
    GatewayError::transport(std::io::Error::other(err.to_string()))
}

impl InMemoryDownloadGateway {
    /// Creates an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entry.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn upsert_entry(&self, entry: ExternalEntry) -> GatewayResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Changes the lifecycle state of an existing entry.
    ///
    /// Returns `false` when the entry does not exist.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn set_state(&self, id: &ExternalId, entry_state: EntryState) -> GatewayResult<bool> {
        let mut state = self.state.write().map_err(lock_error)?;
        Ok(state.entries.get_mut(id).is_some_and(|entry| {
            entry.state = entry_state;
            true
        }))
    }

    /// Removes an entry as if it had been deleted in the client.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn remove_entry(&self, id: &ExternalId) -> GatewayResult<Option<ExternalEntry>> {
        let mut state = self.state.write().map_err(lock_error)?;
        Ok(state.entries.remove(id))
    }

    /// Makes the next read operation fail with a request error.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn fail_next_read(&self, body: impl Into<String>) -> GatewayResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.fail_next_read = Some(body.into());
        Ok(())
    }

    /// Returns every submission received so far.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn submissions(&self) -> GatewayResult<Vec<SubmitRequest>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.submissions.clone())
    }

    /// Returns how many times [`DownloadGateway::authenticate`] was called.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn authentication_count(&self) -> GatewayResult<usize> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.authentications)
    }

    fn take_read_failure(&self, operation: &'static str) -> GatewayResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        match state.fail_next_read.take() {
            Some(body) => Err(GatewayError::Request {
                operation,
                status: 500,
                body,
            }),
            None => Ok(()),
        }
    }

    fn with_entry(
        &self,
        id: &ExternalId,
        mutate: impl FnOnce(&mut ExternalEntry),
    ) -> GatewayResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        let entry = state
            .entries
            .get_mut(id)
            .ok_or_else(|| GatewayError::Request {
                operation: "mutate",
                status: 404,
                body: format!("unknown entry {id}"),
            })?;
        mutate(entry);
        Ok(())
    }
}

fn sort_entries(entries: &mut [ExternalEntry], sort: EntrySort) {
    match sort {
        EntrySort::AddedOn => entries.sort_by_key(|entry| entry.added_at),
        EntrySort::Name => entries.sort_by(|left, right| left.name.cmp(&right.name)),
        EntrySort::Progress => entries.sort_by(|left, right| left.progress.total_cmp(&right.progress)),
    }
}

#[async_trait]
impl DownloadGateway for InMemoryDownloadGateway {
    async fn authenticate(&self) -> GatewayResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.authentications = state.authentications.saturating_add(1);
        Ok(())
    }

    async fn submit(&self, request: &SubmitRequest) -> GatewayResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.submissions.push(request.clone());
        Ok(())
    }

    async fn list_entries(&self, filter: &EntryFilter) -> GatewayResult<Vec<ExternalEntry>> {
        self.take_read_failure("list_entries")?;
        let state = self.state.read().map_err(lock_error)?;
        let mut entries: Vec<ExternalEntry> = state
            .entries
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        if let Some(sort) = filter.sort {
            sort_entries(&mut entries, sort);
        }
        if filter.reverse {
            entries.reverse();
        }
        Ok(entries
            .into_iter()
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn get_entry(&self, id: &ExternalId) -> GatewayResult<Option<ExternalEntry>> {
        self.take_read_failure("get_entry")?;
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.entries.get(id).cloned())
    }

    async fn delete(&self, id: &ExternalId, _purge_files: bool) -> GatewayResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.entries.remove(id);
        Ok(())
    }

    async fn pause(&self, id: &ExternalId) -> GatewayResult<()> {
        self.with_entry(id, |entry| {
            entry.state = if entry.state.is_seeding() {
                EntryState::PausedUploading
            } else {
                EntryState::PausedDownloading
            };
        })
    }

    async fn resume(&self, id: &ExternalId) -> GatewayResult<()> {
        self.with_entry(id, |entry| {
            entry.state = match entry.state {
                EntryState::PausedUploading | EntryState::StoppedUploading => EntryState::Uploading,
                EntryState::PausedDownloading | EntryState::StoppedDownloading => {
                    EntryState::Downloading
                }
                ref other => other.clone(),
            };
        })
    }

    async fn add_tags(&self, id: &ExternalId, tags: &[String]) -> GatewayResult<()> {
        self.with_entry(id, |entry| {
            for tag in tags {
                if !entry.tags.contains(tag) {
                    entry.tags.push(tag.clone());
                }
            }
        })
    }

    async fn remove_tags(&self, id: &ExternalId, tags: &[String]) -> GatewayResult<()> {
        self.with_entry(id, |entry| entry.tags.retain(|tag| !tags.contains(tag)))
    }
}

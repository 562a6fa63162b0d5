//! Gateway port for the remote download client.

use crate::task::domain::{EntryState, ExternalEntry, ExternalId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for download gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Payload handed to the download client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentSource {
    /// A magnet URI.
    Magnet(String),
    /// Raw `.torrent` file contents.
    File {
        /// File name presented to the client.
        file_name: String,
        /// File contents.
        contents: Vec<u8>,
    },
}

impl TorrentSource {
    /// Returns a short label for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Magnet(_) => "magnet",
            Self::File { .. } => "torrent_file",
        }
    }
}

/// Submission request for a new download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    /// What to download.
    pub source: TorrentSource,
    /// Client category.
    pub category: Option<String>,
    /// Client tags.
    pub tags: Vec<String>,
    /// Directory the client should save into.
    pub save_path: Option<String>,
}

impl SubmitRequest {
    /// Creates a submission with no category, tags, or save path.
    #[must_use]
    pub const fn new(source: TorrentSource) -> Self {
        Self {
            source,
            category: None,
            tags: Vec::new(),
            save_path: None,
        }
    }

    /// Sets the client category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the client tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    /// Sets the save directory.
    #[must_use]
    pub fn with_save_path(mut self, save_path: impl Into<String>) -> Self {
        self.save_path = Some(save_path.into());
        self
    }
}

/// Sort key accepted by entry listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySort {
    /// Sort by added timestamp.
    AddedOn,
    /// Sort by name.
    Name,
    /// Sort by progress.
    Progress,
}

impl EntrySort {
    /// Returns the wire field name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddedOn => "added_on",
            Self::Name => "name",
            Self::Progress => "progress",
        }
    }
}

/// Filter for entry listings. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    /// Keep only entries in one of these states.
    pub states: Vec<EntryState>,
    /// Keep only entries in this category.
    pub category: Option<String>,
    /// Keep only entries carrying this tag.
    pub tag: Option<String>,
    /// Keep only these identifiers.
    pub ids: Vec<ExternalId>,
    /// Sort key.
    pub sort: Option<EntrySort>,
    /// Reverse the sort order.
    pub reverse: bool,
    /// Maximum number of entries.
    pub limit: Option<usize>,
    /// Number of entries to skip.
    pub offset: Option<usize>,
}

impl EntryFilter {
    /// Returns a filter matching every entry.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Returns a filter matching entries that finished transferring and are
    /// seeding or paused while seeding.
    #[must_use]
    pub fn seeding() -> Self {
        Self {
            states: vec![
                EntryState::Uploading,
                EntryState::PausedUploading,
                EntryState::StoppedUploading,
            ],
            ..Self::default()
        }
    }

    /// Returns a filter for one identifier.
    #[must_use]
    pub fn by_id(id: ExternalId) -> Self {
        Self {
            ids: vec![id],
            ..Self::default()
        }
    }

    /// Returns `true` when `entry` satisfies the predicate fields of the
    /// filter. Sorting and paging are not considered.
    #[must_use]
    pub fn matches(&self, entry: &ExternalEntry) -> bool {
        let state_ok = self.states.is_empty() || self.states.contains(&entry.state);
        let category_ok = self
            .category
            .as_ref()
            .is_none_or(|category| entry.category.as_ref() == Some(category));
        let tag_ok = self
            .tag
            .as_ref()
            .is_none_or(|tag| entry.tags.contains(tag));
        let id_ok = self.ids.is_empty() || self.ids.contains(&entry.id);
        state_ok && category_ok && tag_ok && id_ok
    }
}

/// Capability contract for the remote download client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DownloadGateway: Send + Sync {
    /// Establishes (or re-establishes) a session with the client.
    async fn authenticate(&self) -> GatewayResult<()>;

    /// Submits a new download.
    async fn submit(&self, request: &SubmitRequest) -> GatewayResult<()>;

    /// Lists live entries matching `filter`.
    async fn list_entries(&self, filter: &EntryFilter) -> GatewayResult<Vec<ExternalEntry>>;

    /// Fetches one entry; `None` when the client no longer knows it.
    async fn get_entry(&self, id: &ExternalId) -> GatewayResult<Option<ExternalEntry>>;

    /// Deletes an entry, optionally purging its files.
    async fn delete(&self, id: &ExternalId, purge_files: bool) -> GatewayResult<()>;

    /// Pauses an entry.
    async fn pause(&self, id: &ExternalId) -> GatewayResult<()>;

    /// Resumes an entry.
    async fn resume(&self, id: &ExternalId) -> GatewayResult<()>;

    /// Adds tags to an entry.
    async fn add_tags(&self, id: &ExternalId, tags: &[String]) -> GatewayResult<()>;

    /// Removes tags from an entry.
    async fn remove_tags(&self, id: &ExternalId, tags: &[String]) -> GatewayResult<()>;
}

/// Errors returned by download gateway adapters.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The session could not be established or expired and could not be
    /// renewed.
    #[error("download client authentication failed: {0}")]
    Authentication(String),

    /// The client answered with a non-success status.
    #[error("download client request {operation} failed with status {status}: {body}")]
    Request {
        /// Operation name.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The client answered with a payload this crate cannot decode.
    #[error("download client response for {operation} could not be decoded: {reason}")]
    Decode {
        /// Operation name.
        operation: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// Network or runtime failure.
    #[error("download client transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl GatewayError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}

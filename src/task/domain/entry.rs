//! Read-only mirror of a download client entry.

use super::{ExternalId, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state reported by the download client.
///
/// The value set is owned by the download client; unknown values are kept
/// verbatim in [`EntryState::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryState {
    /// Generic queued state.
    Queued,
    /// Payload is being downloaded.
    Downloading,
    /// Fetching metadata for a magnet link.
    MetaDownloading,
    /// Download forced past queue limits.
    ForcedDownloading,
    /// Download queued by the client.
    QueuedDownloading,
    /// Download has no peers to fetch from.
    StalledDownloading,
    /// Checking pieces while still downloading.
    CheckingDownloading,
    /// Allocating disk space.
    Allocating,
    /// Download paused (`pausedDL`).
    PausedDownloading,
    /// Download stopped (`stoppedDL`, the qBittorrent 5 name for a pause).
    StoppedDownloading,
    /// Payload complete and seeding.
    Uploading,
    /// Seeding paused (`pausedUP`).
    PausedUploading,
    /// Seeding stopped (`stoppedUP`, the qBittorrent 5 name for a pause).
    StoppedUploading,
    /// Seeding queued by the client.
    QueuedUploading,
    /// Seeding without connected peers.
    StalledUploading,
    /// Seeding forced past queue limits.
    ForcedUploading,
    /// Checking pieces after completion.
    CheckingUploading,
    /// Generic completed state.
    Completed,
    /// The client reported an error.
    Error,
    /// Payload files are missing on disk.
    MissingFiles,
    /// Any state this crate does not interpret.
    Other(String),
}

impl EntryState {
    /// Returns the wire representation used by the download client.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::MetaDownloading => "metaDL",
            Self::ForcedDownloading => "forcedDL",
            Self::QueuedDownloading => "queuedDL",
            Self::StalledDownloading => "stalledDL",
            Self::CheckingDownloading => "checkingDL",
            Self::Allocating => "allocating",
            Self::PausedDownloading => "pausedDL",
            Self::StoppedDownloading => "stoppedDL",
            Self::Uploading => "uploading",
            Self::PausedUploading => "pausedUP",
            Self::StoppedUploading => "stoppedUP",
            Self::QueuedUploading => "queuedUP",
            Self::StalledUploading => "stalledUP",
            Self::ForcedUploading => "forcedUP",
            Self::CheckingUploading => "checkingUP",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::MissingFiles => "missingFiles",
            Self::Other(value) => value,
        }
    }

    /// Maps the external state onto the internal task status.
    ///
    /// Returns `None` for states that carry no lifecycle meaning (moving,
    /// resume-data checks, unknown values).
    #[must_use]
    pub const fn observed_status(&self) -> Option<TaskStatus> {
        match self {
            Self::Queued
            | Self::Downloading
            | Self::MetaDownloading
            | Self::ForcedDownloading
            | Self::QueuedDownloading
            | Self::StalledDownloading
            | Self::CheckingDownloading
            | Self::Allocating
            | Self::PausedDownloading
            | Self::StoppedDownloading => Some(TaskStatus::Downloading),
            Self::Uploading
            | Self::PausedUploading
            | Self::StoppedUploading
            | Self::QueuedUploading
            | Self::StalledUploading
            | Self::ForcedUploading
            | Self::CheckingUploading
            | Self::Completed => Some(TaskStatus::Completed),
            Self::Error | Self::MissingFiles => Some(TaskStatus::Failed),
            Self::Other(_) => None,
        }
    }

    /// Returns `true` when the payload is fully transferred and only
    /// (possibly paused) seeding remains.
    #[must_use]
    pub const fn is_seeding(&self) -> bool {
        matches!(
            self,
            Self::Uploading | Self::PausedUploading | Self::StoppedUploading
        )
    }
}

impl From<&str> for EntryState {
    fn from(value: &str) -> Self {
        match value {
            "queued" => Self::Queued,
            "downloading" => Self::Downloading,
            "metaDL" => Self::MetaDownloading,
            "forcedDL" => Self::ForcedDownloading,
            "queuedDL" => Self::QueuedDownloading,
            "stalledDL" | "stalled" => Self::StalledDownloading,
            "checkingDL" => Self::CheckingDownloading,
            "allocating" => Self::Allocating,
            "pausedDL" => Self::PausedDownloading,
            "stoppedDL" => Self::StoppedDownloading,
            "uploading" => Self::Uploading,
            "pausedUP" => Self::PausedUploading,
            "stoppedUP" => Self::StoppedUploading,
            "queuedUP" => Self::QueuedUploading,
            "stalledUP" => Self::StalledUploading,
            "forcedUP" => Self::ForcedUploading,
            "checkingUP" => Self::CheckingUploading,
            "completed" => Self::Completed,
            "error" => Self::Error,
            "missingFiles" => Self::MissingFiles,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for EntryState {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<EntryState> for String {
    fn from(value: EntryState) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one download client entry.
///
/// Entries are never persisted; they are fetched fresh on every pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEntry {
    /// Entry identifier (torrent hash).
    pub id: ExternalId,
    /// Display name.
    pub name: String,
    /// Total payload size in bytes.
    pub size: u64,
    /// Progress in the range `0.0..=1.0`.
    pub progress: f64,
    /// Current download rate in bytes per second.
    pub download_rate: u64,
    /// Current upload rate in bytes per second.
    pub upload_rate: u64,
    /// Estimated seconds remaining.
    pub eta_seconds: u64,
    /// Lifecycle state.
    pub state: EntryState,
    /// Category assigned in the client.
    pub category: Option<String>,
    /// Tags assigned in the client.
    pub tags: Vec<String>,
    /// Directory the payload is saved under.
    pub save_path: String,
    /// Connected seeders.
    pub seeders: u32,
    /// Connected leechers.
    pub leechers: u32,
    /// When the entry was added to the client.
    pub added_at: DateTime<Utc>,
    /// When the payload finished, if it has.
    pub completed_at: Option<DateTime<Utc>>,
    /// Last time data moved.
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Error text reported by the client, if any.
    pub error_detail: Option<String>,
}

impl ExternalEntry {
    /// Creates an entry with the identifying fields set and every counter
    /// zeroed.
    #[must_use]
    pub fn new(
        id: ExternalId,
        name: impl Into<String>,
        state: EntryState,
        added_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            size: 0,
            progress: 0.0,
            download_rate: 0,
            upload_rate: 0,
            eta_seconds: 0,
            state,
            category: None,
            tags: Vec::new(),
            save_path: String::new(),
            seeders: 0,
            leechers: 0,
            added_at,
            completed_at: None,
            last_activity_at: None,
            error_detail: None,
        }
    }

    /// Sets the payload size.
    #[must_use]
    pub const fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Sets the save path.
    #[must_use]
    pub fn with_save_path(mut self, save_path: impl Into<String>) -> Self {
        self.save_path = save_path.into();
        self
    }

    /// Sets the progress fraction.
    #[must_use]
    pub const fn with_progress(mut self, progress: f64) -> Self {
        self.progress = progress;
        self
    }

    /// Sets the transfer rates.
    #[must_use]
    pub const fn with_rates(mut self, download_rate: u64, upload_rate: u64) -> Self {
        self.download_rate = download_rate;
        self.upload_rate = upload_rate;
        self
    }

    /// Sets peer counts.
    #[must_use]
    pub const fn with_peers(mut self, seeders: u32, leechers: u32) -> Self {
        self.seeders = seeders;
        self.leechers = leechers;
        self
    }

    /// Sets the lifecycle state.
    #[must_use]
    pub fn with_state(mut self, state: EntryState) -> Self {
        self.state = state;
        self
    }

    /// Sets the client-reported error text.
    #[must_use]
    pub fn with_error_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    /// Sets category and tags.
    #[must_use]
    pub fn with_labels(
        mut self,
        category: Option<String>,
        tags: impl IntoIterator<Item = String>,
    ) -> Self {
        self.category = category;
        self.tags = tags.into_iter().collect();
        self
    }
}

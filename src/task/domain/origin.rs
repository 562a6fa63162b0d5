//! Request origin: the magnet link or torrent file a task was created from.

use super::TaskDomainError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

#[expect(clippy::expect_used, reason = "pattern is a compile-time constant")]
static BTIH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)xt=urn:btih:([a-z0-9]+)").expect("btih pattern compiles")
});

/// A `magnet:?` URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MagnetLink(String);

impl MagnetLink {
    /// Creates a validated magnet link.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidMagnetLink`] when the value does not
    /// start with `magnet:?`.
    pub fn new(value: impl Into<String>) -> Result<Self, TaskDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        let has_scheme = trimmed
            .get(..8)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("magnet:?"));
        if !has_scheme {
            return Err(TaskDomainError::InvalidMagnetLink(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the link as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extracts the content hash from the `btih:` segment, lowercased.
    ///
    /// Returns `None` when the link carries no BitTorrent info-hash.
    #[must_use]
    pub fn info_hash(&self) -> Option<String> {
        BTIH_PATTERN
            .captures(&self.0)
            .and_then(|captures| captures.get(1))
            .map(|hash| hash.as_str().to_ascii_lowercase())
    }
}

impl fmt::Display for MagnetLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Origin information persisted with each task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskOrigin {
    /// Task requested with a magnet link.
    Magnet {
        /// The submitted link.
        link: MagnetLink,
    },
    /// Task requested with an uploaded `.torrent` file.
    TorrentFile {
        /// Uploaded file name, when the transport provided one.
        file_name: Option<String>,
    },
}

impl TaskOrigin {
    /// Returns the magnet link when the origin is magnet-based.
    #[must_use]
    pub const fn magnet(&self) -> Option<&MagnetLink> {
        match self {
            Self::Magnet { link } => Some(link),
            Self::TorrentFile { .. } => None,
        }
    }

    /// Returns a short label suitable for storage and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Magnet { .. } => "magnet",
            Self::TorrentFile { .. } => "torrent_file",
        }
    }
}

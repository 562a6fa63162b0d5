//! Task lifecycle status and its forward-only ordering.

use super::ParseTaskStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle status.
///
/// The forward chain is `Pending → Downloading → Completed → Organized`.
/// `Failed` is reachable from `Pending` and `Downloading` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task recorded, external entry not observed yet.
    Pending,
    /// External entry is transferring payload.
    Downloading,
    /// Payload fully transferred.
    Completed,
    /// Large files promoted to target storage.
    Organized,
    /// Download client reported an error.
    Failed,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Organized => "organized",
            Self::Failed => "failed",
        }
    }

    /// Position on the forward chain; `Failed` sits outside it.
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Downloading => Some(1),
            Self::Completed => Some(2),
            Self::Organized => Some(3),
            Self::Failed => None,
        }
    }

    /// Returns `true` for statuses that accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Organized | Self::Failed)
    }

    /// Returns `true` once the payload has been observed as complete.
    #[must_use]
    pub const fn is_completed_or_later(self) -> bool {
        matches!(self, Self::Completed | Self::Organized)
    }

    /// Returns `true` when moving to `next` advances the lifecycle.
    ///
    /// Regressions, self-transitions, and any transition out of a terminal
    /// status are rejected.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self.rank(), next.rank()) {
            (Some(current), Some(target)) => target > current,
            (Some(_), None) => !self.is_completed_or_later(),
            (None, _) => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "downloading" => Ok(Self::Downloading),
            "completed" => Ok(Self::Completed),
            "organized" => Ok(Self::Organized),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseTaskStatusError(value.to_owned())),
        }
    }
}

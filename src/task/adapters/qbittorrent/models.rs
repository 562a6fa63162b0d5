//! Wire models for the qBittorrent Web API v2.

use crate::task::domain::{EntryState, ExternalEntry, ExternalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// One element of the `/torrents/info` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TorrentInfo {
    /// Info hash.
    pub hash: String,
    /// Display name.
    pub name: String,
    /// Selected payload size in bytes.
    pub size: i64,
    /// Progress in the range `0.0..=1.0`.
    pub progress: f64,
    /// Download rate in bytes per second.
    pub dlspeed: i64,
    /// Upload rate in bytes per second.
    pub upspeed: i64,
    /// Estimated seconds remaining.
    pub eta: i64,
    /// Lifecycle state.
    pub state: String,
    /// Category; empty when unset.
    pub category: String,
    /// Tags, sent as a comma-separated string by current servers.
    #[serde(deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    /// Save directory.
    pub save_path: String,
    /// Connected seeders.
    pub num_seeds: i64,
    /// Connected leechers.
    pub num_leechs: i64,
    /// Epoch seconds when the torrent was added.
    pub added_on: i64,
    /// Epoch seconds when the payload completed; non-positive when pending.
    pub completion_on: i64,
    /// Epoch seconds of the last transfer activity.
    pub last_activity: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagsWire {
    Text(String),
    List(Vec<String>),
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<TagsWire>::deserialize(deserializer)?;
    let tags = match raw {
        None => Vec::new(),
        Some(TagsWire::Text(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(TagsWire::List(list)) => list
            .into_iter()
            .map(|tag| tag.trim().to_owned())
            .filter(|tag| !tag.is_empty())
            .collect(),
    };
    Ok(tags)
}

fn timestamp(seconds: i64) -> Option<DateTime<Utc>> {
    if seconds > 0 {
        DateTime::from_timestamp(seconds, 0)
    } else {
        None
    }
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn peer_count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

impl TryFrom<TorrentInfo> for ExternalEntry {
    type Error = String;

    fn try_from(info: TorrentInfo) -> Result<Self, Self::Error> {
        let id = ExternalId::new(info.hash).map_err(|err| err.to_string())?;
        let category = Some(info.category).filter(|category| !category.is_empty());
        Ok(Self {
            id,
            name: info.name,
            size: non_negative(info.size),
            progress: info.progress,
            download_rate: non_negative(info.dlspeed),
            upload_rate: non_negative(info.upspeed),
            eta_seconds: non_negative(info.eta),
            state: EntryState::from(info.state),
            category,
            tags: info.tags,
            save_path: info.save_path,
            seeders: peer_count(info.num_seeds),
            leechers: peer_count(info.num_leechs),
            added_at: timestamp(info.added_on).unwrap_or(DateTime::UNIX_EPOCH),
            completed_at: timestamp(info.completion_on),
            last_activity_at: timestamp(info.last_activity),
            error_detail: None,
        })
    }
}

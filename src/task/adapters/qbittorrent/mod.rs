//! qBittorrent Web API adapter for the download gateway port.

mod client;
mod models;

pub use client::{QbittorrentGateway, QbittorrentSettings};

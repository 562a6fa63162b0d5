//! Port contracts for download task management.
//!
//! Ports define infrastructure-agnostic interfaces used by task services:
//! persistence, the remote download client, and outbound chat delivery.

pub mod gateway;
pub mod notifier;
pub mod repository;

pub use gateway::{
    DownloadGateway, EntryFilter, EntrySort, GatewayError, GatewayResult, SubmitRequest,
    TorrentSource,
};
pub use notifier::{Notifier, NotifierError, NotifierResult};
pub use repository::{TaskRepository, TaskRepositoryError, TaskRepositoryResult};

//! Steward: chat-driven download tracking for qBittorrent.
//!
//! Requesters send magnet links or `.torrent` files through a chat. Each
//! accepted submission becomes a persisted task that is bound to the download
//! client's entry, reconciled on a timer, announced once when it completes
//! and finally organized by copying its large files into target storage.
//!
//! # Architecture
//!
//! Steward follows hexagonal architecture principles:
//!
//! - **Domain**: task lifecycle rules with no infrastructure dependencies
//! - **Ports**: trait interfaces for the task store, download client and chat
//! - **Adapters**: in-memory, `PostgreSQL`, qBittorrent Web API and logging
//!   implementations of those ports
//!
//! # Modules
//!
//! - [`task`]: task domain, ports, adapters and services
//! - [`config`]: layered runtime configuration
//! - [`telemetry`]: `tracing` subscriber setup
//! - [`worker`]: fixed-period background jobs

pub mod config;
pub mod task;
pub mod telemetry;
pub mod worker;

//! Adapter implementations for the task ports.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod qbittorrent;

mod tracing_notifier;

pub use tracing_notifier::TracingNotifier;

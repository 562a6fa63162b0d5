//! In-memory adapters for tests and single-process deployments.

mod gateway;
mod notifier;
mod task;

pub use gateway::InMemoryDownloadGateway;
pub use notifier::{InMemoryNotifier, SentMessage};
pub use task::InMemoryTaskRepository;

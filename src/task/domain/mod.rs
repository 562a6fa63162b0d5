//! Domain model for download task lifecycle management.
//!
//! A task records one requested download from the moment a chat user submits
//! it until its large files have been promoted to target storage. The domain
//! owns the forward-only status rules; observation of the download client and
//! persistence stay outside this boundary.

mod entry;
mod error;
mod ids;
mod origin;
mod placement;
mod status;
mod task;

pub use entry::{EntryState, ExternalEntry};
pub use error::{ParseTaskStatusError, TaskDomainError};
pub use ids::{ConversationId, ExternalId, RequesterId, TaskId};
pub use origin::{MagnetLink, TaskOrigin};
pub use placement::FilePlacement;
pub use status::TaskStatus;
pub use task::{GENERIC_FAILURE_DETAIL, Observation, PersistedTaskData, Task, TransferStats};

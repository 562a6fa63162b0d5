//! Application services for the task lifecycle.

mod events;
mod file_copy;
mod intake;
mod lifecycle;
pub mod messages;
mod organizer;
mod reconciliation;
mod resolver;

pub use events::{TaskEvent, TaskEventHandler};
pub use file_copy::{LargeFilePolicy, copy_large_files, copy_single_file};
pub use intake::{ChatIntake, InboundContent, InboundMessage, IntakeOutcome, IntakeSettings};
pub use lifecycle::{TaskLifecycleError, TaskLifecycleResult, TaskLifecycleService};
pub use organizer::{
    CompletionCopy, FileOrganizer, OrganizerError, OrganizerReport, OrganizerResult,
};
pub use reconciliation::{ReconciliationReport, ReconciliationService};
pub use resolver::{HashResolver, ResolveError, select_entry};

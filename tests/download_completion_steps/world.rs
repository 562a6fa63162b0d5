//! Shared world state for download completion BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;
use steward::task::{
    adapters::memory::{InMemoryDownloadGateway, InMemoryNotifier, InMemoryTaskRepository},
    domain::{ConversationId, ExternalId, RequesterId, TaskId},
    services::{ReconciliationReport, ReconciliationService, TaskLifecycleService, messages},
};

/// Lifecycle service type used by the BDD world.
pub type TestLifecycle =
    TaskLifecycleService<InMemoryTaskRepository, InMemoryNotifier, DefaultClock>;

/// Requester used by every scenario.
pub const REQUESTER: RequesterId = RequesterId::new(7);

/// Conversation used by every scenario.
pub const CONVERSATION: ConversationId = ConversationId::new(70);

/// Scenario world for completion behaviour tests.
pub struct CompletionWorld {
    pub gateway: Arc<InMemoryDownloadGateway>,
    pub notifier: Arc<InMemoryNotifier>,
    pub lifecycle: TestLifecycle,
    pub reconciler: ReconciliationService<
        InMemoryDownloadGateway,
        InMemoryTaskRepository,
        InMemoryNotifier,
        DefaultClock,
    >,
    pub task_id: Option<TaskId>,
    pub external_id: Option<ExternalId>,
    pub last_report: Option<ReconciliationReport>,
}

impl CompletionWorld {
    /// Creates a world with empty adapters.
    #[must_use]
    pub fn new() -> Self {
        let gateway = Arc::new(InMemoryDownloadGateway::new());
        let notifier = Arc::new(InMemoryNotifier::new());
        let lifecycle = TaskLifecycleService::new(
            Arc::new(InMemoryTaskRepository::new()),
            Arc::clone(&notifier),
            Arc::new(DefaultClock),
        );
        let reconciler = ReconciliationService::new(Arc::clone(&gateway), lifecycle.clone());

        Self {
            gateway,
            notifier,
            lifecycle,
            reconciler,
            task_id: None,
            external_id: None,
            last_report: None,
        }
    }

    /// Returns the identifier bound in the `Given` steps.
    ///
    /// # Errors
    ///
    /// Returns an error when no request has been accepted yet.
    pub fn bound_id(&self) -> Result<&ExternalId, eyre::Report> {
        self.external_id
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing accepted request in scenario world"))
    }

    /// Counts completion notices delivered so far.
    ///
    /// # Errors
    ///
    /// Returns an error when the notifier outbox cannot be read.
    pub fn completion_notices(&self) -> Result<usize, eyre::Report> {
        Ok(self
            .notifier
            .sent()?
            .iter()
            .filter(|message| message.text.contains(messages::COMPLETION_MARKER))
            .count())
    }
}

impl Default for CompletionWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> CompletionWorld {
    CompletionWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

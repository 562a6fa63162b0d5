//! Inbound task events and their dispatcher.

use super::lifecycle::TaskLifecycleService;
use super::messages;
use super::organizer::{CompletionCopy, FileOrganizer};
use super::resolver::{HashResolver, ResolveError};
use crate::task::{
    domain::{ConversationId, RequesterId, Task, TaskOrigin},
    ports::{DownloadGateway, Notifier, TaskRepository},
};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Reply when a forwarded completion notice could not be acted on.
const COPY_FAILED_TEXT: &str = "The completed file could not be copied.";

/// Events that drive the task lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// A download was accepted by the download client.
    RequestSubmitted {
        /// What was submitted.
        origin: TaskOrigin,
        /// Requesting user.
        requester: RequesterId,
        /// Conversation for replies and notices.
        conversation: ConversationId,
    },
    /// A completion notice was forwarded back to the bot.
    CompletionObserved {
        /// Conversation for replies.
        conversation: ConversationId,
        /// Full notice text.
        text: String,
    },
    /// The requester asked for the task list.
    ListRequested {
        /// Conversation for the reply.
        conversation: ConversationId,
    },
}

/// Dispatches [`TaskEvent`]s to the lifecycle, resolver and organizer.
pub struct TaskEventHandler<G, R, N, C>
where
    G: DownloadGateway,
    R: TaskRepository,
    N: Notifier,
    C: Clock + Send + Sync,
{
    lifecycle: TaskLifecycleService<R, N, C>,
    resolver: HashResolver<G, R>,
    organizer: Arc<FileOrganizer<G, R, N, C>>,
    settle_delay: Duration,
}

impl<G, R, N, C> TaskEventHandler<G, R, N, C>
where
    G: DownloadGateway + 'static,
    R: TaskRepository + 'static,
    N: Notifier + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a dispatcher that waits `settle_delay` before resolving a new
    /// task.
    #[must_use]
    pub const fn new(
        lifecycle: TaskLifecycleService<R, N, C>,
        resolver: HashResolver<G, R>,
        organizer: Arc<FileOrganizer<G, R, N, C>>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            lifecycle,
            resolver,
            organizer,
            settle_delay,
        }
    }

    /// Returns the lifecycle service.
    #[must_use]
    pub const fn lifecycle(&self) -> &TaskLifecycleService<R, N, C> {
        &self.lifecycle
    }

    /// Handles one event.
    ///
    /// For [`TaskEvent::RequestSubmitted`] the returned handle tracks the
    /// single resolution attempt scheduled for the new task. Failures are
    /// logged and answered with plain text.
    pub async fn handle(&self, event: TaskEvent) -> Option<JoinHandle<()>> {
        match event {
            TaskEvent::RequestSubmitted {
                origin,
                requester,
                conversation,
            } => self.request_submitted(origin, requester, conversation).await,
            TaskEvent::CompletionObserved { conversation, text } => {
                self.completion_observed(conversation, &text).await;
                None
            }
            TaskEvent::ListRequested { conversation } => {
                self.list_requested(conversation).await;
                None
            }
        }
    }

    async fn request_submitted(
        &self,
        origin: TaskOrigin,
        requester: RequesterId,
        conversation: ConversationId,
    ) -> Option<JoinHandle<()>> {
        match self
            .lifecycle
            .create_task(origin, requester, conversation)
            .await
        {
            Ok(task) => Some(self.schedule_resolution(task)),
            Err(err) => {
                tracing::error!(conversation = conversation.value(), error = %err, "task not recorded");
                None
            }
        }
    }

    fn schedule_resolution(&self, task: Task) -> JoinHandle<()> {
        let lifecycle = self.lifecycle.clone();
        let resolver = self.resolver.clone();
        let settle_delay = self.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(settle_delay).await;
            resolve_task(&lifecycle, &resolver, &task).await;
        })
    }

    async fn completion_observed(&self, conversation: ConversationId, text: &str) {
        match self
            .organizer
            .handle_completion_notice(conversation, text)
            .await
        {
            Ok(CompletionCopy::Copied(_) | CompletionCopy::NotANotice) => {}
            Ok(CompletionCopy::AlreadyOrganized(file_name)) => {
                tracing::debug!(file_name, "completed file already organized");
            }
            Ok(CompletionCopy::UnknownFile(file_name)) => {
                tracing::warn!(file_name, "completion notice names an unknown file");
            }
            Err(err) => {
                tracing::warn!(error = %err, "completion notice not handled");
                self.lifecycle.send(conversation, COPY_FAILED_TEXT).await;
            }
        }
    }

    async fn list_requested(&self, conversation: ConversationId) {
        let text = match self.lifecycle.render_task_list().await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "task list not rendered");
                messages::LIST_FAILED_TEXT.to_owned()
            }
        };
        self.lifecycle.send(conversation, &text).await;
    }
}

async fn resolve_task<G, R, N, C>(
    lifecycle: &TaskLifecycleService<R, N, C>,
    resolver: &HashResolver<G, R>,
    task: &Task,
) where
    G: DownloadGateway,
    R: TaskRepository,
    N: Notifier,
    C: Clock + Send + Sync,
{
    let external_id = match resolver.resolve(task.id(), task.origin()).await {
        Ok(external_id) => external_id,
        Err(ResolveError::NotFound) => {
            tracing::warn!(task_id = %task.id(), "no download client entry found; task stays pending");
            return;
        }
        Err(err) => {
            tracing::warn!(task_id = %task.id(), error = %err, "task resolution failed");
            return;
        }
    };

    if let Err(err) = lifecycle
        .apply_resolved_identifier(task.id(), external_id)
        .await
    {
        tracing::warn!(task_id = %task.id(), error = %err, "resolved identifier rejected");
    }
}

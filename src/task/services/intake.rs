//! Classification of inbound chat messages into task events.

use super::events::{TaskEvent, TaskEventHandler};
use super::messages;
use crate::task::{
    domain::{ConversationId, MagnetLink, RequesterId, TaskOrigin},
    ports::{DownloadGateway, EntryFilter, Notifier, SubmitRequest, TaskRepository, TorrentSource},
};
use mockable::Clock;
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tokio::task::JoinHandle;

#[expect(clippy::expect_used, reason = "pattern is a compile-time constant")]
static MAGNET_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^magnet:\?xt=urn:btih:[a-zA-Z0-9]{40}.*$").expect("magnet pattern compiles")
});

const TORRENT_EXTENSION: &str = ".torrent";

/// Body of an inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundContent {
    /// Plain text, including commands.
    Text(String),
    /// A file attachment.
    Document {
        /// Attachment file name.
        file_name: String,
        /// Attachment bytes.
        contents: Vec<u8>,
    },
}

/// One inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender.
    pub requester: RequesterId,
    /// Conversation the message arrived in.
    pub conversation: ConversationId,
    /// Message body.
    pub content: InboundContent,
}

impl InboundMessage {
    /// Creates a text message.
    #[must_use]
    pub fn text(
        requester: RequesterId,
        conversation: ConversationId,
        text: impl Into<String>,
    ) -> Self {
        Self {
            requester,
            conversation,
            content: InboundContent::Text(text.into()),
        }
    }
}

/// Settings applied to every submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntakeSettings {
    /// Requesters allowed to use the bot.
    pub allowed_requesters: HashSet<RequesterId>,
    /// Download client category.
    pub category: Option<String>,
    /// Download client tags.
    pub tags: Vec<String>,
    /// Download client save path.
    pub save_path: Option<String>,
}

/// What the intake did with a message.
#[derive(Debug)]
pub enum IntakeOutcome {
    /// The requester is not on the allow-list.
    Unauthorised,
    /// Help text was sent.
    Help,
    /// Live progress was sent.
    Status,
    /// The task list was sent.
    Listed,
    /// A download was submitted; the handle tracks its resolution attempt.
    Submitted(Option<JoinHandle<()>>),
    /// The download client rejected the submission.
    SubmitFailed,
    /// A completion notice was handled.
    CompletionForwarded,
    /// The message was not understood.
    Unrecognised,
}

/// Front door for chat messages.
pub struct ChatIntake<G, R, N, C>
where
    G: DownloadGateway,
    R: TaskRepository,
    N: Notifier,
    C: Clock + Send + Sync,
{
    gateway: Arc<G>,
    events: TaskEventHandler<G, R, N, C>,
    settings: IntakeSettings,
}

impl<G, R, N, C> ChatIntake<G, R, N, C>
where
    G: DownloadGateway + 'static,
    R: TaskRepository + 'static,
    N: Notifier + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates the intake.
    #[must_use]
    pub const fn new(
        gateway: Arc<G>,
        events: TaskEventHandler<G, R, N, C>,
        settings: IntakeSettings,
    ) -> Self {
        Self {
            gateway,
            events,
            settings,
        }
    }

    /// Handles one inbound message.
    pub async fn handle(&self, message: InboundMessage) -> IntakeOutcome {
        let InboundMessage {
            requester,
            conversation,
            content,
        } = message;

        if !self.settings.allowed_requesters.contains(&requester) {
            tracing::warn!(requester = requester.value(), "message from requester outside allow-list");
            self.reply(conversation, messages::UNAUTHORISED_TEXT).await;
            return IntakeOutcome::Unauthorised;
        }

        match content {
            InboundContent::Text(text) => self.handle_text(requester, conversation, text.trim()).await,
            InboundContent::Document {
                file_name,
                contents,
            } => {
                self.handle_document(requester, conversation, file_name, contents)
                    .await
            }
        }
    }

    async fn handle_text(
        &self,
        requester: RequesterId,
        conversation: ConversationId,
        text: &str,
    ) -> IntakeOutcome {
        if let Some(command) = command_name(text) {
            return self.handle_command(conversation, command).await;
        }

        if MAGNET_MESSAGE.is_match(text) {
            return match MagnetLink::new(text) {
                Ok(link) => {
                    let source = TorrentSource::Magnet(link.as_str().to_owned());
                    let origin = TaskOrigin::Magnet { link };
                    self.submit(requester, conversation, source, origin).await
                }
                Err(err) => {
                    tracing::warn!(error = %err, "magnet link rejected");
                    self.reply(conversation, messages::USAGE_HINT_TEXT).await;
                    IntakeOutcome::Unrecognised
                }
            };
        }

        if text.contains(messages::COMPLETION_MARKER) {
            self.events
                .handle(TaskEvent::CompletionObserved {
                    conversation,
                    text: text.to_owned(),
                })
                .await;
            return IntakeOutcome::CompletionForwarded;
        }

        self.reply(conversation, messages::USAGE_HINT_TEXT).await;
        IntakeOutcome::Unrecognised
    }

    async fn handle_command(&self, conversation: ConversationId, command: &str) -> IntakeOutcome {
        match command {
            "/start" | "/help" => {
                self.reply(conversation, messages::HELP_TEXT).await;
                IntakeOutcome::Help
            }
            "/status" => {
                let text = match self.gateway.list_entries(&EntryFilter::all()).await {
                    Ok(entries) => messages::render_status(&entries).unwrap_or_else(|err| {
                        tracing::warn!(error = %err, "status not rendered");
                        messages::STATUS_FAILED_TEXT.to_owned()
                    }),
                    Err(err) => {
                        tracing::warn!(error = %err, "live entries unavailable");
                        messages::STATUS_FAILED_TEXT.to_owned()
                    }
                };
                self.reply(conversation, &text).await;
                IntakeOutcome::Status
            }
            "/list" => {
                self.events
                    .handle(TaskEvent::ListRequested { conversation })
                    .await;
                IntakeOutcome::Listed
            }
            _ => {
                self.reply(conversation, messages::USAGE_HINT_TEXT).await;
                IntakeOutcome::Unrecognised
            }
        }
    }

    async fn handle_document(
        &self,
        requester: RequesterId,
        conversation: ConversationId,
        file_name: String,
        contents: Vec<u8>,
    ) -> IntakeOutcome {
        let is_torrent = file_name
            .len()
            .checked_sub(TORRENT_EXTENSION.len())
            .and_then(|start| file_name.get(start..))
            .is_some_and(|extension| extension.eq_ignore_ascii_case(TORRENT_EXTENSION));
        if !is_torrent {
            self.reply(conversation, messages::USAGE_HINT_TEXT).await;
            return IntakeOutcome::Unrecognised;
        }

        let origin = TaskOrigin::TorrentFile {
            file_name: Some(file_name.clone()),
        };
        let source = TorrentSource::File {
            file_name,
            contents,
        };
        self.submit(requester, conversation, source, origin).await
    }

    async fn submit(
        &self,
        requester: RequesterId,
        conversation: ConversationId,
        source: TorrentSource,
        origin: TaskOrigin,
    ) -> IntakeOutcome {
        let mut request = SubmitRequest::new(source).with_tags(self.settings.tags.iter().cloned());
        if let Some(category) = &self.settings.category {
            request = request.with_category(category.as_str());
        }
        if let Some(save_path) = &self.settings.save_path {
            request = request.with_save_path(save_path.as_str());
        }

        if let Err(err) = self.gateway.submit(&request).await {
            tracing::warn!(conversation = conversation.value(), error = %err, "submission rejected");
            self.reply(conversation, messages::SUBMIT_FAILED_TEXT).await;
            return IntakeOutcome::SubmitFailed;
        }

        self.reply(conversation, messages::SUBMITTED_TEXT).await;
        let resolution = self
            .events
            .handle(TaskEvent::RequestSubmitted {
                origin,
                requester,
                conversation,
            })
            .await;
        IntakeOutcome::Submitted(resolution)
    }

    async fn reply(&self, conversation: ConversationId, text: &str) {
        self.events.lifecycle().send(conversation, text).await;
    }
}

/// Returns the command word of `text`, without any `@bot` suffix.
fn command_name(text: &str) -> Option<&str> {
    let word = text.split_whitespace().next()?;
    if !word.starts_with('/') {
        return None;
    }
    word.split('@').next()
}

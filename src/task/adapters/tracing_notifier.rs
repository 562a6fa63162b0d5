//! Notifier that writes outbound chat messages to the log.

use crate::task::{
    domain::ConversationId,
    ports::{Notifier, NotifierResult},
};
use async_trait::async_trait;

/// Notifier used by the console transport.
///
/// Each message is emitted as an `info` event carrying the conversation
/// identifier, so replies appear alongside the rest of the service log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, conversation: ConversationId, text: &str) -> NotifierResult<()> {
        tracing::info!(conversation = conversation.value(), message = text, "chat reply");
        Ok(())
    }
}

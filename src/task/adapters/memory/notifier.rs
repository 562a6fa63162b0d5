//! In-memory notifier that records every delivered message.

use crate::task::{
    domain::ConversationId,
    ports::{Notifier, NotifierError, NotifierResult},
};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// One delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Conversation the message was sent to.
    pub conversation: ConversationId,
    /// Message body.
    pub text: String,
}

/// Notifier that keeps delivered messages in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<SentMessage>>>,
}

impl InMemoryNotifier {
    /// Creates a notifier with an empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every message delivered so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns delivery errors when lock acquisition fails.
    pub fn sent(&self) -> NotifierResult<Vec<SentMessage>> {
        let sent = self
            .sent
            .read()
            .map_err(|err| NotifierError::delivery(std::io::Error::other(err.to_string())))?;
        Ok(sent.clone())
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(&self, conversation: ConversationId, text: &str) -> NotifierResult<()> {
        let mut sent = self
            .sent
            .write()
            .map_err(|err| NotifierError::delivery(std::io::Error::other(err.to_string())))?;
        sent.push(SentMessage {
            conversation,
            text: text.to_owned(),
        });
        Ok(())
    }
}

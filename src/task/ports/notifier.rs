//! Notifier port: delivers plain text to a chat conversation.

use crate::task::domain::ConversationId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for notifier operations.
pub type NotifierResult<T> = Result<T, NotifierError>;

/// Outbound chat delivery contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `text` to `conversation`.
    async fn send(&self, conversation: ConversationId, text: &str) -> NotifierResult<()>;
}

/// Errors returned by notifier adapters.
#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    /// The chat transport rejected or failed to deliver the message.
    #[error("notification delivery failed: {0}")]
    Delivery(Arc<dyn std::error::Error + Send + Sync>),
}

impl NotifierError {
    /// Wraps a delivery error.
    pub fn delivery(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Delivery(Arc::new(err))
    }
}

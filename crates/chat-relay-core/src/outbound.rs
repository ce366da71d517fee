//! # Outbound Messaging
//!
//! Interface for replying to a chat through an external messaging API.

use crate::ChatId;
use async_trait::async_trait;

#[cfg(test)]
#[path = "outbound_tests.rs"]
mod tests;

/// Interface for sending a text message to a chat
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send `text` to `chat_id`
    ///
    /// # Errors
    ///
    /// Returns error if the sender has no credentials, the API cannot be
    /// reached, or the API rejects the request.
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), SendError>;
}

/// Errors from outbound message delivery
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// No API token configured
    #[error("Missing API token")]
    MissingToken,

    /// Request could not be delivered
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// API answered with a non-success status
    #[error("Request rejected with status {status}")]
    Rejected { status: u16 },
}

impl SendError {
    /// Check if error is transient and worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Self::MissingToken => false,
            Self::Transport { .. } => true,
            Self::Rejected { status } => *status == 429 || *status >= 500,
        }
    }
}

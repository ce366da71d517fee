//! # Message Store
//!
//! Persistence interface for received chat messages. Implementations live in
//! [`crate::adapters`].

use crate::{ChatMessage, StoredMessage};
use async_trait::async_trait;

#[cfg(test)]
#[path = "message_store_tests.rs"]
mod tests;

/// Interface for persisting received chat messages
///
/// # Examples
///
/// ```no_run
/// use chat_relay_core::{ChatMessage, message_store::*};
/// # async fn example(store: impl MessageStore) -> Result<(), StoreError> {
/// let message = ChatMessage::new("alice", "hello").unwrap();
///
/// let stored = store.save_message(&message).await?;
/// println!("Saved message {}", stored.id);
///
/// for message in store.list_messages().await? {
///     println!("{}: {}", message.username, message.text);
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message
    ///
    /// Assigns the next identifier, which is strictly greater than every
    /// identifier handed out before by this store.
    ///
    /// # Errors
    ///
    /// Returns error if the backing storage cannot be written.
    async fn save_message(&self, message: &ChatMessage) -> Result<StoredMessage, StoreError>;

    /// All stored messages in identifier order
    async fn list_messages(&self) -> Result<Vec<StoredMessage>, StoreError>;

    /// Check that the store can currently serve requests
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Errors from message store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backing storage cannot be reached
    #[error("Message store unavailable: {message}")]
    Unavailable { message: String },

    /// Record could not be encoded or decoded
    #[error("Serialization failed: {message}")]
    SerializationFailed { message: String },

    /// Persisted data is unreadable
    #[error("Corrupted record in {path} at line {line}: {message}")]
    Corrupted {
        path: String,
        line: usize,
        message: String,
    },

    /// Internal storage error
    #[error("Internal storage error: {message}")]
    InternalError { message: String },
}

impl StoreError {
    /// Check if error is transient and worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::InternalError { .. })
    }
}

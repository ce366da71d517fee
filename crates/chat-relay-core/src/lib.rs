//! # Chat Relay Core
//!
//! Core logic for the chat relay: a webhook-driven service that receives chat
//! messages, persists them and replies through an external messaging API.
//!
//! ## Architecture
//!
//! - [`event_log`] is the asynchronous, backpressure-aware event log that every
//!   other component writes its diagnostics to through the narrow
//!   [`EventRecorder`](event_log::EventRecorder) capability.
//! - [`message_store`] abstracts persistence of received messages; concrete
//!   implementations live in [`adapters`].
//! - [`outbound`] abstracts replying to a chat.
//!
//! ## Usage
//!
//! ```rust
//! use chat_relay_core::{reply_text, ChatMessage};
//!
//! let message = ChatMessage::new("alice", "hello").unwrap();
//! assert_eq!(reply_text(&message), "Hi, alice! You wrote: hello");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod adapters;
pub mod event_log;
pub mod message_store;
pub mod outbound;

pub use event_log::{
    EventLog, EventLogConfig, EventLogError, EventLogStats, EventRecorder, LogSink,
    NullEventRecorder, ServiceState,
};
pub use message_store::{MessageStore, StoreError};
pub use outbound::{MessageSender, SendError};

/// Maximum accepted username length in characters
pub const MAX_USERNAME_LENGTH: usize = 64;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Identifier of the chat a message arrived from and a reply is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(i64);

impl ChatId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned to a message when it is persisted
///
/// Identifiers are assigned by the store in strictly increasing order,
/// starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The identifier following this one
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the user who sent a message
///
/// Must be non-empty after trimming, at most [`MAX_USERNAME_LENGTH`]
/// characters, and free of control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "username".to_string(),
            });
        }

        if value.chars().count() > MAX_USERNAME_LENGTH {
            return Err(ValidationError::TooLong {
                field: "username".to_string(),
                max_length: MAX_USERNAME_LENGTH,
            });
        }

        if value.chars().any(char::is_control) {
            return Err(ValidationError::InvalidCharacters {
                field: "username".to_string(),
                invalid_chars: "control characters".to_string(),
            });
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Username {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ============================================================================
// Messages
// ============================================================================

/// A chat message received from a user, before it is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: Username,
    pub text: String,
}

impl ChatMessage {
    pub fn new(
        username: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            username: Username::new(username)?,
            text: text.into(),
        })
    }
}

/// A chat message as persisted by a [`MessageStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub username: Username,
    pub text: String,
    pub received_at: Timestamp,
}

impl StoredMessage {
    pub fn from_message(id: MessageId, message: &ChatMessage) -> Self {
        Self {
            id,
            username: message.username.clone(),
            text: message.text.clone(),
            received_at: Timestamp::now(),
        }
    }
}

/// Build the reply sent back to a user for a received message
pub fn reply_text(message: &ChatMessage) -> String {
    format!("Hi, {}! You wrote: {}", message.username, message.text)
}

/// Build the event-log line describing a received message
pub fn received_event(message: &ChatMessage) -> String {
    format!(
        "Received message from: {}, text: {}",
        message.username, message.text
    )
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

//! # Telegram Bot API
//!
//! Inbound webhook update types and the outbound [`TelegramSender`].

use crate::config::TelegramConfig;
use crate::errors::ConfigError;
use async_trait::async_trait;
use chat_relay_core::{ChatId, EventRecorder, MessageSender, SendError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[cfg(test)]
#[path = "telegram_tests.rs"]
mod tests;

// ============================================================================
// Webhook Update Types
// ============================================================================

/// Incoming webhook update
///
/// Only the fields the relay uses are modelled; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<TelegramUser>,

    pub chat: TelegramChat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl TelegramMessage {
    /// Name to greet the sender by: the username, else the first name
    pub fn sender_name(&self) -> String {
        self.from
            .as_ref()
            .map(|user| {
                user.username
                    .clone()
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| user.first_name.clone())
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,

    #[serde(default)]
    pub is_bot: bool,

    #[serde(default)]
    pub first_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

/// Body of a `sendMessage` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub chat_id: i64,
    pub text: String,
}

// ============================================================================
// Outbound Sender
// ============================================================================

/// [`MessageSender`] backed by the Telegram Bot API
///
/// Every outcome is recorded through the event recorder it was built with.
pub struct TelegramSender {
    client: reqwest::Client,
    api_base_url: String,
    token: Option<String>,
    recorder: Arc<dyn EventRecorder>,
}

impl TelegramSender {
    pub fn new(
        config: &TelegramConfig,
        recorder: Arc<dyn EventRecorder>,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config
                .bot_token
                .clone()
                .filter(|token| !token.trim().is_empty()),
            recorder,
        })
    }

    fn send_url(&self, token: &str) -> String {
        format!("{}/bot{}/sendMessage", self.api_base_url, token)
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    #[instrument(skip(self, text), fields(chat_id = %chat_id))]
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), SendError> {
        let Some(token) = self.token.as_deref() else {
            self.recorder.record_event("Error: Empty token!".to_string());
            return Err(SendError::MissingToken);
        };

        let request = SendMessageRequest {
            chat_id: chat_id.as_i64(),
            text: text.to_string(),
        };

        let response = match self
            .client
            .post(self.send_url(token))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // reqwest includes the URL, and with it the token, in its errors
                let e = e.without_url();
                self.recorder
                    .record_event(format!("Error while sending response message: {}", e));
                return Err(SendError::Transport {
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Telegram API rejected message");
            self.recorder
                .record_event(format!("Error while sending response message: {}", status));
            return Err(SendError::Rejected {
                status: status.as_u16(),
            });
        }

        debug!(status = %status, "Message delivered");
        self.recorder.record_event(format!("Message sent! {}", status));
        Ok(())
    }
}

impl fmt::Debug for TelegramSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSender")
            .field("api_base_url", &self.api_base_url)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

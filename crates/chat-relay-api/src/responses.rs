//! Request and response types for the API.

use chat_relay_core::{EventLogStats, ServiceState, StoredMessage, Timestamp};
use serde::{Deserialize, Serialize};

/// Body of `POST /message`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub username: String,
    pub text: String,
}

/// Reply to `GET /ping`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub message: String,
}

/// Reply to `POST /message`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAcceptedResponse {
    pub status: String,
}

/// Reply to `GET /messages`
#[derive(Debug, Clone, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<StoredMessage>,
    pub total: usize,
}

/// Reply to `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub event_log: Option<EventLogHealth>,
    pub store: String,
    pub version: String,
}

/// Event log section of the health report
#[derive(Debug, Clone, Serialize)]
pub struct EventLogHealth {
    pub state: ServiceState,
    #[serde(flatten)]
    pub stats: EventLogStats,
}

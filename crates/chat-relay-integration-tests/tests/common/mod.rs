//! Common test utilities for chat-relay integration tests
//!
//! This module provides:
//! - Test doubles for the recorder, store and sender capabilities
//! - Helpers for building application state and driving the router
//! - Shared Telegram update payloads

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use chat_relay_api::{AppState, ServiceConfig, ServiceMetrics};
use chat_relay_core::adapters::InMemoryMessageStore;
use chat_relay_core::{
    ChatId, ChatMessage, EventRecorder, MessageSender, MessageStore, SendError, StoreError,
    StoredMessage,
};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

// ============================================================================
// Recording Event Recorder
// ============================================================================

/// Recorder keeping every event in memory
#[derive(Default)]
pub struct RecordingRecorder {
    events: Mutex<Vec<String>>,
}

impl RecordingRecorder {
    #[allow(dead_code)]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn contains(&self, event: &str) -> bool {
        self.events.lock().unwrap().iter().any(|e| e == event)
    }
}

impl EventRecorder for RecordingRecorder {
    fn record_event(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

// ============================================================================
// Failing Message Store
// ============================================================================

/// Store whose every operation fails with the configured error
pub struct FailingStore {
    error: StoreError,
}

impl FailingStore {
    #[allow(dead_code)]
    pub fn unavailable() -> Self {
        Self {
            error: StoreError::Unavailable {
                message: "connection refused".to_string(),
            },
        }
    }
}

#[async_trait]
impl MessageStore for FailingStore {
    async fn save_message(&self, _message: &ChatMessage) -> Result<StoredMessage, StoreError> {
        Err(self.error.clone())
    }

    async fn list_messages(&self) -> Result<Vec<StoredMessage>, StoreError> {
        Err(self.error.clone())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(self.error.clone())
    }
}

// ============================================================================
// Mock Message Sender
// ============================================================================

/// Sender remembering every reply instead of delivering it
#[derive(Default)]
pub struct MockSender {
    calls: Mutex<Vec<(ChatId, String)>>,
}

impl MockSender {
    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<(ChatId, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for MockSender {
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), SendError> {
        self.calls.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

// ============================================================================
// Application State Builders
// ============================================================================

/// Handles to the doubles behind a test [`AppState`]
#[allow(dead_code)]
pub struct TestApp {
    pub state: AppState,
    pub recorder: Arc<RecordingRecorder>,
    pub sender: Arc<MockSender>,
}

/// Create application state backed by an in-memory store
#[allow(dead_code)]
pub fn create_test_app_state() -> TestApp {
    create_test_app_state_with_store(Arc::new(InMemoryMessageStore::new()))
}

/// Create application state backed by `store`
#[allow(dead_code)]
pub fn create_test_app_state_with_store(store: Arc<dyn MessageStore>) -> TestApp {
    let recorder = Arc::new(RecordingRecorder::default());
    let sender = Arc::new(MockSender::default());
    let state = AppState::new(
        ServiceConfig::default(),
        recorder.clone(),
        store,
        sender.clone(),
        ServiceMetrics::new().unwrap(),
    );

    TestApp {
        state,
        recorder,
        sender,
    }
}

// ============================================================================
// Request Helpers
// ============================================================================

#[allow(dead_code)]
pub async fn post_json(app: &Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    app.clone().oneshot(request).await.unwrap()
}

#[allow(dead_code)]
pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();

    app.clone().oneshot(request).await.unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "Unexpected status for response: {:?}",
        response
    );
}

// ============================================================================
// Telegram Payloads
// ============================================================================

/// Build a webhook update carrying a text message
#[allow(dead_code)]
pub fn text_update(update_id: i64, chat_id: i64, username: &str, text: &str) -> String {
    serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id * 10,
            "from": {
                "id": 42,
                "is_bot": false,
                "first_name": "Test",
                "username": username
            },
            "chat": { "id": chat_id, "type": "private" },
            "date": 1700000000,
            "text": text
        }
    })
    .to_string()
}

/// Webhook update with a sticker instead of text
#[allow(dead_code)]
pub const STICKER_UPDATE: &str = r#"{
    "update_id": 77,
    "message": {
        "message_id": 5,
        "from": {"id": 42, "is_bot": false, "first_name": "Test"},
        "chat": {"id": 1001, "type": "private"},
        "date": 1700000000,
        "sticker": {"file_id": "abc"}
    }
}"#;

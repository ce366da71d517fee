//! # In-Memory Message Store
//!
//! Thread-safe in-memory implementation for testing and development.

use crate::message_store::{MessageStore, StoreError};
use crate::{ChatMessage, MessageId, StoredMessage};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[cfg(test)]
#[path = "memory_store_tests.rs"]
mod tests;

/// Thread-safe in-memory message store
///
/// Clones share the same storage. The store can be switched offline to
/// exercise failure handling in callers.
#[derive(Debug, Clone)]
pub struct InMemoryMessageStore {
    messages: Arc<RwLock<Vec<StoredMessage>>>,
    available: Arc<AtomicBool>,
}

impl InMemoryMessageStore {
    /// Create new empty store
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Make every subsequent operation fail (or succeed again)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored messages
    pub fn len(&self) -> usize {
        self.messages.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                message: "in-memory store is offline".to_string(),
            })
        }
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save_message(&self, message: &ChatMessage) -> Result<StoredMessage, StoreError> {
        self.check_available()?;

        let mut messages = self
            .messages
            .write()
            .map_err(|e| StoreError::InternalError {
                message: format!("Lock poisoned: {}", e),
            })?;

        let id = messages
            .last()
            .map(|last| last.id.next())
            .unwrap_or_else(|| MessageId::new(1));
        let stored = StoredMessage::from_message(id, message);
        messages.push(stored.clone());

        Ok(stored)
    }

    async fn list_messages(&self) -> Result<Vec<StoredMessage>, StoreError> {
        self.check_available()?;

        let messages = self
            .messages
            .read()
            .map_err(|e| StoreError::InternalError {
                message: format!("Lock poisoned: {}", e),
            })?;
        Ok(messages.clone())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

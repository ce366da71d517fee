//! # Filesystem Message Store Adapter
//!
//! Local filesystem implementation of [`MessageStore`] that keeps every
//! message as one JSON object per line in `messages.jsonl`.

use crate::event_log::EventRecorder;
use crate::message_store::{MessageStore, StoreError};
use crate::{ChatMessage, MessageId, StoredMessage};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

#[cfg(test)]
#[path = "filesystem_store_tests.rs"]
mod tests;

/// Name of the record file inside the base directory
pub const MESSAGES_FILE_NAME: &str = "messages.jsonl";

/// Filesystem-based message store
///
/// # Examples
///
/// ```no_run
/// use chat_relay_core::adapters::FilesystemMessageStore;
/// use chat_relay_core::NullEventRecorder;
/// use std::path::PathBuf;
/// use std::sync::Arc;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store =
///     FilesystemMessageStore::new(PathBuf::from("./data/messages"), Arc::new(NullEventRecorder))
///         .await?;
/// # Ok(())
/// # }
/// ```
pub struct FilesystemMessageStore {
    base_path: PathBuf,
    file_path: PathBuf,
    next_id: Mutex<MessageId>,
    recorder: Arc<dyn EventRecorder>,
}

impl FilesystemMessageStore {
    /// Open the store under `base_path`
    ///
    /// Creates the directory when absent and continues numbering after the
    /// highest identifier already on disk.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or an existing record
    /// file cannot be read.
    pub async fn new(
        base_path: PathBuf,
        recorder: Arc<dyn EventRecorder>,
    ) -> Result<Self, StoreError> {
        fs::create_dir_all(&base_path)
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to create base directory: {}", e),
            })?;

        let file_path = base_path.join(MESSAGES_FILE_NAME);
        let existing = read_records(&file_path).await.inspect_err(|e| {
            recorder.record_event(format!("Error while opening message store: {}", e));
        })?;

        if let Some(complete_len) = existing.torn_tail {
            discard_torn_tail(&file_path, complete_len)
                .await
                .inspect_err(|e| {
                    recorder.record_event(format!("Error while opening message store: {}", e));
                })?;
            recorder.record_event(format!(
                "Discarded incomplete record at the end of {}",
                file_path.display()
            ));
        }

        let next_id = existing
            .messages
            .iter()
            .map(|m| m.id)
            .max()
            .map(|id| id.next())
            .unwrap_or_else(|| MessageId::new(1));

        recorder.record_event(format!("Message store opened at {}", base_path.display()));

        Ok(Self {
            base_path,
            file_path,
            next_id: Mutex::new(next_id),
            recorder,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    async fn append(&self, record: &StoredMessage) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record).map_err(|e| StoreError::SerializationFailed {
            message: format!("Failed to serialize message: {}", e),
        })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to open {}: {}", self.file_path.display(), e),
            })?;

        let original_len = file
            .metadata()
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to inspect {}: {}", self.file_path.display(), e),
            })?
            .len();

        let written = match file.write_all(line.as_bytes()).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            // Cut off whatever part of the record made it to disk
            if let Err(rollback) = file.set_len(original_len).await {
                warn!(
                    path = %self.file_path.display(),
                    error = %rollback,
                    "Failed to remove partially written record"
                );
            }
            return Err(StoreError::InternalError {
                message: format!("Failed to write message: {}", e),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl MessageStore for FilesystemMessageStore {
    async fn save_message(&self, message: &ChatMessage) -> Result<StoredMessage, StoreError> {
        // Held across the write so ids land in the file in order
        let mut next_id = self.next_id.lock().await;

        let stored = StoredMessage::from_message(*next_id, message);
        if let Err(e) = self.append(&stored).await {
            self.recorder
                .record_event(format!("Error while writing message to store: {}", e));
            return Err(e);
        }

        *next_id = next_id.next();
        Ok(stored)
    }

    async fn list_messages(&self) -> Result<Vec<StoredMessage>, StoreError> {
        let _appends = self.next_id.lock().await;

        let mut messages = read_records(&self.file_path).await?.messages;
        messages.sort_by_key(|m| m.id);
        Ok(messages)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let metadata = fs::metadata(&self.base_path)
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to access {}: {}", self.base_path.display(), e),
            })?;

        if metadata.is_dir() {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                message: format!("{} is not a directory", self.base_path.display()),
            })
        }
    }
}

impl std::fmt::Debug for FilesystemMessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesystemMessageStore")
            .field("base_path", &self.base_path)
            .finish()
    }
}

/// Records read from the record file
struct RecordFile {
    messages: Vec<StoredMessage>,

    /// Length of the complete records when the file ends in a record whose
    /// newline never made it to disk
    torn_tail: Option<u64>,
}

/// Read every record from `path`; a missing file holds no records
///
/// A final line without its newline is an interrupted append and is not
/// counted as a record.
async fn read_records(path: &Path) -> Result<RecordFile, StoreError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(RecordFile {
                messages: Vec::new(),
                torn_tail: None,
            })
        }
        Err(e) => {
            return Err(StoreError::Unavailable {
                message: format!("Failed to read {}: {}", path.display(), e),
            })
        }
    };

    let complete_len = content.rfind('\n').map_or(0, |index| index + 1);
    let (complete, tail) = content.split_at(complete_len);

    let messages = complete
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| StoreError::Corrupted {
                path: path.display().to_string(),
                line: index + 1,
                message: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RecordFile {
        messages,
        torn_tail: (!tail.trim().is_empty()).then_some(complete_len as u64),
    })
}

/// Truncate `path` to its first `complete_len` bytes
async fn discard_torn_tail(path: &Path, complete_len: u64) -> Result<(), StoreError> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(|e| StoreError::Unavailable {
            message: format!("Failed to open {}: {}", path.display(), e),
        })?;

    file.set_len(complete_len)
        .await
        .map_err(|e| StoreError::Unavailable {
            message: format!("Failed to truncate {}: {}", path.display(), e),
        })
}

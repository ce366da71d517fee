//! # Event Log
//!
//! Process-wide asynchronous event log. Any number of concurrent producers
//! hand text events to [`EventLog::record_event`]; the events are buffered in
//! a bounded queue and drained by a fixed pool of worker threads into a
//! single append-only destination.
//!
//! ## Guarantees
//!
//! - `record_event` never blocks, never panics and never returns an error.
//!   When the log is not running, or the queue is full, the event is dropped
//!   and a warning is emitted through `tracing` instead of the log itself.
//! - `close` stops accepting events, waits until every worker has drained the
//!   queue and exited, and only then closes the destination. Every event
//!   accepted before `close` was called is written.
//! - Events are written verbatim, one per line, with no added prefix.
//! - Queue order is FIFO, but with more than one worker the order of lines in
//!   the destination may differ from the order events were recorded in.
//!   Configure a single worker when strict ordering matters.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chat_relay_core::event_log::{EventLog, EventLogConfig, EventRecorder};
//!
//! let log = EventLog::new(EventLogConfig::default());
//! log.start("server.log").expect("log destination should be writable");
//!
//! log.record_event("Starting server".to_string());
//!
//! log.close();
//! ```
//!
//! Components other than the process entry point should only see the log
//! through the [`EventRecorder`] capability.

mod queue;
mod sink;
mod worker;

pub use queue::{BoundedQueue, EnqueueError};
pub use sink::{ensure_log_directory, open_log_file, LogSink, ProvisionError};
pub use worker::{CompletionBarrier, CompletionGuard};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

// ============================================================================
// Recorder Capability
// ============================================================================

/// Capability to record an event
///
/// This is the only part of the event log that producers (request handlers,
/// storage, outbound senders) depend on. Implementations must not block and
/// must not fail.
pub trait EventRecorder: Send + Sync {
    fn record_event(&self, event: String);
}

/// Recorder that discards every event
///
/// Used where the event log is unavailable, so callers can keep recording
/// unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventRecorder;

impl EventRecorder for NullEventRecorder {
    fn record_event(&self, _event: String) {}
}

// ============================================================================
// Configuration
// ============================================================================

/// Event log configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    /// Directory holding the log file; created on start when absent
    pub directory: PathBuf,

    /// Name of the log file inside `directory`
    pub file_name: String,

    /// Maximum number of buffered events
    pub buffer_size: usize,

    /// Number of worker threads (default: available parallelism)
    pub workers: Option<usize>,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_name: "server.log".to_string(),
            buffer_size: 100,
            workers: None,
        }
    }
}

impl EventLogConfig {
    /// Effective number of workers
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count)
    }

    /// Check that the queue and pool sizes are usable
    pub fn validate(&self) -> Result<(), EventLogError> {
        if self.buffer_size == 0 {
            return Err(EventLogError::InvalidConfiguration {
                message: "buffer_size must be greater than zero".to_string(),
            });
        }
        if self.worker_count() == 0 {
            return Err(EventLogError::InvalidConfiguration {
                message: "workers must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Number of workers used when none is configured
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

// ============================================================================
// State, Statistics and Errors
// ============================================================================

/// Lifecycle state of an [`EventLog`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Uninitialized,
    Running,
    Closed,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Running => "running",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Snapshot of event log counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct EventLogStats {
    /// Events accepted into the queue
    pub accepted: u64,

    /// Events discarded because the queue was full or the log was not running
    pub dropped: u64,

    /// Events written to the destination
    pub written: u64,

    /// Accepted events lost because the destination write failed
    pub write_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) accepted: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) written: AtomicU64,
    pub(crate) write_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> EventLogStats {
        EventLogStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}

/// Errors returned by [`EventLog::start`]
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("Event log already started (state: {state})")]
    AlreadyStarted { state: ServiceState },

    #[error("Failed to provision log destination: {0}")]
    ProvisioningFailed(#[from] ProvisionError),

    #[error("Invalid event log configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Failed to spawn event log worker: {source}")]
    WorkerSpawnFailed {
        #[source]
        source: io::Error,
    },
}

// ============================================================================
// Event Log
// ============================================================================

/// Handles shared with the worker pool while the log is running
struct ActiveLog {
    queue: Arc<BoundedQueue<String>>,
    sink: Arc<LogSink>,
    barrier: Arc<CompletionBarrier>,
}

struct Inner {
    state: ServiceState,
    active: Option<ActiveLog>,
}

/// Asynchronous event log with a bounded queue and a fixed worker pool
///
/// Lifecycle: created, [`start`](Self::start)ed once, used, and
/// [`close`](Self::close)d once. A closed log cannot be restarted; create a
/// new instance instead. Dropping a running log closes it.
pub struct EventLog {
    config: EventLogConfig,
    inner: Mutex<Inner>,
    counters: Arc<Counters>,
}

impl EventLog {
    pub fn new(config: EventLogConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: ServiceState::Uninitialized,
                active: None,
            }),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn state(&self) -> ServiceState {
        self.lock().state
    }

    pub fn stats(&self) -> EventLogStats {
        self.counters.snapshot()
    }

    /// Provision `<directory>/<file_name>` and start the worker pool
    ///
    /// # Errors
    ///
    /// - [`EventLogError::AlreadyStarted`] unless the log is uninitialized
    /// - [`EventLogError::InvalidConfiguration`] for a zero buffer or pool size
    /// - [`EventLogError::ProvisioningFailed`] when the directory or file
    ///   cannot be prepared
    /// - [`EventLogError::WorkerSpawnFailed`] when a worker thread cannot be
    ///   created
    ///
    /// On error the log stays uninitialized.
    pub fn start(&self, file_name: &str) -> Result<(), EventLogError> {
        let mut inner = self.lock();
        self.check_startable(&inner)?;

        let sink = open_log_file(&self.config.directory, file_name)?;
        self.launch(&mut inner, sink)
    }

    /// Start the worker pool writing into a caller-provided destination
    ///
    /// Same contract as [`start`](Self::start) without the provisioning step.
    pub fn start_with_sink(&self, sink: LogSink) -> Result<(), EventLogError> {
        let mut inner = self.lock();
        self.check_startable(&inner)?;
        self.launch(&mut inner, sink)
    }

    /// Record an event without waiting
    ///
    /// The event is dropped (with a warning through `tracing`) when the log is
    /// not running or its queue is full.
    pub fn record_event(&self, event: String) {
        let queue = {
            let inner = self.lock();
            match (inner.state, inner.active.as_ref()) {
                (ServiceState::Running, Some(active)) => Arc::clone(&active.queue),
                (state, _) => {
                    drop(inner);
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        state = %state,
                        event_len = event.len(),
                        "Event log not running, dropping event"
                    );
                    return;
                }
            }
        };

        match queue.try_enqueue(event) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
            }
            Err(EnqueueError::Full) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    capacity = queue.capacity(),
                    "Event log queue is full, dropping event"
                );
            }
            Err(EnqueueError::Closed) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Event log is closing, dropping event");
            }
        }
    }

    /// Stop accepting events, drain the queue and close the destination
    ///
    /// Blocks until every worker has exited. Does nothing unless the log is
    /// running, so repeated or concurrent calls return immediately.
    pub fn close(&self) {
        if let Some(active) = self.begin_close() {
            active.barrier.wait();
            self.finish_close(&active);
        }
    }

    /// Like [`close`](Self::close), but stop waiting for the workers after
    /// `timeout`
    ///
    /// Returns `false` when the workers were still draining at the deadline.
    /// The log is closed for events either way; workers left behind keep
    /// writing until they finish, and the destination is released when the
    /// last of them exits.
    pub fn close_timeout(&self, timeout: Duration) -> bool {
        let Some(active) = self.begin_close() else {
            return true;
        };

        if !active.barrier.wait_timeout(timeout) {
            warn!(
                destination = %active.sink.description(),
                outstanding_workers = active.barrier.outstanding(),
                timeout_ms = timeout.as_millis() as u64,
                "Event log workers did not drain before the close timeout"
            );
            return false;
        }

        self.finish_close(&active);
        true
    }

    /// Flip to `Closed` and close the queue, returning the handles to wait on
    fn begin_close(&self) -> Option<ActiveLog> {
        let mut inner = self.lock();
        if inner.state != ServiceState::Running {
            return None;
        }
        inner.state = ServiceState::Closed;
        let active = inner.active.take();
        if let Some(active) = active.as_ref() {
            active.queue.close_for_writes();
        }
        active
    }

    // Only called once every worker has exited.
    fn finish_close(&self, active: &ActiveLog) {
        if let Err(e) = active.sink.close() {
            warn!(
                destination = %active.sink.description(),
                error = %e,
                "Failed to flush log destination on close"
            );
        }

        let stats = self.stats();
        info!(
            destination = %active.sink.description(),
            accepted = stats.accepted,
            written = stats.written,
            dropped = stats.dropped,
            write_failures = stats.write_failures,
            "Event log closed"
        );
    }

    fn check_startable(&self, inner: &Inner) -> Result<(), EventLogError> {
        if inner.state != ServiceState::Uninitialized {
            return Err(EventLogError::AlreadyStarted { state: inner.state });
        }
        self.config.validate()
    }

    fn launch(&self, inner: &mut Inner, sink: LogSink) -> Result<(), EventLogError> {
        let workers = self.config.worker_count();
        let queue = Arc::new(BoundedQueue::new(self.config.buffer_size));
        let sink = Arc::new(sink);
        let barrier = Arc::new(CompletionBarrier::new());

        if let Err(source) = worker::spawn_workers(workers, &queue, &sink, &self.counters, &barrier)
        {
            queue.close_for_writes();
            barrier.wait();
            if let Err(e) = sink.close() {
                warn!(error = %e, "Failed to close log destination after failed start");
            }
            return Err(EventLogError::WorkerSpawnFailed { source });
        }

        info!(
            destination = %sink.description(),
            workers = workers,
            buffer_size = self.config.buffer_size,
            "Event log started"
        );

        inner.state = ServiceState::Running;
        inner.active = Some(ActiveLog {
            queue,
            sink,
            barrier,
        });
        Ok(())
    }

    // State transitions are single assignments, so a poisoned lock still
    // holds a consistent value.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventRecorder for EventLog {
    fn record_event(&self, event: String) {
        EventLog::record_event(self, event);
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

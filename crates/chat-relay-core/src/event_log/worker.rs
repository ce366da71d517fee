//! Worker pool draining the event queue into the log sink, and the
//! completion barrier used to wait for every worker to finish.

use super::queue::BoundedQueue;
use super::sink::LogSink;
use super::Counters;
use std::io;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

// ============================================================================
// Completion Barrier
// ============================================================================

/// Counter of outstanding workers that can be waited on until it reaches zero
#[derive(Debug, Default)]
pub struct CompletionBarrier {
    outstanding: Mutex<usize>,
    finished: Condvar,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more outstanding worker
    ///
    /// The returned guard marks the worker as finished when dropped, including
    /// when the worker thread unwinds.
    pub fn register(self: &Arc<Self>) -> CompletionGuard {
        *self.lock() += 1;
        CompletionGuard {
            barrier: Arc::clone(self),
        }
    }

    pub fn outstanding(&self) -> usize {
        *self.lock()
    }

    /// Block until every registered worker has finished
    pub fn wait(&self) {
        let mut outstanding = self.lock();
        while *outstanding > 0 {
            outstanding = self
                .finished
                .wait(outstanding)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Block until every registered worker has finished or `timeout` elapses
    ///
    /// Returns `true` when the count reached zero.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut outstanding = self.lock();
        while *outstanding > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            outstanding = self
                .finished
                .wait_timeout(outstanding, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        true
    }

    fn finish_one(&self) {
        let mut outstanding = self.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.finished.notify_all();
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.outstanding
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Marks one registered worker as finished when dropped
#[derive(Debug)]
pub struct CompletionGuard {
    barrier: Arc<CompletionBarrier>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.barrier.finish_one();
    }
}

// ============================================================================
// Worker Pool
// ============================================================================

/// Spawn `count` worker threads draining `queue` into `sink`
///
/// Every spawned worker is registered with `barrier`. When a spawn fails the
/// error is returned immediately; workers spawned before the failure keep
/// running until the queue is closed.
pub(crate) fn spawn_workers(
    count: usize,
    queue: &Arc<BoundedQueue<String>>,
    sink: &Arc<LogSink>,
    counters: &Arc<Counters>,
    barrier: &Arc<CompletionBarrier>,
) -> io::Result<()> {
    for index in 0..count {
        let guard = barrier.register();
        let queue = Arc::clone(queue);
        let sink = Arc::clone(sink);
        let counters = Arc::clone(counters);

        thread::Builder::new()
            .name(format!("event-log-worker-{}", index))
            .spawn(move || {
                let _guard = guard;
                run_worker(index, &queue, &sink, &counters);
            })?;
    }

    Ok(())
}

/// Drain events until the queue is closed and empty
fn run_worker(index: usize, queue: &BoundedQueue<String>, sink: &LogSink, counters: &Counters) {
    while let Some(event) = queue.dequeue_blocking() {
        match sink.write_line(&event) {
            Ok(()) => {
                counters.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker = index,
                    destination = %sink.description(),
                    error = %e,
                    "Failed to write event to log destination; event lost"
                );
            }
        }
    }

    debug!(worker = index, "Event log worker drained queue and stopped");
}

use crate::error::{CaptureError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, error};

/// Size and age thresholds of a [`BatchQueue`].
///
/// **Fields**
/// - `batch_size`: number of buffered items that forces a flush.
/// - `threshold`: maximum age of the oldest buffered item before a flush
///   is forced, even if no further items arrive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub threshold: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 20,
            threshold: Duration::from_secs(2),
        }
    }
}

impl BatchOptions {
    // Enforce minimal thresholds to avoid degenerate configs.
    fn normalized(self) -> Self {
        Self {
            batch_size: self.batch_size.max(1),
            threshold: self.threshold.max(Duration::from_millis(10)),
        }
    }
}

/// Consumer of the batches swapped out of a [`BatchQueue`].
///
/// `execute` is never called concurrently with itself for the same queue.
#[async_trait]
pub trait BatchHandler<T>: Send + Sync {
    /// Process one batch, in enqueue order.
    ///
    /// **Returns**
    /// - `Ok(())` when the whole batch was handled.
    /// - `Err(..)` to report a failure. The batch is not retried.
    async fn execute(&self, batch: Vec<T>) -> Result<()>;
}

/// Counters exposed by [`BatchQueue::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Items accepted by `push`.
    pub pushed: u64,
    /// Items handed over to the handler.
    pub flushed: u64,
    /// Number of `execute` calls.
    pub batches: u64,
}

struct Buffer<T> {
    items: VecDeque<(Instant, T)>,
    closed: bool,
}

impl<T> Buffer<T> {
    fn oldest(&self) -> Option<Instant> {
        self.items.front().map(|(pushed_at, _)| *pushed_at)
    }

    fn is_due(&self, now: Instant, options: &BatchOptions) -> bool {
        match self.oldest() {
            Some(oldest) => {
                self.items.len() >= options.batch_size
                    || now.saturating_duration_since(oldest) >= options.threshold
            }
            None => false,
        }
    }

    /// Swap out at most one batch worth of items, oldest first.
    fn take(&mut self, max: usize) -> Vec<T> {
        let count = max.min(self.items.len());
        self.items.drain(..count).map(|(_, item)| item).collect()
    }
}

struct Shared<T> {
    buffer: Mutex<Buffer<T>>,
    /// Held across swap-and-execute so only one flush runs at a time.
    flush_lock: AsyncMutex<()>,
    wake: Notify,
    stopped: AtomicBool,
    handler: Arc<dyn BatchHandler<T>>,
    options: BatchOptions,
    pushed: AtomicU64,
    flushed: AtomicU64,
    batches: AtomicU64,
}

impl<T: Send + 'static> Shared<T> {
    async fn flush_batch(&self, force: bool) -> Result<usize> {
        let _flushing = self.flush_lock.lock().await;

        let batch = {
            let mut buffer = self.buffer.lock();
            if buffer.items.is_empty() || (!force && !buffer.is_due(Instant::now(), &self.options)) {
                return Ok(0);
            }
            buffer.take(self.options.batch_size)
        };

        let count = batch.len();
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.flushed.fetch_add(count as u64, Ordering::Relaxed);
        debug!(target: "log_capture::queue", count, force, "flushing batch");

        self.handler.execute(batch).await.map(|()| count)
    }

    /// Flush batch after batch until nothing is due (or, forced, until the
    /// buffer is empty). Stops at the first failing batch.
    async fn drain(&self, force: bool) -> Result<usize> {
        let mut total = 0;
        loop {
            match self.flush_batch(force).await? {
                0 => return Ok(total),
                count => total += count,
            }
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.buffer
            .lock()
            .oldest()
            .map(|oldest| oldest + self.options.threshold)
    }
}

/// Thread-safe accumulator that hands buffered items to a [`BatchHandler`]
/// once `batch_size` items are waiting or the oldest one is older than
/// `threshold`.
///
/// Producers call [`push`](Self::push) from any thread. A worker task spawned
/// by [`new`](Self::new) owns the age timer, so buffered items are flushed
/// even when no further pushes arrive. Items still buffered when the process
/// exits without [`close`](Self::close) are lost.
pub struct BatchQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BatchQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> BatchQueue<T> {
    /// Create a queue and spawn its flush worker on the current Tokio
    /// runtime.
    ///
    /// **Parameters**
    /// - `options`: size and age thresholds; `batch_size` is raised to at
    ///   least 1 and `threshold` to at least 10ms.
    /// - `handler`: receives every swapped-out batch.
    ///
    /// **Returns**
    /// - the queue handle and the worker's `JoinHandle`. The worker exits
    ///   after [`close`](Self::close).
    pub fn new(options: BatchOptions, handler: Arc<dyn BatchHandler<T>>) -> (Self, JoinHandle<()>) {
        let shared = Arc::new(Shared {
            buffer: Mutex::new(Buffer {
                items: VecDeque::new(),
                closed: false,
            }),
            flush_lock: AsyncMutex::new(()),
            wake: Notify::new(),
            stopped: AtomicBool::new(false),
            handler,
            options: options.normalized(),
            pushed: AtomicU64::new(0),
            flushed: AtomicU64::new(0),
            batches: AtomicU64::new(0),
        });

        let worker = Arc::clone(&shared);
        let handle = tokio::spawn(run_worker(worker));

        (Self { shared }, handle)
    }

    /// Append an item. The size threshold is evaluated immediately and the
    /// worker is woken when a flush is due or the age deadline changed.
    pub fn push(&self, item: T) -> Result<()> {
        let wake = {
            let mut buffer = self.shared.buffer.lock();
            if buffer.closed {
                return Err(CaptureError::QueueClosed);
            }
            let was_empty = buffer.items.is_empty();
            buffer.items.push_back((Instant::now(), item));
            was_empty || buffer.items.len() >= self.shared.options.batch_size
        };

        self.shared.pushed.fetch_add(1, Ordering::Relaxed);
        if wake {
            self.shared.wake.notify_one();
        }
        Ok(())
    }

    /// Flush while the size or age threshold is reached. Each handler call
    /// receives at most `batch_size` items.
    ///
    /// **Returns**
    /// - number of items handed to the handler, `0` when nothing was due.
    pub async fn flush_if_due(&self) -> Result<usize> {
        self.shared.drain(false).await
    }

    /// Flush whatever is buffered, regardless of thresholds.
    pub async fn flush(&self) -> Result<usize> {
        self.shared.drain(true).await
    }

    /// Reject further pushes, drain the buffer and stop the worker.
    pub async fn close(&self) -> Result<usize> {
        self.shared.buffer.lock().closed = true;
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.wake.notify_one();
        self.shared.drain(true).await
    }

    pub fn is_closed(&self) -> bool {
        self.shared.buffer.lock().closed
    }

    /// Number of buffered, not yet flushed items.
    pub fn len(&self) -> usize {
        self.shared.buffer.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn options(&self) -> &BatchOptions {
        &self.shared.options
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pushed: self.shared.pushed.load(Ordering::Relaxed),
            flushed: self.shared.flushed.load(Ordering::Relaxed),
            batches: self.shared.batches.load(Ordering::Relaxed),
        }
    }
}

async fn run_worker<T: Send + 'static>(shared: Arc<Shared<T>>) {
    loop {
        if shared.stopped.load(Ordering::Acquire) {
            break;
        }

        match shared.deadline() {
            Some(deadline) => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = sleep_until(deadline) => {}
                }
            }
            None => shared.wake.notified().await,
        }

        if let Err(e) = shared.drain(false).await {
            error!(target: "log_capture::queue", error = %e, "background flush failed");
        }
    }
    debug!(target: "log_capture::queue", "flush worker stopped");
}

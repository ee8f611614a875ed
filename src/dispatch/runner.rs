//! The dispatch loop itself.
//!
//! The loop drains the pending queue in FIFO batches until it is empty or
//! cancellation is requested. Suspension happens only at two points (the
//! coalescing-window sleep and the backoff sleep), and both are cancelled
//! by the shared shutdown token. Callers never block on the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, warn};

use crate::queue::PendingQueue;
use crate::sender::{RemoteSender, SendOutcome};
use crate::types::{CallRecord, EventRecord};

/// Clears the single-flight flag when the loop exits, however it exits.
struct RunningGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Owns the background dispatch loop and its retry policy state.
///
/// Shared between the facade (which triggers it) and the loop task itself.
pub struct Dispatcher<S> {
    queue: Arc<PendingQueue>,
    sender: S,

    /// Coalescing window slept before each iteration while the queue is
    /// non-empty. Zero disables the window.
    flush_interval: Duration,

    /// Fixed delay before retrying after a transient failure.
    backoff: Duration,

    /// Age past which queued events are swept. `None` disables expiry.
    event_ttl: Option<Duration>,

    /// Working upper bound on events per batch. Halved (floor 1) when the
    /// server reports an oversized payload.
    max_batch_size: AtomicUsize,

    /// Single-flight flag: set while a loop task is active.
    running: Arc<AtomicBool>,

    /// Set permanently on `InvalidCredential`; no further sends for the
    /// life of this instance.
    disabled: AtomicBool,

    /// Shared shutdown signal, checked at every suspension point and at
    /// the top of every iteration.
    shutdown: CancellationToken,

    /// Handle of the currently running loop task, for the bounded
    /// shutdown wait.
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S> Dispatcher<S>
where
    S: RemoteSender + Send + Sync + 'static,
{
    /// Creates a dispatcher over the given queue and sender.
    pub fn new(
        queue: Arc<PendingQueue>,
        sender: S,
        flush_interval: Duration,
        backoff: Duration,
        event_ttl: Option<Duration>,
        max_batch_size: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Dispatcher {
            queue,
            sender,
            flush_interval,
            backoff,
            event_ttl,
            max_batch_size: AtomicUsize::new(max_batch_size.max(1)),
            running: Arc::new(AtomicBool::new(false)),
            disabled: AtomicBool::new(false),
            shutdown,
            task: Mutex::new(None),
        }
    }

    /// The queue this dispatcher drains.
    pub fn queue(&self) -> &Arc<PendingQueue> {
        &self.queue
    }

    /// Current working maximum batch size.
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size.load(Ordering::Acquire)
    }

    /// True once an `InvalidCredential` outcome permanently disabled
    /// delivery for this instance.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// The shared shutdown token.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Attempts to start the background loop.
    ///
    /// A no-op if a loop is already active, delivery has been disabled, or
    /// shutdown has begun. The active loop observes newly appended records
    /// by re-reading the queue each iteration, so no wake-up is needed.
    pub fn trigger(self: &Arc<Self>) {
        if self.disabled.load(Ordering::Acquire) || self.shutdown.is_cancelled() {
            return;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let this = Arc::clone(self);
        let handle = tokio::spawn(this.run());
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Cancels the loop and waits (bounded) for the current invocation to
    /// observe cancellation and exit.
    pub async fn stop(&self, wait: Duration) {
        self.shutdown.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if tokio::time::timeout(wait, task).await.is_err() {
                warn!("dispatch loop did not exit within the shutdown wait");
            }
        }
    }

    #[instrument(skip_all)]
    async fn run(self: Arc<Self>) {
        let _guard = RunningGuard {
            running: Arc::clone(&self.running),
        };

        loop {
            if self.shutdown.is_cancelled() {
                return;
            }

            // Coalescing window: let concurrent appends accumulate into
            // one batch.
            if !self.flush_interval.is_zero() && !self.queue.is_empty() {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return,
                    _ = sleep(self.flush_interval) => {}
                }
            }

            self.sweep_expired();
            if self.queue.is_empty() {
                break;
            }

            let batch = self.queue.peek_batch(self.max_batch_size());
            let Some(first) = batch.first() else {
                break;
            };

            // Identity updates are never batched; everything else in the
            // peeked prefix waits for the next iteration.
            let (outcome, sent) = match first {
                CallRecord::IdentityUpdate(update) => {
                    (self.sender.send_identify(update, &self.shutdown).await, 1)
                }
                CallRecord::Event(_) => {
                    let events: Vec<EventRecord> = batch
                        .iter()
                        .filter_map(|record| match record {
                            CallRecord::Event(event) => Some(event.clone()),
                            CallRecord::IdentityUpdate(_) => None,
                        })
                        .collect();
                    let outcome = self.sender.send_batch(&events, &self.shutdown).await;
                    (outcome, events.len())
                }
            };

            if self.shutdown.is_cancelled() {
                return;
            }

            match outcome {
                SendOutcome::Success => {
                    debug!(sent, "batch delivered");
                    self.queue.remove_front(sent);
                }
                SendOutcome::BadData => {
                    // Conservative: the whole batch is dropped rather than
                    // bisected to find the offending record.
                    error!(dropped = sent, "server rejected batch as bad data; dropping it");
                    self.queue.remove_front(sent);
                }
                SendOutcome::InvalidCredential => {
                    self.disabled.store(true, Ordering::Release);
                    error!(
                        pending = self.queue.len(),
                        "credential rejected; delivery disabled for this instance, queued data retained"
                    );
                    return;
                }
                SendOutcome::PayloadTooLarge if sent > 1 => {
                    let halved = (self.max_batch_size() / 2).max(1);
                    self.max_batch_size.store(halved, Ordering::Release);
                    warn!(max_batch_size = halved, "payload too large; halving batch size");
                }
                SendOutcome::PayloadTooLarge => {
                    error!("single record exceeds the payload limit; dropping it");
                    self.queue.remove_front(1);
                }
                SendOutcome::Throttled | SendOutcome::ServerError | SendOutcome::NetworkError => {
                    warn!(
                        ?outcome,
                        backoff_secs = self.backoff.as_secs_f64(),
                        "transient send failure; backing off"
                    );
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return,
                        _ = sleep(self.backoff) => {}
                    }
                }
            }
        }

        // Close the race with an append that lost the single-flight CAS
        // while this loop was observing an empty queue.
        drop(_guard);
        if !self.queue.is_empty() {
            self.trigger();
        }
    }

    fn sweep_expired(&self) {
        let Some(ttl) = self.event_ttl else {
            return;
        };
        let cutoff = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl));
        if let Some(cutoff) = cutoff {
            let removed = self.queue.remove_expired(cutoff);
            if removed > 0 {
                debug!(removed, "dropped expired events from the pending queue");
            }
        }
    }
}

impl<S> std::fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("flush_interval", &self.flush_interval)
            .field("backoff", &self.backoff)
            .field("event_ttl", &self.event_ttl)
            .field("max_batch_size", &self.max_batch_size)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

//! Save/load orchestration between the pending queue and the sink.
//!
//! `save` snapshots the queue under the queue lock, then writes under a
//! separate sink lock, so the queue lock is never held across disk I/O.
//! `load` runs once at startup and restores the persisted backlog to the
//! front of the queue. Both are non-fatal on failure: the service degrades
//! to memory-only operation.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::queue::PendingQueue;

use super::sink::PersistenceSink;
use super::store;

struct SinkState {
    sink: Box<dyn PersistenceSink>,
    /// Whether the sink held data after the last load/save. When the queue
    /// is empty and the sink was already empty, a save is a no-op.
    had_data: bool,
}

/// Owns the persistence sink and mediates all access to it.
pub struct PersistenceManager {
    state: Mutex<SinkState>,
}

impl PersistenceManager {
    /// Wraps a host-supplied sink.
    pub fn new(sink: Box<dyn PersistenceSink>) -> Self {
        PersistenceManager {
            state: Mutex::new(SinkState {
                sink,
                had_data: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads the sink once and restores any persisted backlog to the front
    /// of the queue. Returns the number of records restored.
    ///
    /// I/O or deserialization failure is logged and treated as "no prior
    /// data"; startup never fails because of the sink.
    pub fn load(&self, queue: &PendingQueue) -> usize {
        let mut state = self.lock();

        let bytes = match state.sink.seek_start().and_then(|()| state.sink.read_to_end()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "failed to read persistence sink; starting with an empty queue");
                return 0;
            }
        };
        state.had_data = !bytes.is_empty();

        let records = match store::decode(&bytes) {
            Ok(records) => records,
            Err(err) => {
                error!(error = %err, "failed to decode persisted queue; starting with an empty queue");
                return 0;
            }
        };

        let restored = records.len();
        if restored > 0 {
            debug!(restored, "restored persisted calls to the front of the queue");
            queue.restore(records);
        }
        restored
    }

    /// Serializes a snapshot of the queue and overwrites the sink's entire
    /// content.
    ///
    /// Skipped entirely when the queue is empty and the sink was already
    /// empty. Failure to write is logged and non-fatal; the in-memory queue
    /// is unaffected either way.
    pub fn save(&self, queue: &PendingQueue) {
        let snapshot = queue.snapshot();
        let mut state = self.lock();

        if snapshot.is_empty() && !state.had_data {
            return;
        }

        let bytes = match store::encode(&snapshot) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(error = %err, "failed to encode pending queue; skipping save");
                return;
            }
        };

        let write = state
            .sink
            .seek_start()
            .and_then(|()| state.sink.truncate())
            .and_then(|()| state.sink.write_all(&bytes))
            .and_then(|()| state.sink.flush());

        match write {
            Ok(()) => {
                state.had_data = !snapshot.is_empty();
                debug!(saved = snapshot.len(), "persisted pending queue");
            }
            Err(err) => {
                warn!(error = %err, "failed to write persistence sink; continuing in memory");
            }
        }
    }
}

impl std::fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceManager").finish_non_exhaustive()
    }
}

/// Spawns the periodic background save task.
///
/// The task saves every `interval` until the shutdown token is cancelled.
/// Callers must not spawn it with a zero interval; interval 0 means
/// "periodic saves disabled" and is handled by the facade.
pub fn spawn_periodic_save(
    manager: std::sync::Arc<PersistenceManager>,
    queue: std::sync::Arc<PendingQueue>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    debug_assert!(!interval.is_zero());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick would duplicate the startup load.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => manager.save(&queue),
            }
        }
    })
}

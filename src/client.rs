//! The public facade of the delivery agent.
//!
//! A [`Beacon`] owns the pending queue, the dispatch loop, and (optionally)
//! the persistence manager. All public operations are non-blocking and may
//! be called from any number of concurrent tasks: they construct a call
//! record, append it to the queue, and nudge the background loop; network
//! and disk I/O never happen on the caller's path.
//!
//! # Lifecycle
//!
//! Construction validates the configuration synchronously (usage errors
//! such as a placeholder credential surface immediately, never queued).
//! [`Beacon::shutdown`] performs the graceful stop: cancel the loop, wait
//! (bounded) for it to observe cancellation, then run a final persistence
//! save. Dropping an un-shut-down instance still performs a best-effort
//! save.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{BeaconConfig, ConfigError};
use crate::dispatch::Dispatcher;
use crate::persistence::{PersistenceManager, PersistenceSink, spawn_periodic_save};
use crate::queue::PendingQueue;
use crate::sender::RemoteSender;
use crate::types::{CallRecord, EventRecord, Identity, IdentityUpdate, Properties};

/// Bound on how long a graceful shutdown waits for the dispatch loop.
pub const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// Caller mistakes surfaced synchronously, never queued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// An identity-less event call arrived before any identify call.
    #[error("an identity-less event requires a prior identify call")]
    MissingIdentity,
}

struct SessionState {
    session_start: DateTime<Utc>,
    last_identity: Option<Identity>,
}

/// The client-side event-delivery agent.
///
/// Generic over the [`RemoteSender`] implementation so the wire transport
/// stays substitutable (and mockable in tests).
pub struct Beacon<S>
where
    S: RemoteSender + Send + Sync + 'static,
{
    config: BeaconConfig,
    dispatcher: Arc<Dispatcher<S>>,
    persistence: Option<Arc<PersistenceManager>>,
    save_task: Mutex<Option<JoinHandle<()>>>,
    session: Mutex<SessionState>,
    next_seq: AtomicU64,
    shutdown_started: AtomicBool,
}

impl<S> Beacon<S>
where
    S: RemoteSender + Send + Sync + 'static,
{
    /// Creates an agent without durable persistence (memory-only queue).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an empty or placeholder API key.
    pub fn new(config: BeaconConfig, sender: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let queue = Arc::new(PendingQueue::new());
        let dispatcher = Arc::new(Dispatcher::new(
            queue,
            sender,
            config.flush_interval,
            config.backoff,
            config.event_ttl,
            config.max_batch_size,
            CancellationToken::new(),
        ));
        Ok(Beacon {
            config,
            dispatcher,
            persistence: None,
            save_task: Mutex::new(None),
            session: Mutex::new(SessionState {
                session_start: Utc::now(),
                last_identity: None,
            }),
            next_seq: AtomicU64::new(0),
            shutdown_started: AtomicBool::new(false),
        })
    }

    /// Creates an agent backed by a durable sink.
    ///
    /// Loads any persisted backlog into the front of the queue, starts
    /// delivering it, and (unless `save_interval` is zero) spawns the
    /// periodic save task. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for an invalid API key. Sink failures are
    /// never construction errors; the agent degrades to memory-only
    /// operation.
    pub fn with_persistence(
        config: BeaconConfig,
        sender: S,
        sink: Box<dyn PersistenceSink>,
    ) -> Result<Self, ConfigError> {
        let mut beacon = Self::new(config, sender)?;
        let manager = Arc::new(PersistenceManager::new(sink));

        let restored = manager.load(beacon.dispatcher.queue());
        if restored > 0 {
            info!(restored, "resuming delivery of persisted backlog");
            beacon.dispatcher.trigger();
        }

        if !beacon.config.save_interval.is_zero() {
            let handle = spawn_periodic_save(
                Arc::clone(&manager),
                Arc::clone(beacon.dispatcher.queue()),
                beacon.config.save_interval,
                beacon.dispatcher.shutdown_token().clone(),
            );
            *beacon
                .save_task
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }

        beacon.persistence = Some(manager);
        Ok(beacon)
    }

    fn session(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The configuration this agent was built with.
    pub fn config(&self) -> &BeaconConfig {
        &self.config
    }

    /// Number of calls currently awaiting delivery. For diagnostics and
    /// tests.
    pub fn queue_size(&self) -> usize {
        self.dispatcher.queue().len()
    }

    /// Records an identity update and remembers the identity for
    /// subsequent identity-less [`event`](Self::event) calls.
    pub fn identify(&self, identity: Identity, properties: Properties) {
        self.session().last_identity = Some(identity.clone());
        self.dispatcher
            .queue()
            .append(CallRecord::IdentityUpdate(IdentityUpdate::new(
                identity, properties,
            )));
        self.dispatcher.trigger();
    }

    /// Records an event attributed to the last identified identity.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::MissingIdentity`] if no identify call has
    /// happened yet on this instance.
    pub fn event(
        &self,
        event_type: impl Into<String>,
        properties: Properties,
    ) -> Result<(), UsageError> {
        let (identity, session_id) = {
            let session = self.session();
            let identity = session
                .last_identity
                .clone()
                .ok_or(UsageError::MissingIdentity)?;
            (identity, session.session_start.timestamp_millis())
        };
        self.enqueue_event(identity, event_type.into(), properties, session_id);
        Ok(())
    }

    /// Records an event attributed to an explicit identity.
    pub fn event_for(
        &self,
        identity: Identity,
        event_type: impl Into<String>,
        properties: Properties,
    ) {
        let session_id = self.session().session_start.timestamp_millis();
        self.enqueue_event(identity, event_type.into(), properties, session_id);
    }

    fn enqueue_event(
        &self,
        identity: Identity,
        event_type: String,
        properties: Properties,
        session_id: i64,
    ) {
        // Global defaults first, so event-specific keys win on conflict.
        let mut merged = self.config.default_properties.clone();
        merged.extend(properties);

        let sequence_id = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let record = EventRecord::new(identity, event_type, sequence_id)
            .with_properties(merged)
            .with_session_id(session_id);

        debug!(sequence_id, event_type = %record.event_type, "event queued");
        self.dispatcher.queue().append(CallRecord::Event(record));
        self.dispatcher.trigger();
    }

    /// Resets the session start to the current time. Does not touch the
    /// queue.
    pub fn new_session(&self) {
        self.session().session_start = Utc::now();
    }

    /// Graceful stop: cancel the dispatch loop, wait (bounded) for its
    /// current iteration, then run a final persistence save.
    ///
    /// Idempotent; later calls return immediately.
    pub async fn shutdown(&self) {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.dispatcher.stop(SHUTDOWN_WAIT).await;

        let save_task = self
            .save_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = save_task {
            let _ = tokio::time::timeout(SHUTDOWN_WAIT, task).await;
        }

        if let Some(manager) = &self.persistence {
            manager.save(self.dispatcher.queue());
        }
        info!(pending = self.queue_size(), "delivery agent shut down");
    }
}

impl<S> Drop for Beacon<S>
where
    S: RemoteSender + Send + Sync + 'static,
{
    fn drop(&mut self) {
        // Best-effort save when the host abandoned the graceful path.
        if !self.shutdown_started.swap(true, Ordering::SeqCst) {
            self.dispatcher.shutdown_token().cancel();
            if let Some(manager) = &self.persistence {
                manager.save(self.dispatcher.queue());
            }
        }
    }
}

impl<S> std::fmt::Debug for Beacon<S>
where
    S: RemoteSender + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Beacon")
            .field("queue_size", &self.queue_size())
            .field("persistence", &self.persistence.is_some())
            .finish_non_exhaustive()
    }
}

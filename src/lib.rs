//! Beacon - a client-side analytics event delivery agent.
//!
//! Applications hand Beacon identity updates and events; it queues them,
//! batches them, and reliably forwards them to a remote ingestion endpoint,
//! surviving transient network failure, server throttling, and process
//! restarts without losing data. Delivery is at-least-once: every event
//! carries a unique dedup token, so re-sends are idempotent from the
//! server's point of view.
//!
//! The wire transport is supplied by the host as a [`RemoteSender`]
//! implementation; Beacon owns the pending queue, the single-flight
//! dispatch loop with its retry/backoff policy, and durable persistence of
//! unsent calls across restarts.
//!
//! ```no_run
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use beacon::{Beacon, BeaconConfig, Identity, Properties, RemoteSender, SendOutcome};
//! use beacon::types::{EventRecord, IdentityUpdate};
//!
//! // Wraps your HTTP client, endpoint residency, and status-code
//! // classification.
//! struct HttpSender;
//!
//! impl RemoteSender for HttpSender {
//!     async fn send_identify(
//!         &self,
//!         _call: &IdentityUpdate,
//!         _cancel: &CancellationToken,
//!     ) -> SendOutcome {
//!         SendOutcome::Success
//!     }
//!
//!     async fn send_batch(
//!         &self,
//!         _batch: &[EventRecord],
//!         _cancel: &CancellationToken,
//!     ) -> SendOutcome {
//!         SendOutcome::Success
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BeaconConfig::new("api-key").with_flush_interval(Duration::from_secs(2));
//! let client = Beacon::new(config, HttpSender)?;
//!
//! client.identify(Identity::from_user_id("alice"), Properties::new());
//! client.event("signup", Properties::new())?;
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod persistence;
pub mod queue;
pub mod sender;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use client::{Beacon, SHUTDOWN_WAIT, UsageError};
pub use config::{BeaconConfig, ConfigError, PLACEHOLDER_API_KEY, ServerZone};
pub use persistence::{FileSink, PersistenceSink};
pub use queue::PendingQueue;
pub use sender::{RemoteSender, SendOutcome};
pub use types::{CallRecord, EventRecord, Identity, IdentityError, IdentityUpdate, Properties};

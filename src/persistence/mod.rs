//! Durable persistence of unsent calls across restarts.
//!
//! The pending queue is serialized to a host-supplied byte sink on a timer
//! and at shutdown, and restored from it at startup. Persistence failures
//! are never fatal: a failed save leaves the in-memory queue intact, and a
//! failed load starts the service with an empty queue.

pub mod manager;
pub mod sink;
pub mod store;

pub use manager::{PersistenceManager, spawn_periodic_save};
pub use sink::{FileSink, PersistenceSink};
pub use store::{SCHEMA_VERSION, StoreError};

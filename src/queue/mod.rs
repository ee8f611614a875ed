//! In-memory pending queue of calls awaiting delivery.
//!
//! The queue is the only resource in the crate with concurrent writers
//! (facade callers append, the dispatch loop removes). It is guarded by a
//! single mutex per service instance, held only for the duration of a queue
//! mutation and never across network or disk I/O.

pub mod pending;

pub use pending::PendingQueue;

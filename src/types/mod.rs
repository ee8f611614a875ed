//! Core value types: identities and queued call records.
//!
//! Everything in here is an immutable-after-construction value type. The
//! invariants (identity never empty, sequence ids strictly increasing,
//! dedup tokens unique) are encoded at construction time so nothing
//! malformed ever reaches the pending queue.

pub mod call;
pub mod identity;

pub use call::{CallKind, CallRecord, EventRecord, IdentityUpdate, Properties, REMOTE_SOURCE_IP};
pub use identity::{Identity, IdentityError};

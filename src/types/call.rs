//! Queued call records: identity updates and events.
//!
//! A call record is one unit of work awaiting delivery: either an identity
//! update (a property set attached to a user/device) or an event. Records
//! are immutable after construction and carry everything needed to re-send
//! them unmodified after a restart.
//!
//! # Ordering and deduplication
//!
//! Every event carries a `sequence_id` assigned from one atomic counter per
//! service instance, so sequence ids strictly increase in creation order
//! even under concurrent callers. Every event also carries a `dedup_token`
//! (a v4 UUID, generated exactly once at construction). Re-sends after a
//! transient failure reuse the same token, so the remote endpoint can
//! discard duplicates and at-least-once delivery is idempotent from the
//! server's point of view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// Ordered key-value properties attached to a call.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Sentinel source IP meaning "infer the address from the request".
pub const REMOTE_SOURCE_IP: &str = "$remote";

fn default_source_ip() -> String {
    REMOTE_SOURCE_IP.to_string()
}

/// An identity update: a property set to attach to a user/device.
///
/// Identity updates are never batched; the dispatch loop sends them one at
/// a time, and the TTL sweep never expires them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityUpdate {
    /// The identity the properties are attached to.
    pub identity: Identity,

    /// Properties to set on the identity.
    #[serde(default)]
    pub properties: Properties,
}

impl IdentityUpdate {
    /// Creates an identity update.
    pub fn new(identity: Identity, properties: Properties) -> Self {
        IdentityUpdate {
            identity,
            properties,
        }
    }
}

/// A single analytics event awaiting delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Snapshot of the identity the event was created with.
    pub identity: Identity,

    /// The event name, e.g. `"signup"`.
    pub event_type: String,

    /// Event properties (global defaults merged in at creation time).
    #[serde(default)]
    pub properties: Properties,

    /// When the event occurred. Events with no timestamp never TTL-expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    /// Position in per-instance creation order. Strictly increasing.
    pub sequence_id: u64,

    /// Unique token letting the remote endpoint discard duplicate re-sends.
    /// Generated once at construction, never regenerated on retry.
    pub dedup_token: String,

    /// Session the event belongs to (session start as epoch millis).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,

    /// Source IP to attribute, defaulting to [`REMOTE_SOURCE_IP`].
    #[serde(default = "default_source_ip")]
    pub source_ip: String,
}

impl EventRecord {
    /// Creates an event stamped with the current time and a fresh dedup
    /// token. The sequence id is assigned by the caller (the facade owns
    /// the atomic counter).
    pub fn new(identity: Identity, event_type: impl Into<String>, sequence_id: u64) -> Self {
        EventRecord {
            identity,
            event_type: event_type.into(),
            properties: Properties::new(),
            time: Some(Utc::now()),
            sequence_id,
            dedup_token: uuid::Uuid::new_v4().to_string(),
            session_id: None,
            source_ip: default_source_ip(),
        }
    }

    /// Sets the event properties.
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Sets the session id.
    pub fn with_session_id(mut self, session_id: i64) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Overrides the event timestamp.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }
}

/// One queued unit of work: either an identity update or an event.
///
/// This is a closed variant type; the dispatch loop switches on the tag.
/// Identity updates and events are never batched together because the
/// remote protocols differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallRecord {
    /// A property set to attach to an identity.
    IdentityUpdate(IdentityUpdate),

    /// An analytics event.
    Event(EventRecord),
}

/// Variant tag of a [`CallRecord`], used for same-variant batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// An identity-update call.
    IdentityUpdate,
    /// An event call.
    Event,
}

impl CallRecord {
    /// Returns the variant tag.
    pub fn kind(&self) -> CallKind {
        match self {
            CallRecord::IdentityUpdate(_) => CallKind::IdentityUpdate,
            CallRecord::Event(_) => CallKind::Event,
        }
    }

    /// Returns true for event calls.
    pub fn is_event(&self) -> bool {
        matches!(self, CallRecord::Event(_))
    }

    /// The identity snapshot this call was created with.
    pub fn identity(&self) -> &Identity {
        match self {
            CallRecord::IdentityUpdate(u) => &u.identity,
            CallRecord::Event(e) => &e.identity,
        }
    }
}

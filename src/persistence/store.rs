//! Serialized form of the persisted queue.
//!
//! The sink holds one JSON document: a schema version, a save timestamp,
//! and the ordered list of call records, each carrying enough data to be
//! re-sent unmodified.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::CallRecord;

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors that can occur while encoding or decoding the persisted queue.
#[derive(Debug, Error)]
pub enum StoreError {
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Schema version mismatch.
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch { expected: u32, got: u32 },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedQueue {
    schema_version: u32,
    saved_at: DateTime<Utc>,
    calls: Vec<CallRecord>,
}

/// Encodes an ordered queue snapshot into the persisted form.
pub fn encode(calls: &[CallRecord]) -> Result<Vec<u8>> {
    let doc = PersistedQueue {
        schema_version: SCHEMA_VERSION,
        saved_at: Utc::now(),
        calls: calls.to_vec(),
    };
    Ok(serde_json::to_vec(&doc)?)
}

/// Decodes a persisted document back into an ordered record sequence.
///
/// An empty byte string decodes to an empty sequence (a fresh sink holds
/// no document).
///
/// # Errors
///
/// Returns an error for malformed JSON or a schema version this build does
/// not understand. Callers treat either as "no prior data".
pub fn decode(bytes: &[u8]) -> Result<Vec<CallRecord>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let doc: PersistedQueue = serde_json::from_slice(bytes)?;
    if doc.schema_version != SCHEMA_VERSION {
        return Err(StoreError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            got: doc.schema_version,
        });
    }
    Ok(doc.calls)
}

//! Ordered FIFO queue of call records awaiting delivery.
//!
//! Insertion order is delivery priority. Removals happen from the front in
//! contiguous ranges, with one exception: the TTL sweep may remove event
//! records anywhere in the queue when their timestamp predates a cutoff.
//! Identity updates carry no expiry semantics and are never swept.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::types::CallRecord;

/// The pending-call queue shared between the facade and the dispatch loop.
///
/// All operations take the internal lock for the duration of the mutation
/// only. Batches are *peeked*, not popped: the dispatch loop removes the
/// batch from the front only after the remote sender accepted it, so a
/// failed send leaves the queue untouched.
#[derive(Debug, Default)]
pub struct PendingQueue {
    calls: Mutex<VecDeque<CallRecord>>,
}

impl PendingQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        PendingQueue {
            calls: Mutex::new(VecDeque::new()),
        }
    }

    // A panic while the lock is held cannot leave the queue in a torn
    // state (every mutation is a single VecDeque call), so poisoning is
    // ignored rather than propagated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<CallRecord>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a record to the tail of the queue.
    pub fn append(&self, record: CallRecord) {
        self.lock().push_back(record);
    }

    /// Returns the number of records currently pending.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns the longest same-variant prefix of the queue, up to
    /// `max_count` records.
    ///
    /// Identity updates and events are never batched together (the remote
    /// protocols differ), so the prefix stops at the first record whose
    /// variant differs from the front record's. Returns an empty batch if
    /// the queue is empty.
    pub fn peek_batch(&self, max_count: usize) -> Vec<CallRecord> {
        let calls = self.lock();
        let front_kind = match calls.front() {
            Some(front) => front.kind(),
            None => return Vec::new(),
        };
        calls
            .iter()
            .take(max_count)
            .take_while(|record| record.kind() == front_kind)
            .cloned()
            .collect()
    }

    /// Removes the first `n` records.
    ///
    /// `n` must not exceed the current queue size; the dispatch loop only
    /// ever removes a batch it previously peeked.
    pub fn remove_front(&self, n: usize) {
        let mut calls = self.lock();
        debug_assert!(n <= calls.len());
        let count = n.min(calls.len());
        calls.drain(..count);
    }

    /// Removes every event record whose timestamp predates `cutoff`,
    /// returning the count removed.
    ///
    /// Identity updates are never removed, and neither are events with no
    /// timestamp.
    pub fn remove_expired(&self, cutoff: DateTime<Utc>) -> usize {
        let mut calls = self.lock();
        let before = calls.len();
        calls.retain(|record| match record {
            CallRecord::Event(event) => match event.time {
                Some(time) => time >= cutoff,
                None => true,
            },
            CallRecord::IdentityUpdate(_) => true,
        });
        before - calls.len()
    }

    /// Returns a point-in-time ordered copy of the queue for serialization.
    pub fn snapshot(&self) -> Vec<CallRecord> {
        self.lock().iter().cloned().collect()
    }

    /// Prepends a previously persisted ordered sequence to the front of the
    /// queue, so older, previously-queued data is delivered before newly
    /// created calls.
    pub fn restore(&self, records: Vec<CallRecord>) {
        let mut calls = self.lock();
        for record in records.into_iter().rev() {
            calls.push_front(record);
        }
    }
}

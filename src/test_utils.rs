//! Shared test utilities: arbitrary generators, a scripted mock sender,
//! and in-memory persistence sinks.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::persistence::PersistenceSink;
use crate::queue::PendingQueue;
use crate::sender::{RemoteSender, SendOutcome};
use crate::types::{CallRecord, EventRecord, Identity, IdentityUpdate, Properties};

// ─── Builders ─────────────────────────────────────────────────────────────

/// An event call stamped with the current time.
pub fn event_call(event_type: &str, sequence_id: u64) -> CallRecord {
    CallRecord::Event(EventRecord::new(
        Identity::from_user_id("test-user"),
        event_type,
        sequence_id,
    ))
}

/// An identity-update call for the given user.
pub fn identity_call(user_id: &str) -> CallRecord {
    CallRecord::IdentityUpdate(IdentityUpdate::new(
        Identity::from_user_id(user_id),
        Properties::new(),
    ))
}

// ─── Arbitrary generators ─────────────────────────────────────────────────

pub fn arb_identity() -> impl Strategy<Value = Identity> {
    prop_oneof![
        "[a-z0-9]{1,12}".prop_map(Identity::from_user_id),
        "[a-z0-9]{1,12}".prop_map(Identity::from_device_id),
        ("[a-z0-9]{1,12}", "[a-z0-9]{1,12}").prop_map(|(u, d)| Identity {
            user_id: Some(u),
            device_id: Some(d),
        }),
    ]
}

pub fn arb_properties() -> impl Strategy<Value = Properties> {
    prop::collection::btree_map("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,16}", 0..4).prop_map(|map| {
        map.into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect()
    })
}

pub fn arb_event_record() -> impl Strategy<Value = EventRecord> {
    (
        arb_identity(),
        "[a-z_]{1,16}",
        any::<u64>(),
        // Minutes around now, so TTL-sweep tests see both sides of a
        // recent cutoff; None covers timestampless records.
        prop::option::weighted(0.9, -120i64..120),
    )
        .prop_map(|(identity, event_type, seq, offset_minutes)| {
            let mut event = EventRecord::new(identity, event_type, seq);
            event.time = offset_minutes.map(|m| Utc::now() + chrono::Duration::minutes(m));
            event
        })
}

pub fn arb_call_record() -> impl Strategy<Value = CallRecord> {
    prop_oneof![
        3 => arb_event_record().prop_map(CallRecord::Event),
        1 => (arb_identity(), arb_properties())
            .prop_map(|(i, p)| CallRecord::IdentityUpdate(IdentityUpdate::new(i, p))),
    ]
}

// ─── Scripted sender ──────────────────────────────────────────────────────

/// One call the mock sender received.
#[derive(Debug, Clone, PartialEq)]
pub enum SentCall {
    Identify(IdentityUpdate),
    Batch(Vec<EventRecord>),
}

#[derive(Debug, Default)]
struct MockSenderInner {
    script: Mutex<VecDeque<SendOutcome>>,
    calls: Mutex<Vec<SentCall>>,
}

/// A [`RemoteSender`] that replays a script of outcomes and records every
/// call it receives. Clones share state, so tests keep a handle after
/// moving one into the dispatcher.
///
/// When the script runs out, every further send succeeds.
#[derive(Debug, Clone, Default)]
pub struct MockSender {
    inner: Arc<MockSenderInner>,
}

impl MockSender {
    pub fn new() -> Self {
        MockSender::default()
    }

    pub fn with_script(outcomes: impl IntoIterator<Item = SendOutcome>) -> Self {
        let sender = MockSender::new();
        *sender.inner.script.lock().unwrap() = outcomes.into_iter().collect();
        sender
    }

    fn next_outcome(&self) -> SendOutcome {
        self.inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SendOutcome::Success)
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<SentCall> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.lock().unwrap().len()
    }

    /// Event batches received so far, in order.
    pub fn batches(&self) -> Vec<Vec<EventRecord>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SentCall::Batch(batch) => Some(batch),
                SentCall::Identify(_) => None,
            })
            .collect()
    }
}

impl RemoteSender for MockSender {
    async fn send_identify(
        &self,
        call: &IdentityUpdate,
        _cancel: &CancellationToken,
    ) -> SendOutcome {
        self.inner
            .calls
            .lock()
            .unwrap()
            .push(SentCall::Identify(call.clone()));
        self.next_outcome()
    }

    async fn send_batch(&self, batch: &[EventRecord], _cancel: &CancellationToken) -> SendOutcome {
        self.inner
            .calls
            .lock()
            .unwrap()
            .push(SentCall::Batch(batch.to_vec()));
        self.next_outcome()
    }
}

// ─── In-memory sinks ──────────────────────────────────────────────────────

/// A [`PersistenceSink`] over a shared in-memory buffer.
#[derive(Debug)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
    writes: Arc<AtomicUsize>,
    pos: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink {
            buffer: Arc::new(Mutex::new(Vec::new())),
            writes: Arc::new(AtomicUsize::new(0)),
            pos: 0,
        }
    }

    pub fn with_content(content: &[u8]) -> Self {
        let sink = MemorySink::new();
        *sink.buffer.lock().unwrap() = content.to_vec();
        sink
    }

    /// A second sink over the same buffer, simulating a restart against
    /// the same durable target.
    pub fn from_shared(buffer: Arc<Mutex<Vec<u8>>>) -> Self {
        MemorySink {
            buffer,
            writes: Arc::new(AtomicUsize::new(0)),
            pos: 0,
        }
    }

    pub fn shared_buffer(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.buffer)
    }

    pub fn write_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.writes)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        MemorySink::new()
    }
}

impl PersistenceSink for MemorySink {
    fn seek_start(&mut self) -> io::Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn truncate(&mut self) -> io::Result<()> {
        self.buffer.lock().unwrap().truncate(self.pos);
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut buffer = self.buffer.lock().unwrap();
        let end = self.pos + buf.len();
        if buffer.len() < end {
            buffer.resize(end, 0);
        }
        buffer[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let buffer = self.buffer.lock().unwrap();
        let bytes = buffer[self.pos.min(buffer.len())..].to_vec();
        self.pos = buffer.len();
        Ok(bytes)
    }
}

/// A sink whose every operation fails, for degraded-mode tests.
#[derive(Debug)]
pub struct FailingSink;

impl PersistenceSink for FailingSink {
    fn seek_start(&mut self) -> io::Result<()> {
        Err(io::Error::other("sink unavailable"))
    }

    fn truncate(&mut self) -> io::Result<()> {
        Err(io::Error::other("sink unavailable"))
    }

    fn write_all(&mut self, _buf: &[u8]) -> io::Result<()> {
        Err(io::Error::other("sink unavailable"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::other("sink unavailable"))
    }

    fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        Err(io::Error::other("sink unavailable"))
    }
}

// ─── Async helpers ────────────────────────────────────────────────────────

/// Waits until the queue is empty or the deadline passes. Panics on
/// timeout so a stuck loop fails the test instead of hanging it.
pub async fn wait_for_drain(queue: &PendingQueue) {
    let deadline = Duration::from_secs(5);
    let result = tokio::time::timeout(deadline, async {
        while !queue.is_empty() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "queue did not drain within {deadline:?}");
}

/// Waits until `condition` holds or the deadline passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Duration::from_secs(5);
    let result = tokio::time::timeout(deadline, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not met within {deadline:?}");
}

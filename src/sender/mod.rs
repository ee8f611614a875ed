//! Remote sender contract.
//!
//! The wire transport is an external collaborator: something that accepts a
//! single identity-update call or a batch of event calls and returns a
//! classified [`SendOutcome`]. HTTP/JSON encoding, endpoint selection, and
//! compression all live behind this trait; the dispatch loop's entire
//! retry policy is defined purely in terms of the seven-way outcome, so any
//! implementation satisfying the contract is substitutable.
//!
//! # Example (mock for testing)
//!
//! ```ignore
//! struct ScriptedSender {
//!     outcomes: Mutex<VecDeque<SendOutcome>>,
//! }
//!
//! impl RemoteSender for ScriptedSender {
//!     async fn send_identify(&self, _call: &IdentityUpdate, _cancel: &CancellationToken) -> SendOutcome {
//!         self.outcomes.lock().unwrap().pop_front().unwrap_or(SendOutcome::Success)
//!     }
//!
//!     async fn send_batch(&self, _batch: &[EventRecord], _cancel: &CancellationToken) -> SendOutcome {
//!         self.outcomes.lock().unwrap().pop_front().unwrap_or(SendOutcome::Success)
//!     }
//! }
//! ```

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::types::{EventRecord, IdentityUpdate};

/// Classified result of one remote send.
///
/// Classification is the sender's responsibility, informed by
/// transport-specific status codes; the core never inspects the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The server accepted the payload. The batch can be removed.
    Success,

    /// The server rejected the payload as malformed. Retrying the same
    /// data cannot succeed.
    BadData,

    /// The credential was rejected. No send from this service instance can
    /// succeed until the credential is corrected.
    InvalidCredential,

    /// The payload exceeded the server's size limit.
    PayloadTooLarge,

    /// The server asked the client to slow down.
    Throttled,

    /// The server failed transiently (5xx).
    ServerError,

    /// The request never produced a server response (DNS, connect,
    /// timeout).
    NetworkError,
}

impl SendOutcome {
    /// True for outcomes that are retried after a backoff with the queue
    /// left untouched.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            SendOutcome::Throttled | SendOutcome::ServerError | SendOutcome::NetworkError
        )
    }
}

/// Transport that forwards calls to the remote ingestion endpoint.
///
/// Both operations accept a cancellation token so an in-flight send can be
/// abandoned during shutdown. A cancelled send should report
/// [`SendOutcome::NetworkError`]; the dispatch loop observes the token
/// itself before acting on the outcome.
pub trait RemoteSender {
    /// Sends a single identity-update call. Identity updates are never
    /// batched.
    fn send_identify(
        &self,
        call: &IdentityUpdate,
        cancel: &CancellationToken,
    ) -> impl Future<Output = SendOutcome> + Send;

    /// Sends a batch of event calls in queue order.
    fn send_batch(
        &self,
        batch: &[EventRecord],
        cancel: &CancellationToken,
    ) -> impl Future<Output = SendOutcome> + Send;
}

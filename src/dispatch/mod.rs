//! Single-flight background dispatch of the pending queue.
//!
//! At most one dispatch loop runs per service instance, enforced by an
//! atomic compare-and-set. Any append or restore triggers a start attempt;
//! the attempt is a no-op while a loop is already active, because the
//! active loop re-reads the queue each iteration and will pick up new
//! records itself.
//!
//! # Policy
//!
//! Each iteration peeks a same-variant FIFO batch, sends it, and applies
//! the seven-way outcome policy:
//!
//! - `Success`: remove the batch, continue immediately
//! - `BadData`: drop the whole batch (logged), continue immediately
//! - `InvalidCredential`: disable delivery for this instance, stop without
//!   removing anything (the data stays for a future instance)
//! - `PayloadTooLarge`: halve the working batch size (floor 1), or drop a
//!   single record that is itself too large
//! - `Throttled` / `ServerError` / `NetworkError`: keep the queue intact,
//!   back off, retry

pub mod runner;


pub use runner::Dispatcher;

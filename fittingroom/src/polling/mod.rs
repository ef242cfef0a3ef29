//! Waiting on long-running remote operations.
//!
//! [`await_operation`] repeatedly calls a check function until it reports a
//! result, sleeping between checks according to a [`PollPolicy`]. It gives up
//! when the policy's attempt or time limits are reached, or as soon as the
//! supplied cancellation token fires.

mod backoff;
mod operation;

pub use backoff::{BackoffStrategy, DelaySchedule, JitterStrategy, PollPolicy};
pub use operation::{await_operation, PollError, PollState};

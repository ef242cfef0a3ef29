//! The poll loop.

use super::PollPolicy;
use crate::cancellation::CancellationToken;
use std::future::Future;
use std::time::Instant;
use thiserror::Error;

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState<T> {
    /// The operation is still running.
    Pending,
    /// The operation finished with a value.
    Ready(T),
}

/// Why a wait ended without a result.
#[derive(Debug, Error)]
pub enum PollError<E> {
    /// A check returned an error.
    #[error("{0}")]
    Operation(E),

    /// The policy's check limit was reached.
    #[error("Operation still pending after {attempts} checks")]
    AttemptsExhausted {
        /// Number of checks performed.
        attempts: usize,
    },

    /// The policy's deadline passed.
    #[error("Operation timed out after {after_ms}ms")]
    TimedOut {
        /// Elapsed milliseconds.
        after_ms: u64,
    },

    /// The token was cancelled.
    #[error("Operation cancelled: {reason}")]
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },
}

fn cancelled<E>(token: &CancellationToken) -> PollError<E> {
    PollError::Cancelled {
        reason: token
            .reason()
            .unwrap_or_else(|| "cancelled".to_string()),
    }
}

/// Calls `check` until it reports [`PollState::Ready`].
///
/// The first check happens immediately. Between checks the loop sleeps for
/// the next delay of `policy`'s schedule. Cancellation of `token` is observed
/// both while a check is in progress and while sleeping.
pub async fn await_operation<T, E, F, Fut>(
    policy: &PollPolicy,
    token: &CancellationToken,
    mut check: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollState<T>, E>>,
{
    let started = Instant::now();

    let poll_loop = async {
        let mut schedule = policy.schedule();
        let mut attempts = 0usize;
        loop {
            if token.is_cancelled() {
                return Err(cancelled(token));
            }

            attempts += 1;
            let outcome = tokio::select! {
                outcome = check() => outcome,
                () = token.cancelled() => return Err(cancelled(token)),
            };

            match outcome.map_err(PollError::Operation)? {
                PollState::Ready(value) => return Ok(value),
                PollState::Pending => {}
            }

            if policy.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(PollError::AttemptsExhausted { attempts });
            }

            let delay = schedule.next_delay();
            tracing::trace!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Operation pending"
            );
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = token.cancelled() => return Err(cancelled(token)),
            }
        }
    };

    match policy.timeout() {
        Some(limit) => match tokio::time::timeout(limit, poll_loop).await {
            Ok(result) => result,
            Err(_) => Err(PollError::TimedOut {
                after_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            }),
        },
        None => poll_loop.await,
    }
}

//! Cancellation and background job utilities.
//!
//! This module provides:
//! - CancellationToken for cooperative cancellation
//! - JobPool for bounded, individually cancellable background jobs

mod job_pool;
mod token;

pub use job_pool::{JobPool, PoolStats};
pub use token::CancellationToken;

//! Core domain model types.
//!
//! This module contains the generation lifecycle types:
//! - Generation status and the poll-facing status
//! - Generation ids and records
//! - The poll response returned to callers

mod record;
mod status;

pub use record::{GenerationId, GenerationRecord, PollResponse};
pub use status::{GenerationStatus, PollStatus};

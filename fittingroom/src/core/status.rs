//! Generation status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle status of a registered generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Stage 2 has been dispatched and has not finished.
    #[default]
    Processing,
    /// Stage 2 finished and the result is available.
    Done,
    /// Stage 2 failed, timed out or was cancelled.
    Failed,
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl GenerationStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// The status reported by a poll.
///
/// Adds `NotFound` on top of [`GenerationStatus`]: an unknown id is a soft,
/// retryable answer rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    /// Still running.
    Processing,
    /// Finished successfully.
    Done,
    /// Finished unsuccessfully.
    Failed,
    /// No record with this id (not yet visible, stale, or invalid).
    NotFound,
}

impl From<GenerationStatus> for PollStatus {
    fn from(status: GenerationStatus) -> Self {
        match status {
            GenerationStatus::Processing => Self::Processing,
            GenerationStatus::Done => Self::Done,
            GenerationStatus::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}

impl PollStatus {
    /// Returns true if polling can stop.
    ///
    /// `NotFound` is not terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

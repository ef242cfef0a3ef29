//! Generation ids, records and poll responses.

use super::{GenerationStatus, PollStatus};
use crate::errors::RegistryError;
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for a generation, used as the polling token.
///
/// Ids are random UUIDs and carry no relation to where artifacts are stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(String);

impl GenerationId {
    /// Generates a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for GenerationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for GenerationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for GenerationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The tracked state of one generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// The generation id.
    pub id: GenerationId,
    /// Current status.
    pub status: GenerationStatus,
    /// Public URL of the finished artifact. Set iff `status` is `Done`.
    pub result: Option<String>,
    /// Public URL of the stage-1 artifact the job started from.
    pub source: Option<String>,
    /// Failure reason. Only set when `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the record was registered.
    pub created_at: Timestamp,
    /// When the record last changed.
    pub updated_at: Timestamp,
}

impl GenerationRecord {
    /// Creates a record in the `Processing` state.
    #[must_use]
    pub fn processing(id: GenerationId, source: Option<String>) -> Self {
        let now = now_utc();
        Self {
            id,
            status: GenerationStatus::Processing,
            result: None,
            source,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transitions `Processing -> Done`.
    pub fn mark_done(&mut self, result: impl Into<String>) -> Result<(), RegistryError> {
        self.ensure_processing()?;
        self.status = GenerationStatus::Done;
        self.result = Some(result.into());
        self.updated_at = now_utc();
        Ok(())
    }

    /// Transitions `Processing -> Failed`. The result stays empty.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), RegistryError> {
        self.ensure_processing()?;
        self.status = GenerationStatus::Failed;
        self.error = Some(reason.into());
        self.updated_at = now_utc();
        Ok(())
    }

    /// Returns true once the record can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_processing(&self) -> Result<(), RegistryError> {
        if self.status.is_terminal() {
            return Err(RegistryError::AlreadyTerminal {
                id: self.id.to_string(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }
}

/// What a poll returns to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponse {
    /// The status.
    pub status: PollStatus,
    /// Result URL, only present when `status` is `Done`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PollResponse {
    /// The sentinel for an unknown id.
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            status: PollStatus::NotFound,
            url: None,
        }
    }
}

impl From<&GenerationRecord> for PollResponse {
    fn from(record: &GenerationRecord) -> Self {
        let url = match record.status {
            GenerationStatus::Done => record.result.clone(),
            GenerationStatus::Processing | GenerationStatus::Failed => None,
        };
        Self {
            status: record.status.into(),
            url,
        }
    }
}

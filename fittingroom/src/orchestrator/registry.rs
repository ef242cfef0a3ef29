//! Concurrent store of generation records.

use crate::core::{GenerationId, GenerationRecord, GenerationStatus, PollResponse};
use crate::errors::RegistryError;
use crate::utils::timestamps::elapsed_since;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;

/// Record counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryCounts {
    /// Records still processing.
    pub processing: usize,
    /// Records that finished successfully.
    pub done: usize,
    /// Records that failed.
    pub failed: usize,
}

/// Maps generation ids to their records.
///
/// Each record is inserted once as `processing` by the submitting request and
/// moved to a terminal state once by its background job. Reads never block
/// writers of other records.
#[derive(Debug, Default)]
pub struct GenerationRegistry {
    records: DashMap<String, GenerationRecord>,
}

impl GenerationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` as processing.
    ///
    /// Fails with [`RegistryError::Duplicate`] if the id is already present;
    /// the existing record is left untouched.
    pub fn insert_processing(
        &self,
        id: &GenerationId,
        source: Option<String>,
    ) -> Result<(), RegistryError> {
        match self.records.entry(id.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::Duplicate { id: id.to_string() }),
            Entry::Vacant(slot) => {
                slot.insert(GenerationRecord::processing(id.clone(), source));
                Ok(())
            }
        }
    }

    /// Moves a processing record to `done` with `result`.
    pub fn complete(&self, id: &str, result: &str) -> Result<(), RegistryError> {
        self.transition(id, |record| record.mark_done(result))
    }

    /// Moves a processing record to `failed`.
    pub fn fail(&self, id: &str, reason: &str) -> Result<(), RegistryError> {
        self.transition(id, |record| record.mark_failed(reason))
    }

    fn transition(
        &self,
        id: &str,
        apply: impl FnOnce(&mut GenerationRecord) -> Result<(), RegistryError>,
    ) -> Result<(), RegistryError> {
        let mut record = self
            .records
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
        apply(record.value_mut())
    }

    /// Returns a copy of the record for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<GenerationRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    /// Returns the caller-facing status of `id`.
    ///
    /// Unknown ids yield the `not_found` sentinel rather than an error.
    #[must_use]
    pub fn poll(&self, id: &str) -> PollResponse {
        self.records
            .get(id)
            .map_or_else(PollResponse::not_found, |r| PollResponse::from(r.value()))
    }

    /// Returns true if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no records exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Counts records by status.
    #[must_use]
    pub fn counts(&self) -> RegistryCounts {
        let mut counts = RegistryCounts::default();
        for record in &self.records {
            match record.status {
                GenerationStatus::Processing => counts.processing += 1,
                GenerationStatus::Done => counts.done += 1,
                GenerationStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Removes terminal records that have not changed for at least `ttl`.
    ///
    /// Processing records are never removed. Returns the number removed.
    pub fn sweep_terminal(&self, ttl: Duration) -> usize {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let expired = record.is_terminal() && elapsed_since(&record.updated_at) >= ttl;
            if expired {
                removed += 1;
            }
            !expired
        });
        if removed > 0 {
            tracing::debug!(removed, ttl_secs = ttl.as_secs(), "Swept terminal generation records");
        }
        removed
    }
}

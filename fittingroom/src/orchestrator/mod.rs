//! The generation orchestrator.
//!
//! [`GenerationOrchestrator::submit`] runs stage 1 inside the caller's task:
//! garments are layered onto the person photo, the composite is stored, a
//! `processing` record is registered under a fresh id, and the video job is
//! handed to the background [`JobPool`]. The caller gets the composite URL and
//! the id straight away and follows stage 2 through
//! [`poll`](GenerationOrchestrator::poll).

mod compose;
mod job;
#[cfg(test)]
mod orchestrator_tests;
mod registry;
mod request;

pub use compose::compose_layers;
pub use job::video_output_prefix;
pub use registry::{GenerationRegistry, RegistryCounts};
pub use request::{Submission, TryOnPayload, TryOnRequest, GARMENTS_FIELD, PERSON_FIELD};

use crate::cancellation::{JobPool, PoolStats};
use crate::collaborators::{BlobStore, Compositor, StoredBlob, VideoGenerator};
use crate::config::OrchestratorConfig;
use crate::core::{GenerationId, GenerationRecord, PollResponse};
use crate::errors::FittingRoomError;
use crate::events::{self, EventSink, NoOpEventSink};
use crate::observability::SpanTimer;
use crate::utils::{object_key, unix_seconds};
use job::VideoJob;
use std::sync::Arc;
use tracing::{info, instrument};

/// Runs try-on submissions and tracks their background video jobs.
pub struct GenerationOrchestrator {
    compositor: Arc<dyn Compositor>,
    blobs: Arc<dyn BlobStore>,
    video: Arc<dyn VideoGenerator>,
    registry: Arc<GenerationRegistry>,
    events: Arc<dyn EventSink>,
    jobs: JobPool,
    config: OrchestratorConfig,
}

impl GenerationOrchestrator {
    /// Starts building an orchestrator.
    #[must_use]
    pub fn builder() -> GenerationOrchestratorBuilder {
        GenerationOrchestratorBuilder::default()
    }

    /// Runs stage 1 and dispatches stage 2.
    ///
    /// On success the returned id is already registered as `processing`.
    /// On failure nothing is registered.
    #[instrument(skip_all, fields(garments = request.garments().len()))]
    pub async fn submit(&self, request: TryOnRequest) -> Result<Submission, FittingRoomError> {
        if self.jobs.is_shutting_down() {
            return Err(FittingRoomError::ServiceShutdown);
        }

        let timer = SpanTimer::start("compose");
        let composite =
            compose_layers(self.compositor.as_ref(), request.person(), request.garments()).await?;
        let compose_ms = timer.finish();

        let key = object_key(
            &self.config.composite_prefix,
            "vto",
            unix_seconds(),
            &composite.bytes,
            composite.extension(),
        );
        let content_type = composite.mime_type.clone();
        let artifact = self.blobs.put(&key, composite.bytes, &content_type).await?;

        let generation_id = GenerationId::new();
        self.registry
            .insert_processing(&generation_id, Some(artifact.public_url.clone()))?;

        info!(
            generation_id = %generation_id,
            composite = %artifact.public_url,
            compose_ms,
            "Try-on composite stored"
        );
        self.events.try_emit(
            events::GENERATION_SUBMITTED,
            Some(serde_json::json!({
                "generationId": generation_id,
                "imageUrl": artifact.public_url,
                "garments": request.garments().len(),
            })),
        );

        self.dispatch(&generation_id, &artifact);

        Ok(Submission {
            image_url: artifact.public_url.clone(),
            generation_id,
            artifact,
        })
    }

    fn dispatch(&self, id: &GenerationId, artifact: &StoredBlob) {
        let job = VideoJob::new(
            id.clone(),
            artifact.clone(),
            &self.config,
            self.registry.clone(),
            self.blobs.clone(),
            self.video.clone(),
            self.events.clone(),
        );
        self.jobs.spawn(id.to_string(), move |token| job.run(token));

        self.events.try_emit(
            events::GENERATION_DISPATCHED,
            Some(serde_json::json!({
                "generationId": id,
                "inFlight": self.jobs.in_flight(),
            })),
        );
    }

    /// Returns the status of a generation without waiting.
    #[must_use]
    pub fn poll(&self, id: &str) -> PollResponse {
        self.registry.poll(id)
    }

    /// Returns the full record of a generation.
    #[must_use]
    pub fn record(&self, id: &str) -> Option<GenerationRecord> {
        self.registry.get(id)
    }

    /// Asks a running generation to stop.
    ///
    /// The job records its own failure once it notices. Returns false if no
    /// job with this id is in flight.
    pub fn cancel(&self, id: &str) -> bool {
        let signalled = self.jobs.cancel(id, "cancelled by caller");
        if signalled {
            info!(generation_id = id, "Generation cancel requested");
            self.events.try_emit(
                events::GENERATION_CANCEL_REQUESTED,
                Some(serde_json::json!({ "generationId": id })),
            );
        }
        signalled
    }

    /// Removes terminal records older than the configured retention.
    ///
    /// Does nothing when retention is disabled.
    pub fn sweep_expired(&self) -> usize {
        self.config
            .record_ttl()
            .map_or(0, |ttl| self.registry.sweep_terminal(ttl))
    }

    /// Stops accepting submissions and cancels every background job.
    ///
    /// Waits up to the configured grace period for cancelled jobs to record
    /// their failure and returns how many were still running afterwards.
    pub async fn shutdown(&self) -> usize {
        info!(in_flight = self.jobs.in_flight(), "Shutting down generation jobs");
        self.jobs
            .shutdown("service shutting down", self.config.shutdown_grace())
            .await
    }

    /// Returns true once shutdown has started.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.jobs.is_shutting_down()
    }

    /// Returns the number of queued or running video jobs.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.jobs.in_flight()
    }

    /// Returns job pool occupancy.
    #[must_use]
    pub fn job_stats(&self) -> PoolStats {
        self.jobs.stats()
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<GenerationRegistry> {
        &self.registry
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("records", &self.registry.len())
            .field("jobs", &self.jobs)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`GenerationOrchestrator`].
#[derive(Default)]
pub struct GenerationOrchestratorBuilder {
    compositor: Option<Arc<dyn Compositor>>,
    blobs: Option<Arc<dyn BlobStore>>,
    video: Option<Arc<dyn VideoGenerator>>,
    registry: Option<Arc<GenerationRegistry>>,
    events: Option<Arc<dyn EventSink>>,
    config: OrchestratorConfig,
}

impl GenerationOrchestratorBuilder {
    /// Sets the compositing collaborator.
    #[must_use]
    pub fn compositor(mut self, compositor: Arc<dyn Compositor>) -> Self {
        self.compositor = Some(compositor);
        self
    }

    /// Sets the blob store.
    #[must_use]
    pub fn blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Sets the video collaborator.
    #[must_use]
    pub fn video_generator(mut self, video: Arc<dyn VideoGenerator>) -> Self {
        self.video = Some(video);
        self
    }

    /// Shares an existing registry. A new one is created otherwise.
    #[must_use]
    pub fn registry(mut self, registry: Arc<GenerationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the event sink. Events are discarded otherwise.
    #[must_use]
    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the orchestrator.
    ///
    /// Fails if a collaborator is missing.
    pub fn build(self) -> Result<GenerationOrchestrator, FittingRoomError> {
        let compositor = self.compositor.ok_or_else(|| missing("compositor"))?;
        let blobs = self.blobs.ok_or_else(|| missing("blob store"))?;
        let video = self.video.ok_or_else(|| missing("video generator"))?;

        Ok(GenerationOrchestrator {
            compositor,
            blobs,
            video,
            registry: self.registry.unwrap_or_default(),
            events: self.events.unwrap_or_else(|| Arc::new(NoOpEventSink)),
            jobs: JobPool::new(self.config.max_concurrent_jobs),
            config: self.config,
        })
    }
}

fn missing(collaborator: &str) -> FittingRoomError {
    FittingRoomError::Internal(format!("{collaborator} is not configured"))
}

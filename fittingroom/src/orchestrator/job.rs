//! Stage 2: the background video job.

use super::GenerationRegistry;
use crate::cancellation::CancellationToken;
use crate::collaborators::{BlobStore, OperationState, StoredBlob, VideoGenerator, VideoRequest};
use crate::config::{OrchestratorConfig, VideoSettings};
use crate::core::GenerationId;
use crate::errors::{GenerationError, MediaError};
use crate::events::{self, EventSink};
use crate::polling::{await_operation, PollPolicy, PollState};
use crate::utils::naming::key_stem;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Returns the store prefix the video for `artifact` is written under.
#[must_use]
pub fn video_output_prefix(video_prefix: &str, artifact_key: &str, id: &GenerationId) -> String {
    let video_prefix = video_prefix.trim_matches('/');
    let stem = key_stem(artifact_key);
    if video_prefix.is_empty() {
        format!("{stem}/{id}/")
    } else {
        format!("{video_prefix}/{stem}/{id}/")
    }
}

/// Everything a video job needs, owned so it can run detached.
pub(crate) struct VideoJob {
    pub(crate) id: GenerationId,
    pub(crate) artifact: StoredBlob,
    pub(crate) registry: Arc<GenerationRegistry>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) video: Arc<dyn VideoGenerator>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) polling: PollPolicy,
    pub(crate) settings: VideoSettings,
    pub(crate) video_prefix: String,
    pub(crate) timeout: Duration,
}

impl VideoJob {
    pub(crate) fn new(
        id: GenerationId,
        artifact: StoredBlob,
        config: &OrchestratorConfig,
        registry: Arc<GenerationRegistry>,
        blobs: Arc<dyn BlobStore>,
        video: Arc<dyn VideoGenerator>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            id,
            artifact,
            registry,
            blobs,
            video,
            events,
            polling: config.polling.clone(),
            settings: config.video.clone(),
            video_prefix: config.video_prefix.clone(),
            timeout: config.stage2_timeout(),
        }
    }

    /// Runs the job to completion and records the outcome.
    ///
    /// Never returns an error: every failure ends up as a `failed` record.
    pub(crate) async fn run(self, token: Arc<CancellationToken>) {
        let started = Instant::now();
        let work = AssertUnwindSafe(self.generate(&token)).catch_unwind();
        let outcome = match tokio::time::timeout(self.timeout, work).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(panic)) => Err(GenerationError::Internal(format!(
                "video job panicked: {}",
                panic_message(panic.as_ref())
            ))),
            Err(_) => Err(GenerationError::TimedOut {
                after_ms: elapsed_ms(started),
            }),
        };
        let duration_ms = elapsed_ms(started);

        match outcome {
            Ok(video) => {
                if let Err(err) = self.registry.complete(self.id.as_str(), &video.public_url) {
                    warn!(generation_id = %self.id, error = %err, "Could not record finished video");
                    return;
                }
                info!(
                    generation_id = %self.id,
                    video = %video.public_url,
                    duration_ms,
                    "Video generation completed"
                );
                self.events.try_emit(
                    events::GENERATION_COMPLETED,
                    Some(serde_json::json!({
                        "generationId": self.id,
                        "url": video.public_url,
                        "durationMs": duration_ms,
                    })),
                );
            }
            Err(err) => {
                warn!(
                    generation_id = %self.id,
                    error = %err,
                    kind = err.kind(),
                    duration_ms,
                    "Video generation failed"
                );
                if let Err(registry_err) = self.registry.fail(self.id.as_str(), &err.to_string()) {
                    warn!(generation_id = %self.id, error = %registry_err, "Could not record failure");
                    return;
                }
                self.events.try_emit(
                    events::GENERATION_FAILED,
                    Some(serde_json::json!({
                        "generationId": self.id,
                        "error": err.to_string(),
                        "kind": err.kind(),
                        "durationMs": duration_ms,
                    })),
                );
            }
        }
    }

    async fn generate(&self, token: &CancellationToken) -> Result<StoredBlob, GenerationError> {
        if token.is_cancelled() {
            return Err(cancelled(token));
        }

        let output_prefix = video_output_prefix(&self.video_prefix, &self.artifact.key, &self.id);
        let request = VideoRequest {
            input_uri: self.artifact.uri.clone(),
            input_mime_type: self.artifact.content_type.clone(),
            output_uri: self.blobs.uri_for(&output_prefix),
            output_prefix: output_prefix.clone(),
            prompt: self.settings.prompt.clone(),
            aspect_ratio: self.settings.aspect_ratio.clone(),
            generate_audio: self.settings.generate_audio,
        };

        let handle = tokio::select! {
            started = self.video.start(&request) => started?,
            () = token.cancelled() => return Err(cancelled(token)),
        };
        tracing::debug!(generation_id = %self.id, operation = %handle, "Video operation started");

        let video = &*self.video;
        let handle = &handle;
        await_operation(&self.polling, token, || async move {
            video.poll(handle).await.and_then(|state| match state {
                OperationState::Running => Ok(PollState::Pending),
                OperationState::Succeeded => Ok(PollState::Ready(())),
                OperationState::Failed { code, message } => {
                    Err(MediaError::OperationFailed { code, message })
                }
            })
        })
        .await?;

        let blobs = self.blobs.list(&output_prefix).await?;
        blobs
            .into_iter()
            .find(|blob| blob.has_extension("mp4"))
            .ok_or(GenerationError::ArtifactMissing {
                prefix: output_prefix,
            })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn cancelled(token: &CancellationToken) -> GenerationError {
    GenerationError::Cancelled {
        reason: token.reason().unwrap_or_else(|| "cancelled".to_string()),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

//! Scriptable collaborator doubles.

use crate::assets::{ImageRef, InlineImage};
use crate::collaborators::{
    BlobStore, Compositor, ImageGenerator, OperationHandle, OperationState, PromptRewriter,
    VideoGenerator, VideoRequest,
};
use crate::errors::{CompositionError, DesignError, MediaError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Compositor that records its calls and returns a distinct image per call.
#[derive(Debug, Default)]
pub struct MockCompositor {
    calls: Mutex<Vec<(ImageRef, ImageRef)>>,
    fail_at: Option<usize>,
    delay: Duration,
}

impl MockCompositor {
    /// Creates a compositor that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the call with the given zero-based index.
    #[must_use]
    pub fn failing_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    /// Sleeps for `delay` in every call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the `(person, garment)` pairs seen so far.
    #[must_use]
    pub fn calls(&self) -> Vec<(ImageRef, ImageRef)> {
        self.calls.lock().clone()
    }

    /// Returns the image produced by call `call`.
    #[must_use]
    pub fn output_of(&self, call: usize) -> InlineImage {
        InlineImage::png(format!("composite-{call}").into_bytes())
    }
}

#[async_trait]
impl Compositor for MockCompositor {
    async fn compose(&self, person: &ImageRef, garment: &ImageRef) -> Result<InlineImage, CompositionError> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push((person.clone(), garment.clone()));
            calls.len() - 1
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_at == Some(call) {
            return Err(CompositionError::new("garment could not be applied"));
        }
        Ok(self.output_of(call))
    }
}

/// Video generator backed by a blob store.
///
/// Operations report `Running` for a configurable number of checks, then
/// write `<output_prefix>sample_0.mp4` to the store and succeed. While the
/// generator is held every check reports `Running`.
pub struct MockVideoGenerator {
    blobs: Arc<dyn BlobStore>,
    pending_checks: usize,
    held: AtomicBool,
    start_error: Option<String>,
    operation_error: Option<String>,
    write_artifact: bool,
    requests: Mutex<Vec<VideoRequest>>,
    operations: Mutex<HashMap<String, (String, usize)>>,
    started: AtomicUsize,
}

impl MockVideoGenerator {
    /// Creates a generator that succeeds on the first check.
    #[must_use]
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            pending_checks: 0,
            held: AtomicBool::new(false),
            start_error: None,
            operation_error: None,
            write_artifact: true,
            requests: Mutex::new(Vec::new()),
            operations: Mutex::new(HashMap::new()),
            started: AtomicUsize::new(0),
        }
    }

    /// Reports `Running` for the first `checks` checks of each operation.
    #[must_use]
    pub fn with_pending_checks(mut self, checks: usize) -> Self {
        self.pending_checks = checks;
        self
    }

    /// Keeps every operation running until [`release`](Self::release).
    #[must_use]
    pub fn held(self) -> Self {
        self.held.store(true, Ordering::SeqCst);
        self
    }

    /// Lets held operations finish.
    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    /// Rejects every `start` call.
    #[must_use]
    pub fn failing_start(mut self, message: impl Into<String>) -> Self {
        self.start_error = Some(message.into());
        self
    }

    /// Finishes every operation with an error.
    #[must_use]
    pub fn failing_operation(mut self, message: impl Into<String>) -> Self {
        self.operation_error = Some(message.into());
        self
    }

    /// Succeeds without writing a video.
    #[must_use]
    pub fn without_artifact(mut self) -> Self {
        self.write_artifact = false;
        self
    }

    /// Returns the requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<VideoRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of started operations.
    #[must_use]
    pub fn start_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MockVideoGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockVideoGenerator")
            .field("pending_checks", &self.pending_checks)
            .field("held", &self.held.load(Ordering::SeqCst))
            .field("started", &self.start_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VideoGenerator for MockVideoGenerator {
    async fn start(&self, request: &VideoRequest) -> Result<OperationHandle, MediaError> {
        if let Some(message) = &self.start_error {
            return Err(MediaError::Start(message.clone()));
        }
        let n = self.started.fetch_add(1, Ordering::SeqCst);
        let name = format!("operations/mock-{n}");
        self.requests.lock().push(request.clone());
        self.operations
            .lock()
            .insert(name.clone(), (request.output_prefix.clone(), 0));
        Ok(OperationHandle::new(name))
    }

    async fn poll(&self, handle: &OperationHandle) -> Result<OperationState, MediaError> {
        let (prefix, checks) = {
            let mut operations = self.operations.lock();
            let entry = operations
                .get_mut(handle.name())
                .ok_or_else(|| MediaError::Poll(format!("unknown operation {handle}")))?;
            entry.1 += 1;
            (entry.0.clone(), entry.1)
        };

        if self.held.load(Ordering::SeqCst) || checks <= self.pending_checks {
            return Ok(OperationState::Running);
        }
        if let Some(message) = &self.operation_error {
            return Ok(OperationState::Failed {
                code: Some(13),
                message: message.clone(),
            });
        }
        if self.write_artifact {
            self.blobs
                .put(&format!("{prefix}sample_0.mp4"), b"mp4".to_vec(), "video/mp4")
                .await
                .map_err(|err| MediaError::Poll(err.to_string()))?;
        }
        Ok(OperationState::Succeeded)
    }
}

/// Prompt rewriter returning a fixed reply.
#[derive(Debug)]
pub struct MockPromptRewriter {
    reply: Result<String, String>,
    instructions: Mutex<Vec<String>>,
}

impl MockPromptRewriter {
    /// Creates a rewriter that answers `reply`.
    #[must_use]
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            instructions: Mutex::new(Vec::new()),
        }
    }

    /// Creates a rewriter that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            instructions: Mutex::new(Vec::new()),
        }
    }

    /// Returns the instructions received so far.
    #[must_use]
    pub fn instructions(&self) -> Vec<String> {
        self.instructions.lock().clone()
    }
}

#[async_trait]
impl PromptRewriter for MockPromptRewriter {
    async fn rewrite(&self, instruction: &str) -> Result<String, DesignError> {
        self.instructions.lock().push(instruction.to_string());
        self.reply.clone().map_err(DesignError::Rewrite)
    }
}

/// Image generator that renders the prompt bytes as the image.
#[derive(Debug, Default)]
pub struct MockImageGenerator {
    filtered: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockImageGenerator {
    /// Creates a generator that always returns an image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns no image, as a safety filter would.
    #[must_use]
    pub fn filtered() -> Self {
        Self {
            filtered: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Returns the prompts received so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<InlineImage, DesignError> {
        self.prompts.lock().push(prompt.to_string());
        if self.filtered {
            return Err(DesignError::NoImage);
        }
        Ok(InlineImage::png(prompt.as_bytes().to_vec()))
    }
}

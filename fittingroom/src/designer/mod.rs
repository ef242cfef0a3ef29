//! The apparel designer: text description in, garment image out.
//!
//! A shopper's loose description is first rewritten by a text model into a
//! studio-photography prompt for a single garment, then rendered by an image
//! model. The image is stored and its public URL returned together with the
//! rewritten prompt. Nothing here touches the generation registry.

mod prompt;

pub use prompt::{build_rewrite_instruction, clean_rewritten_prompt};

use crate::collaborators::{BlobStore, ImageGenerator, PromptRewriter};
use crate::config::DesignerConfig;
use crate::errors::{DesignError, FittingRoomError, InputError};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::utils::{object_key, unix_seconds};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Field name of the prompt in requests.
pub const PROMPT_FIELD: &str = "prompt";

/// Result of an inspiration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspireResult {
    /// Public URL of the generated image.
    pub image_url: String,
    /// The prompt the image was generated from.
    pub rewritten_prompt: String,
}

/// Generates garment images from shopper descriptions.
pub struct ApparelDesigner {
    rewriter: Arc<dyn PromptRewriter>,
    images: Arc<dyn ImageGenerator>,
    blobs: Arc<dyn BlobStore>,
    events: Arc<dyn EventSink>,
    config: DesignerConfig,
}

impl ApparelDesigner {
    /// Creates a designer with the default configuration.
    #[must_use]
    pub fn new(
        rewriter: Arc<dyn PromptRewriter>,
        images: Arc<dyn ImageGenerator>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            rewriter,
            images,
            blobs,
            events: Arc::new(NoOpEventSink),
            config: DesignerConfig::default(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: DesignerConfig) -> Self {
        self.config = config;
        self
    }

    /// Rewrites `prompt`, generates one image and stores it.
    #[instrument(skip_all)]
    pub async fn inspire(&self, prompt: &str) -> Result<InspireResult, FittingRoomError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(InputError::missing(PROMPT_FIELD).into());
        }

        let reply = self
            .rewriter
            .rewrite(&build_rewrite_instruction(prompt))
            .await?;
        let rewritten_prompt = clean_rewritten_prompt(&reply);
        if rewritten_prompt.is_empty() {
            return Err(DesignError::Rewrite("rewriter returned an empty prompt".to_string()).into());
        }

        let image = self.images.generate(&rewritten_prompt).await?;
        if image.is_empty() {
            return Err(DesignError::NoImage.into());
        }

        let key = object_key(
            &self.config.inspire_prefix,
            "imagen",
            unix_seconds(),
            &image.bytes,
            image.extension(),
        );
        let content_type = image.mime_type.clone();
        let stored = self.blobs.put(&key, image.bytes, &content_type).await?;

        info!(image = %stored.public_url, "Inspiration image stored");
        self.events.try_emit(
            events::INSPIRE_COMPLETED,
            Some(serde_json::json!({
                "imageUrl": stored.public_url,
                "rewrittenPrompt": rewritten_prompt,
            })),
        );

        Ok(InspireResult {
            image_url: stored.public_url,
            rewritten_prompt,
        })
    }
}

impl std::fmt::Debug for ApparelDesigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApparelDesigner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

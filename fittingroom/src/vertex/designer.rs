//! Gemini prompt rewriting and Imagen text-to-image generation.

use super::try_on::first_image;
use super::VertexClient;
use crate::assets::InlineImage;
use crate::collaborators::{ImageGenerator, PromptRewriter};
use crate::errors::DesignError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Text model used to rewrite prompts.
pub const REWRITE_MODEL: &str = "gemini-2.5-pro";

/// Image model used by the designer.
pub const IMAGEN_MODEL: &str = "imagen-4.0-fast-generate-001";

/// [`PromptRewriter`] backed by Gemini `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiRewriter {
    client: VertexClient,
}

impl GeminiRewriter {
    /// Creates a rewriter.
    #[must_use]
    pub fn new(client: VertexClient) -> Self {
        Self { client }
    }
}

/// Joins the text parts of the first candidate.
pub(crate) fn candidate_text(body: &Value) -> Option<String> {
    let parts = body.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    Some(text)
}

#[async_trait]
impl PromptRewriter for GeminiRewriter {
    async fn rewrite(&self, instruction: &str) -> Result<String, DesignError> {
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": instruction }] }],
        });
        let body = self
            .client
            .call_model(REWRITE_MODEL, "generateContent", &payload)
            .await
            .map_err(|e| DesignError::Rewrite(e.to_string()))?;

        candidate_text(&body).ok_or_else(|| DesignError::Rewrite("response has no candidates".to_string()))
    }
}

/// [`ImageGenerator`] backed by Imagen `predict`.
#[derive(Debug, Clone)]
pub struct ImagenGenerator {
    client: VertexClient,
    aspect_ratio: String,
}

impl ImagenGenerator {
    /// Creates a generator producing square images.
    #[must_use]
    pub fn new(client: VertexClient) -> Self {
        Self {
            client,
            aspect_ratio: "1:1".to_string(),
        }
    }

    /// Sets the output aspect ratio.
    #[must_use]
    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = ratio.into();
        self
    }
}

#[async_trait]
impl ImageGenerator for ImagenGenerator {
    async fn generate(&self, prompt: &str) -> Result<InlineImage, DesignError> {
        let payload = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": self.aspect_ratio,
                "safetySetting": "block_medium_and_above",
                "personGeneration": "allow_adult",
            },
        });
        let body = self
            .client
            .call_model(IMAGEN_MODEL, "predict", &payload)
            .await
            .map_err(|e| DesignError::ImageGeneration(e.to_string()))?;

        first_image(&body)
            .map_err(DesignError::ImageGeneration)?
            .ok_or(DesignError::NoImage)
    }
}

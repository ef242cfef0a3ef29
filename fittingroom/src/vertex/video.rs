//! Image-to-video generation through Veo long-running predictions.

use super::VertexClient;
use crate::collaborators::{OperationHandle, OperationState, VideoGenerator, VideoRequest};
use crate::errors::MediaError;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Model used for video generation.
pub const VIDEO_MODEL: &str = "veo-2.0-generate-001";

/// [`VideoGenerator`] backed by Veo on Vertex AI.
#[derive(Debug, Clone)]
pub struct VertexVideo {
    client: VertexClient,
    model: String,
}

impl VertexVideo {
    /// Creates a generator using [`VIDEO_MODEL`].
    #[must_use]
    pub fn new(client: VertexClient) -> Self {
        Self {
            client,
            model: VIDEO_MODEL.to_string(),
        }
    }

    /// Uses a different Veo model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

pub(crate) fn start_payload(request: &VideoRequest) -> Value {
    json!({
        "instances": [{
            "prompt": request.prompt,
            "image": {
                "gcsUri": request.input_uri,
                "mimeType": request.input_mime_type,
            },
        }],
        "parameters": {
            "aspectRatio": request.aspect_ratio,
            "sampleCount": 1,
            "generateAudio": request.generate_audio,
            "storageUri": request.output_uri,
        },
    })
}

pub(crate) fn parse_operation(body: &Value) -> Result<OperationState, MediaError> {
    if !body.get("done").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(OperationState::Running);
    }
    match body.get("error") {
        Some(error) => Ok(OperationState::Failed {
            code: error.get("code").and_then(Value::as_i64),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        }),
        None => Ok(OperationState::Succeeded),
    }
}

#[async_trait]
impl VideoGenerator for VertexVideo {
    async fn start(&self, request: &VideoRequest) -> Result<OperationHandle, MediaError> {
        let body = self
            .client
            .call_model(&self.model, "predictLongRunning", &start_payload(request))
            .await
            .map_err(|e| MediaError::Start(e.to_string()))?;

        body.get("name")
            .and_then(Value::as_str)
            .map(OperationHandle::new)
            .ok_or_else(|| MediaError::InvalidResponse("operation has no name".to_string()))
    }

    async fn poll(&self, handle: &OperationHandle) -> Result<OperationState, MediaError> {
        let body = self
            .client
            .call_model(
                &self.model,
                "fetchPredictOperation",
                &json!({ "operationName": handle.name() }),
            )
            .await
            .map_err(|e| MediaError::Poll(e.to_string()))?;
        parse_operation(&body)
    }
}

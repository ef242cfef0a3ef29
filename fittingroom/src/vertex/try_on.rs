//! Virtual try-on through the Vertex AI `virtual-try-on` model.

use super::VertexClient;
use crate::assets::{ImageRef, InlineImage};
use crate::collaborators::Compositor;
use crate::errors::CompositionError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

/// Model used for try-on.
pub const TRY_ON_MODEL: &str = "virtual-try-on-preview-08-04";

const BASE_STEPS: u32 = 32;

/// [`Compositor`] backed by Vertex AI virtual try-on.
#[derive(Debug, Clone)]
pub struct VertexTryOn {
    client: VertexClient,
    base_steps: u32,
}

impl VertexTryOn {
    /// Creates a compositor.
    #[must_use]
    pub fn new(client: VertexClient) -> Self {
        Self {
            client,
            base_steps: BASE_STEPS,
        }
    }

    /// Sets the number of diffusion steps.
    #[must_use]
    pub fn with_base_steps(mut self, steps: u32) -> Self {
        self.base_steps = steps;
        self
    }

    fn build_payload(&self, person: Value, garment: Value) -> Value {
        json!({
            "instances": [{
                "personImage": { "image": person },
                "productImages": [{ "image": garment }],
            }],
            "parameters": {
                "baseSteps": self.base_steps,
                "sampleCount": 1,
                "safetySetting": "block_low_and_above",
                "personGeneration": "allow_adult",
            },
        })
    }
}

/// Encodes an image reference the way Vertex AI expects it.
pub(crate) async fn image_value(image: &ImageRef) -> Result<Value, std::io::Error> {
    Ok(match image {
        ImageRef::Gcs(uri) => json!({ "gcsUri": uri.to_string() }),
        ImageRef::Inline(inline) => json!({ "bytesBase64Encoded": STANDARD.encode(&inline.bytes) }),
        ImageRef::Local(path) => {
            let bytes = tokio::fs::read(path).await?;
            json!({ "bytesBase64Encoded": STANDARD.encode(bytes) })
        }
    })
}

/// Decodes the first prediction of an image model reply.
pub(crate) fn first_image(body: &Value) -> Result<Option<InlineImage>, String> {
    let Some(prediction) = body
        .get("predictions")
        .and_then(Value::as_array)
        .and_then(|p| p.first())
    else {
        return Ok(None);
    };

    let encoded = prediction
        .get("bytesBase64Encoded")
        .and_then(Value::as_str)
        .ok_or_else(|| "prediction has no image bytes".to_string())?;
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| format!("invalid base64 image: {e}"))?;
    let mime_type = prediction
        .get("mimeType")
        .and_then(Value::as_str)
        .unwrap_or("image/png")
        .to_string();

    Ok(Some(InlineImage { bytes, mime_type }))
}

#[async_trait]
impl Compositor for VertexTryOn {
    async fn compose(&self, person: &ImageRef, garment: &ImageRef) -> Result<InlineImage, CompositionError> {
        let person_value = image_value(person)
            .await
            .map_err(|e| CompositionError::new(format!("cannot read {}: {e}", person.describe())))?;
        let garment_value = image_value(garment)
            .await
            .map_err(|e| CompositionError::new(format!("cannot read {}: {e}", garment.describe())))?;

        let payload = self.build_payload(person_value, garment_value);
        let body = self
            .client
            .call_model(TRY_ON_MODEL, "predict", &payload)
            .await
            .map_err(|e| CompositionError::new(e.to_string()))?;

        first_image(&body)
            .map_err(CompositionError::new)?
            .ok_or_else(|| CompositionError::new("no image returned (possibly filtered by safety settings)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::GcsUri;
    use crate::vertex::VertexConfig;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_image_value_variants() {
        let gcs = image_value(&ImageRef::Gcs(GcsUri::new("b", "p.png"))).await.unwrap();
        assert_eq!(gcs, json!({ "gcsUri": "gs://b/p.png" }));

        let inline = image_value(&ImageRef::Inline(InlineImage::png(b"abc".to_vec())))
            .await
            .unwrap();
        assert_eq!(inline, json!({ "bytesBase64Encoded": "YWJj" }));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.png");
        std::fs::write(&path, b"abc").unwrap();
        let local = image_value(&ImageRef::Local(path)).await.unwrap();
        assert_eq!(local, json!({ "bytesBase64Encoded": "YWJj" }));
    }

    #[test]
    fn test_first_image() {
        let body = json!({ "predictions": [{ "bytesBase64Encoded": "YWJj", "mimeType": "image/jpeg" }] });
        let image = first_image(&body).unwrap().unwrap();
        assert_eq!(image.bytes, b"abc");
        assert_eq!(image.mime_type, "image/jpeg");

        assert_eq!(first_image(&json!({ "predictions": [] })).unwrap(), None);
        assert_eq!(first_image(&json!({})).unwrap(), None);
        assert!(first_image(&json!({ "predictions": [{}] })).is_err());
    }

    #[tokio::test]
    async fn test_compose_round_trip() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                "/v1/projects/shop/locations/us-central1/publishers/google/models/virtual-try-on-preview-08-04:predict",
            )
            .match_header("authorization", "Bearer token")
            .match_body(Matcher::PartialJson(json!({
                "parameters": { "baseSteps": 32, "sampleCount": 1 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"predictions": [{"bytesBase64Encoded": "YWJj", "mimeType": "image/png"}]}"#)
            .create_async()
            .await;

        let client = VertexClient::new(VertexConfig::new("shop", "token").with_api_endpoint(server.url()));
        let try_on = VertexTryOn::new(client);
        let output = try_on
            .compose(
                &ImageRef::Gcs(GcsUri::new("b", "p.png")),
                &ImageRef::Gcs(GcsUri::new("b", "shirt.png")),
            )
            .await
            .unwrap();

        assert_eq!(output.bytes, b"abc");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_compose_api_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error": {"code": 400, "message": "Image is too small"}}"#)
            .create_async()
            .await;

        let client = VertexClient::new(VertexConfig::new("shop", "token").with_api_endpoint(server.url()));
        let err = VertexTryOn::new(client)
            .compose(
                &ImageRef::Gcs(GcsUri::new("b", "p.png")),
                &ImageRef::Gcs(GcsUri::new("b", "shirt.png")),
            )
            .await
            .unwrap_err();

        assert!(err.message.contains("Image is too small"));
    }
}

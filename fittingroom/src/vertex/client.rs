//! Shared HTTP plumbing for the Vertex AI clients.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

fn default_region() -> String {
    "us-central1".to_string()
}

fn default_storage_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

/// Connection settings for Vertex AI and Cloud Storage.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexConfig {
    /// Google Cloud project id.
    pub project_id: String,
    /// Vertex AI region.
    #[serde(default = "default_region")]
    pub region: String,
    /// OAuth2 access token sent as a bearer token.
    pub access_token: String,
    /// Overrides `https://<region>-aiplatform.googleapis.com`.
    #[serde(default)]
    pub api_endpoint: Option<String>,
    /// Cloud Storage JSON API endpoint.
    #[serde(default = "default_storage_endpoint")]
    pub storage_endpoint: String,
}

impl VertexConfig {
    /// Creates a configuration for `project_id` in `us-central1`.
    #[must_use]
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            region: default_region(),
            access_token: access_token.into(),
            api_endpoint: None,
            storage_endpoint: default_storage_endpoint(),
        }
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Overrides the Vertex AI endpoint.
    #[must_use]
    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(endpoint.into());
        self
    }

    /// Overrides the Cloud Storage endpoint.
    #[must_use]
    pub fn with_storage_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.storage_endpoint = endpoint.into();
        self
    }

    /// Returns the URL of `method` on a Google publisher model.
    #[must_use]
    pub fn model_url(&self, model: &str, method: &str) -> String {
        let base = self
            .api_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", self.region));
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{model}:{method}",
            base.trim_end_matches('/'),
            self.project_id,
            self.region
        )
    }
}

impl fmt::Debug for VertexConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexConfig")
            .field("project_id", &self.project_id)
            .field("region", &self.region)
            .field("access_token", &"<redacted>")
            .field("api_endpoint", &self.api_endpoint)
            .field("storage_endpoint", &self.storage_endpoint)
            .finish()
    }
}

/// Transport-level failures of a Google API call.
#[derive(Debug, Clone, Error)]
pub enum VertexError {
    /// The request could not be sent or the body could not be read.
    #[error("Network error: {0}")]
    Network(String),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the body, or the raw body.
        message: String,
    },

    /// The body was not the expected JSON.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// The configuration cannot be turned into a request.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A `reqwest` client bound to one [`VertexConfig`].
#[derive(Debug, Clone)]
pub struct VertexClient {
    http: reqwest::Client,
    config: VertexConfig,
}

impl VertexClient {
    /// Creates a client.
    #[must_use]
    pub fn new(config: VertexConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &VertexConfig {
        &self.config
    }

    /// Returns the underlying HTTP client.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Builds the authorisation headers.
    pub fn auth_headers(&self) -> Result<HeaderMap, VertexError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", self.config.access_token))
            .map_err(|e| VertexError::Config(e.to_string()))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// POSTs `payload` to a model method and returns the decoded JSON reply.
    pub async fn call_model(&self, model: &str, method: &str, payload: &Value) -> Result<Value, VertexError> {
        let url = self.config.model_url(model, method);
        tracing::debug!(model, method, "Calling Vertex AI");
        let response = self
            .http
            .post(url)
            .headers(self.auth_headers()?)
            .json(payload)
            .send()
            .await
            .map_err(|e| VertexError::Network(e.to_string()))?;
        read_json(response).await
    }
}

/// Reads a JSON body, mapping non-success statuses to [`VertexError::Api`].
pub(crate) async fn read_json(response: reqwest::Response) -> Result<Value, VertexError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| VertexError::Network(e.to_string()))?;

    if !status.is_success() {
        return Err(VertexError::Api {
            status: status.as_u16(),
            message: error_message(&text),
        });
    }
    serde_json::from_str(&text).map_err(|e| VertexError::Decode(e.to_string()))
}

/// Extracts `error.message` from a Google error body, or returns the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_url_default_endpoint() {
        let config = VertexConfig::new("shop", "t").with_region("europe-west4");
        assert_eq!(
            config.model_url("veo-2.0-generate-001", "predictLongRunning"),
            "https://europe-west4-aiplatform.googleapis.com/v1/projects/shop/locations/europe-west4/publishers/google/models/veo-2.0-generate-001:predictLongRunning"
        );
    }

    #[test]
    fn test_model_url_override() {
        let config = VertexConfig::new("shop", "t").with_api_endpoint("http://127.0.0.1:9000/");
        assert!(config
            .model_url("m", "predict")
            .starts_with("http://127.0.0.1:9000/v1/projects/shop/"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = VertexConfig::new("shop", "secret-token");
        assert!(!format!("{config:?}").contains("secret-token"));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error": {"code": 403, "message": "Permission denied"}}"#),
            "Permission denied"
        );
        assert_eq!(error_message("  plain failure "), "plain failure");
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: VertexConfig =
            serde_json::from_str(r#"{"project_id": "p", "access_token": "t"}"#).unwrap();
        assert_eq!(config.region, "us-central1");
        assert_eq!(config.storage_endpoint, "https://storage.googleapis.com");
        assert_eq!(config.api_endpoint, None);
    }
}

//! Cloud Storage binding for [`BlobStore`] over the JSON API.

use super::client::read_json;
use super::VertexClient;
use crate::assets::GcsUri;
use crate::collaborators::{BlobStore, StoredBlob};
use crate::errors::StorageError;
use async_trait::async_trait;
use serde_json::Value;

/// A [`BlobStore`] writing to one Cloud Storage bucket.
#[derive(Debug, Clone)]
pub struct GcsBlobStore {
    client: VertexClient,
    bucket: String,
}

impl GcsBlobStore {
    /// Creates a store for `bucket`. A leading `gs://` is ignored.
    #[must_use]
    pub fn new(client: VertexClient, bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let bucket = bucket
            .strip_prefix("gs://")
            .unwrap_or(&bucket)
            .trim_end_matches('/')
            .to_string();
        Self { client, bucket }
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn endpoint(&self) -> &str {
        self.client.config().storage_endpoint.trim_end_matches('/')
    }
}

/// Converts a JSON API object resource into a [`StoredBlob`].
pub(crate) fn blob_from_resource(bucket: &str, resource: &Value) -> Option<StoredBlob> {
    let key = resource.get("name")?.as_str()?;
    let uri = GcsUri::new(bucket, key);
    // The JSON API encodes int64 fields as strings.
    let size = match resource.get("size") {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    };
    Some(StoredBlob {
        key: key.to_string(),
        uri: uri.to_string(),
        public_url: uri.public_url(),
        content_type: resource
            .get("contentType")
            .and_then(Value::as_str)
            .unwrap_or("application/octet-stream")
            .to_string(),
        size,
        md5_hash: resource.get("md5Hash").and_then(Value::as_str).map(String::from),
    })
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredBlob, StorageError> {
        let upload_err = |message: String| StorageError::Upload {
            key: key.to_string(),
            message,
        };
        let url = format!("{}/upload/storage/v1/b/{}/o", self.endpoint(), self.bucket);
        let headers = self.client.auth_headers().map_err(|e| upload_err(e.to_string()))?;

        let response = self
            .client
            .http()
            .post(url)
            .headers(headers)
            .query(&[("uploadType", "media"), ("name", key)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| upload_err(e.to_string()))?;
        let resource = read_json(response).await.map_err(|e| upload_err(e.to_string()))?;

        let blob = blob_from_resource(&self.bucket, &resource)
            .ok_or_else(|| upload_err("upload response has no object name".to_string()))?;
        tracing::debug!(key, size = blob.size, "Uploaded object");
        Ok(blob)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredBlob>, StorageError> {
        let list_err = |message: String| StorageError::List {
            prefix: prefix.to_string(),
            message,
        };
        let url = format!("{}/storage/v1/b/{}/o", self.endpoint(), self.bucket);
        let headers = self.client.auth_headers().map_err(|e| list_err(e.to_string()))?;

        let mut blobs = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .http()
                .get(&url)
                .headers(headers.clone())
                .query(&[("prefix", prefix)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await.map_err(|e| list_err(e.to_string()))?;
            let page = read_json(response).await.map_err(|e| list_err(e.to_string()))?;

            if let Some(items) = page.get("items").and_then(Value::as_array) {
                blobs.extend(items.iter().filter_map(|item| blob_from_resource(&self.bucket, item)));
            }
            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .map(String::from);
            if page_token.is_none() {
                break;
            }
        }

        blobs.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(blobs)
    }

    fn uri_for(&self, key: &str) -> String {
        GcsUri::new(&self.bucket, key).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::VertexConfig;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn store(endpoint: &str) -> GcsBlobStore {
        let client = VertexClient::new(VertexConfig::new("shop", "token").with_storage_endpoint(endpoint));
        GcsBlobStore::new(client, "gs://shop-assets/")
    }

    #[test]
    fn test_bucket_prefix_stripped() {
        let store = store("http://localhost");
        assert_eq!(store.bucket(), "shop-assets");
        assert_eq!(store.uri_for("vto/a.png"), "gs://shop-assets/vto/a.png");
    }

    #[test]
    fn test_blob_from_resource() {
        let blob = blob_from_resource(
            "b",
            &json!({ "name": "vto/a.png", "size": "42", "contentType": "image/png", "md5Hash": "abc==" }),
        )
        .unwrap();
        assert_eq!(blob.size, 42);
        assert_eq!(blob.public_url, "https://storage.googleapis.com/b/vto/a.png");
        assert_eq!(blob.md5_hash.as_deref(), Some("abc=="));
        assert!(blob_from_resource("b", &json!({})).is_none());
    }

    #[tokio::test]
    async fn test_put_uploads_media() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/upload/storage/v1/b/shop-assets/o")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("uploadType".into(), "media".into()),
                Matcher::UrlEncoded("name".into(), "vto/a.png".into()),
            ]))
            .match_header("content-type", "image/png")
            .match_header("authorization", "Bearer token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name": "vto/a.png", "size": "3", "contentType": "image/png"}"#)
            .create_async()
            .await;

        let blob = store(&server.url())
            .put("vto/a.png", b"png".to_vec(), "image/png")
            .await
            .unwrap();

        assert_eq!(blob.uri, "gs://shop-assets/vto/a.png");
        assert_eq!(blob.size, 3);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_follows_pages() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/storage/v1/b/shop-assets/o")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("prefix".into(), "videos/a/".into()),
                Matcher::Regex("^prefix=[^&]*$".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items": [{"name": "videos/a/z.mp4"}], "nextPageToken": "p2"}"#)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/storage/v1/b/shop-assets/o")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items": [{"name": "videos/a/sample_0.mp4"}]}"#)
            .create_async()
            .await;

        let keys: Vec<String> = store(&server.url())
            .list("videos/a/")
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.key)
            .collect();

        assert_eq!(keys, vec!["videos/a/sample_0.mp4", "videos/a/z.mp4"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error": {"message": "Forbidden"}}"#)
            .create_async()
            .await;

        let err = store(&server.url()).list("videos/").await.unwrap_err();
        assert!(matches!(err, StorageError::List { ref message, .. } if message.contains("Forbidden")));
    }
}

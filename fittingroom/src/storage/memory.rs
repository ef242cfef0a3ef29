//! In-memory blob store.

use super::md5_base64;
use crate::assets::GcsUri;
use crate::collaborators::{BlobStore, StoredBlob};
use crate::errors::StorageError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

struct MemoryObject {
    blob: StoredBlob,
    bytes: Vec<u8>,
}

/// A thread-safe blob store that keeps objects in memory.
///
/// Objects are addressed as if they lived in a Cloud Storage bucket, so URIs
/// and public URLs have the same shape as in production.
pub struct MemoryBlobStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, MemoryObject>>,
}

impl MemoryBlobStore {
    /// Creates an empty store for `bucket`.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns a copy of the bytes stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().get(key).map(|obj| obj.bytes.clone())
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Returns all keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }
}

impl std::fmt::Debug for MemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlobStore")
            .field("bucket", &self.bucket)
            .field("objects", &self.len())
            .finish()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredBlob, StorageError> {
        if key.is_empty() || key.ends_with('/') {
            return Err(StorageError::Upload {
                key: key.to_string(),
                message: "object key must name a file".to_string(),
            });
        }

        let uri = GcsUri::new(&self.bucket, key);
        let blob = StoredBlob {
            key: key.to_string(),
            uri: uri.to_string(),
            public_url: uri.public_url(),
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
            md5_hash: Some(md5_base64(&bytes)),
        };

        self.objects.write().insert(
            key.to_string(),
            MemoryObject {
                blob: blob.clone(),
                bytes,
            },
        );
        Ok(blob)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredBlob>, StorageError> {
        Ok(self
            .objects
            .read()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, obj)| obj.blob.clone())
            .collect())
    }

    fn uri_for(&self, key: &str) -> String {
        format!("gs://{}/{key}", self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_put_returns_addresses() {
        let store = MemoryBlobStore::new("shop-bucket");
        let blob = store.put("vto/a.png", vec![1, 2, 3], "image/png").await.unwrap();

        assert_eq!(blob.uri, "gs://shop-bucket/vto/a.png");
        assert_eq!(
            blob.public_url,
            "https://storage.googleapis.com/shop-bucket/vto/a.png"
        );
        assert_eq!(blob.size, 3);
        assert!(blob.md5_hash.is_some());
        assert_eq!(store.get("vto/a.png"), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_list_is_prefix_scoped_and_ordered() {
        let store = MemoryBlobStore::new("b");
        store.put("videos/x/2.mp4", vec![], "video/mp4").await.unwrap();
        store.put("videos/x/1.mp4", vec![], "video/mp4").await.unwrap();
        store.put("videos/y/1.mp4", vec![], "video/mp4").await.unwrap();
        store.put("vto/x.png", vec![], "image/png").await.unwrap();

        let keys: Vec<_> = store
            .list("videos/x/")
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.key)
            .collect();
        assert_eq!(keys, vec!["videos/x/1.mp4", "videos/x/2.mp4"]);
    }

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let store = MemoryBlobStore::new("b");
        store.put("k.png", vec![1], "image/png").await.unwrap();
        store.put("k.png", vec![2], "image/png").await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k.png"), Some(vec![2]));
    }

    #[tokio::test]
    async fn test_put_rejects_directory_key() {
        let store = MemoryBlobStore::new("b");
        assert!(store.put("videos/", vec![], "video/mp4").await.is_err());
    }

    #[test]
    fn test_uri_for() {
        let store = MemoryBlobStore::new("b");
        assert_eq!(store.uri_for("videos/a/"), "gs://b/videos/a/");
    }
}

//! Filesystem-backed blob store.

use super::md5_base64;
use crate::collaborators::{BlobStore, StoredBlob};
use crate::errors::StorageError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Stores objects as files under a root directory.
///
/// Public URLs are `<public_base_url>/<key>`, so the root can be served as
/// static content.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    /// Creates a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| self.root.join(relative))
    }

    fn blob_for(&self, key: &str, path: &Path, size: u64, content_type: &str, md5_hash: Option<String>) -> StoredBlob {
        StoredBlob {
            key: key.to_string(),
            uri: format!("file://{}", path.display()),
            public_url: format!("{}/{key}", self.public_base_url),
            content_type: content_type.to_string(),
            size,
            md5_hash,
        }
    }
}

fn content_type_for(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredBlob, StorageError> {
        let upload_error = |message: String| StorageError::Upload {
            key: key.to_string(),
            message,
        };

        let path = self
            .resolve(key)
            .filter(|_| !key.is_empty() && !key.ends_with('/'))
            .ok_or_else(|| upload_error("object key must be a relative file path".to_string()))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| upload_error(e.to_string()))?;
        }

        let md5_hash = md5_base64(&bytes);
        let size = bytes.len() as u64;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| upload_error(e.to_string()))?;

        tracing::debug!(key, size, path = %path.display(), "Stored blob on disk");
        Ok(self.blob_for(key, &path, size, content_type, Some(md5_hash)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredBlob>, StorageError> {
        let list_error = |message: String| StorageError::List {
            prefix: prefix.to_string(),
            message,
        };

        let mut found = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, dir_key)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(list_error(e.to_string())),
            };

            while let Some(entry) = entries.next_entry().await.map_err(|e| list_error(e.to_string()))? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = format!("{dir_key}{name}");
                let file_type = entry.file_type().await.map_err(|e| list_error(e.to_string()))?;

                if file_type.is_dir() {
                    let dir_prefix = format!("{key}/");
                    // Only descend where the prefix can still match.
                    if dir_prefix.starts_with(prefix) || prefix.starts_with(&dir_prefix) {
                        pending.push((entry.path(), dir_prefix));
                    }
                } else if key.starts_with(prefix) {
                    let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                    found.push(self.blob_for(&key, &entry.path(), size, content_type_for(&key), None));
                }
            }
        }

        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }

    fn uri_for(&self, key: &str) -> String {
        format!("file://{}", self.root.join(key).display())
    }
}

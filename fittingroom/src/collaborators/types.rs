//! Request and response types shared by the collaborator contracts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An object persisted by a [`BlobStore`](super::BlobStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlob {
    /// Object key relative to the store root.
    pub key: String,
    /// Address collaborators use to read the object (`gs://...`, `file://...`).
    pub uri: String,
    /// Address browsers use to fetch the object.
    pub public_url: String,
    /// MIME type recorded at upload.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Base64 MD5 of the content, in Cloud Storage's `md5Hash` format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5_hash: Option<String>,
}

impl StoredBlob {
    /// Returns true if the key has the given extension (case-insensitive).
    #[must_use]
    pub fn has_extension(&self, extension: &str) -> bool {
        self.key
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(extension))
    }
}

/// Input for a video generation operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRequest {
    /// Collaborator-facing URI of the source image.
    pub input_uri: String,
    /// MIME type of the source image.
    pub input_mime_type: String,
    /// Store key prefix the video must be written under.
    pub output_prefix: String,
    /// Collaborator-facing URI of `output_prefix`.
    pub output_uri: String,
    /// Text prompt describing the motion.
    pub prompt: String,
    /// Output aspect ratio (e.g. `9:16`).
    pub aspect_ratio: String,
    /// Whether to synthesise audio.
    pub generate_audio: bool,
}

/// Opaque handle of a running operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationHandle(pub String);

impl OperationHandle {
    /// Creates a handle.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of checking an operation once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    /// Still running.
    Running,
    /// Finished; output has been written.
    Succeeded,
    /// Finished with an error.
    Failed {
        /// Provider error code.
        code: Option<i64>,
        /// Provider message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(key: &str) -> StoredBlob {
        StoredBlob {
            key: key.to_string(),
            uri: format!("gs://b/{key}"),
            public_url: format!("https://storage.googleapis.com/b/{key}"),
            content_type: "video/mp4".to_string(),
            size: 1,
            md5_hash: None,
        }
    }

    #[test]
    fn test_has_extension() {
        assert!(blob("videos/a/sample_0.mp4").has_extension("mp4"));
        assert!(blob("videos/a/SAMPLE.MP4").has_extension("mp4"));
        assert!(!blob("videos/a/meta.json").has_extension("mp4"));
        assert!(!blob("videos/a/mp4").has_extension("mp4"));
    }

    #[test]
    fn test_operation_handle_display() {
        let handle = OperationHandle::new("projects/p/operations/1");
        assert_eq!(handle.to_string(), "projects/p/operations/1");
        assert_eq!(handle.name(), "projects/p/operations/1");
    }
}

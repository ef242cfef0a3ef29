//! Image references passed between the orchestrator and its collaborators.
//!
//! Callers hand in strings. Cloud Storage objects may be given as `gs://`
//! URIs or as public `https://storage.googleapis.com/...` URLs; both are
//! normalised to [`GcsUri`]. Anything without a scheme is a local path.
//! Intermediate composites travel as [`InlineImage`] bytes.

use crate::errors::InputError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Host serving public Cloud Storage URLs.
pub const PUBLIC_STORAGE_HOST: &str = "https://storage.googleapis.com";

#[allow(clippy::expect_used)]
static GS_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^gs://([A-Za-z0-9][A-Za-z0-9._-]*)/(.+)$").expect("valid gs:// pattern")
});

#[allow(clippy::expect_used)]
static PUBLIC_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://storage\.googleapis\.com/([A-Za-z0-9][A-Za-z0-9._-]*)/(.+)$")
        .expect("valid public storage pattern")
});

#[allow(clippy::expect_used)]
static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").expect("valid scheme pattern"));

/// A Cloud Storage object address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GcsUri {
    /// Bucket name.
    pub bucket: String,
    /// Object name within the bucket.
    pub object: String,
}

impl GcsUri {
    /// Creates a new URI.
    #[must_use]
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    /// Parses a `gs://` URI or a public storage URL.
    pub fn parse(value: &str) -> Result<Self, InputError> {
        let captures = GS_URI
            .captures(value)
            .or_else(|| PUBLIC_URL.captures(value))
            .ok_or_else(|| InputError::InvalidUri {
                uri: value.to_string(),
            })?;
        Ok(Self::new(&captures[1], &captures[2]))
    }

    /// Returns the public HTTPS URL of the object.
    #[must_use]
    pub fn public_url(&self) -> String {
        format!("{PUBLIC_STORAGE_HOST}/{}/{}", self.bucket, self.object)
    }
}

impl fmt::Display for GcsUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.object)
    }
}

/// Converts a public storage URL to its `gs://` form.
///
/// Values that are already `gs://` URIs or that are not storage URLs are
/// returned unchanged.
#[must_use]
pub fn to_gs_uri(value: &str) -> String {
    match PUBLIC_URL.captures(value) {
        Some(captures) => format!("gs://{}/{}", &captures[1], &captures[2]),
        None => value.to_string(),
    }
}

/// Image bytes held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct InlineImage {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub mime_type: String,
}

impl InlineImage {
    /// Creates a PNG image.
    #[must_use]
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/png".to_string(),
        }
    }

    /// Returns the byte count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if there are no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the file extension matching the MIME type.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

impl fmt::Debug for InlineImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A readable image resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// A Cloud Storage object.
    Gcs(GcsUri),
    /// A file on the local filesystem.
    Local(PathBuf),
    /// Bytes already in memory (e.g. a previous composite).
    Inline(InlineImage),
}

impl ImageRef {
    /// Parses a caller-supplied reference.
    ///
    /// `field` names the request field for error messages.
    pub fn parse(value: &str, field: &str) -> Result<Self, InputError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(InputError::missing(field));
        }
        if value.starts_with("gs://") || value.starts_with(PUBLIC_STORAGE_HOST) {
            return GcsUri::parse(value).map(Self::Gcs);
        }
        if URL_SCHEME.is_match(value) {
            return Err(InputError::UnsupportedReference {
                reference: value.to_string(),
            });
        }
        Ok(Self::Local(PathBuf::from(value)))
    }

    /// Returns a short description suitable for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Gcs(uri) => uri.to_string(),
            Self::Local(path) => path.display().to_string(),
            Self::Inline(image) => format!("inline:{}:{}b", image.mime_type, image.len()),
        }
    }
}

impl From<InlineImage> for ImageRef {
    fn from(image: InlineImage) -> Self {
        Self::Inline(image)
    }
}

impl From<GcsUri> for ImageRef {
    fn from(uri: GcsUri) -> Self {
        Self::Gcs(uri)
    }
}

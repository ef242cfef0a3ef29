//! Contracts for the external services the orchestrator depends on.
//!
//! Each collaborator is a narrow async trait. The orchestrator only ever sees
//! these traits; concrete bindings live in [`crate::storage`],
//! [`crate::testing`] and (with the `vertex` feature) `crate::vertex`.

mod types;

pub use types::{OperationHandle, OperationState, StoredBlob, VideoRequest};

use crate::assets::{ImageRef, InlineImage};
use crate::errors::{CompositionError, DesignError, MediaError, StorageError};
use async_trait::async_trait;

/// Dresses a person image in one garment.
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Returns `person` wearing `garment`.
    ///
    /// Called once per garment; the orchestrator feeds each output back in as
    /// the next `person`.
    async fn compose(&self, person: &ImageRef, garment: &ImageRef) -> Result<InlineImage, CompositionError>;
}

/// Object storage holding generated artifacts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `bytes` under `key` and returns the stored object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredBlob, StorageError>;

    /// Lists objects whose key starts with `prefix`, ordered by key.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredBlob>, StorageError>;

    /// Returns the collaborator-facing URI for a key (e.g. `gs://bucket/key`).
    fn uri_for(&self, key: &str) -> String;
}

/// Long-running video synthesis.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Starts an operation and returns its handle.
    async fn start(&self, request: &VideoRequest) -> Result<OperationHandle, MediaError>;

    /// Checks an operation once.
    async fn poll(&self, handle: &OperationHandle) -> Result<OperationState, MediaError>;
}

/// Turns a shopper's description into an image-generation prompt.
#[async_trait]
pub trait PromptRewriter: Send + Sync {
    /// Runs `instruction` through the text model and returns its reply.
    async fn rewrite(&self, instruction: &str) -> Result<String, DesignError>;
}

/// Text-to-image generation.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates one image for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<InlineImage, DesignError>;
}

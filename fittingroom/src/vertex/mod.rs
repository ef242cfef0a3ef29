//! Vertex AI and Cloud Storage bindings for the collaborator traits.
//!
//! All clients speak the public REST APIs through `reqwest` and authorise
//! with a bearer access token supplied in [`VertexConfig`]. Minting or
//! refreshing tokens is left to the caller (e.g. `gcloud auth
//! print-access-token`, a metadata server sidecar).

mod client;
mod designer;
mod storage;
mod try_on;
mod video;

pub use client::{VertexClient, VertexConfig, VertexError};
pub use designer::{GeminiRewriter, ImagenGenerator, IMAGEN_MODEL, REWRITE_MODEL};
pub use storage::GcsBlobStore;
pub use try_on::{VertexTryOn, TRY_ON_MODEL};
pub use video::{VertexVideo, VIDEO_MODEL};

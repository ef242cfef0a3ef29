//! # Fitting Room
//!
//! Orchestration core for a virtual try-on demo shop.
//!
//! A try-on request runs in two stages:
//!
//! - **Stage 1** (in the request): garments are layered onto the person photo
//!   one at a time by a [`Compositor`](collaborators::Compositor), and the
//!   composite is persisted to a [`BlobStore`](collaborators::BlobStore).
//! - **Stage 2** (in the background): a video of the composite is generated by
//!   a long-running [`VideoGenerator`](collaborators::VideoGenerator) job. The
//!   caller polls the [`GenerationRegistry`](orchestrator::GenerationRegistry)
//!   with the generation id returned by stage 1.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fittingroom::prelude::*;
//!
//! let orchestrator = GenerationOrchestrator::builder()
//!     .compositor(compositor)
//!     .blob_store(blobs)
//!     .video_generator(video)
//!     .build()?;
//!
//! let submission = orchestrator
//!     .submit(TryOnRequest::parse("gs://bucket/p.png", &["gs://bucket/shirt.png"])?)
//!     .await?;
//!
//! let status = orchestrator.poll(&submission.generation_id);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod assets;
pub mod cancellation;
pub mod collaborators;
pub mod config;
pub mod core;
pub mod designer;
pub mod errors;
pub mod events;
pub mod observability;
pub mod orchestrator;
pub mod polling;
pub mod storage;
pub mod testing;
pub mod utils;

#[cfg(feature = "vertex")]
pub mod vertex;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assets::{GcsUri, ImageRef, InlineImage};
    pub use crate::cancellation::{CancellationToken, JobPool};
    pub use crate::collaborators::{
        BlobStore, Compositor, ImageGenerator, OperationHandle, OperationState, PromptRewriter,
        StoredBlob, VideoGenerator, VideoRequest,
    };
    pub use crate::config::{DesignerConfig, OrchestratorConfig, VideoSettings};
    pub use crate::core::{GenerationId, GenerationRecord, GenerationStatus, PollResponse, PollStatus};
    pub use crate::designer::{ApparelDesigner, InspireResult};
    pub use crate::errors::{
        CompositionError, DesignError, FittingRoomError, GenerationError, InputError, MediaError,
        RegistryError, StorageError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::orchestrator::{
        GenerationOrchestrator, GenerationRegistry, Submission, TryOnRequest,
    };
    pub use crate::polling::{await_operation, BackoffStrategy, JitterStrategy, PollError, PollPolicy};
    pub use crate::storage::{LocalBlobStore, MemoryBlobStore};
    pub use crate::utils::{iso_timestamp, Timestamp};
}

//! Error types for the fitting room.
//!
//! Errors are split by where they surface. Request-time failures
//! ([`InputError`], [`CompositionError`], [`StorageError`], [`DesignError`])
//! roll up into [`FittingRoomError`] and reach the caller. Background failures
//! ([`GenerationError`]) never reach a caller; they only end up as a `failed`
//! generation record.

use crate::polling::PollError;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// The main error type returned to callers of the orchestrator and designer.
#[derive(Debug, Error)]
pub enum FittingRoomError {
    /// The caller supplied missing or malformed input.
    #[error("{0}")]
    Input(#[from] InputError),

    /// The compositing collaborator failed during stage 1.
    #[error("{0}")]
    Composition(#[from] CompositionError),

    /// Blob storage failed while persisting a request-time artifact.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// The prompt rewriter or image generator failed.
    #[error("{0}")]
    Design(#[from] DesignError),

    /// The registry rejected a write.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// The service no longer accepts work.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FittingRoomError {
    /// Returns true if the caller is at fault (a 4xx-class failure).
    #[must_use]
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::Input(_))
    }

    /// Returns a short machine-readable kind for error payloads.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input_error",
            Self::Composition(_) => "composition_error",
            Self::Storage(_) => "storage_error",
            Self::Design(_) => "design_error",
            Self::Registry(_) => "registration_conflict",
            Self::ServiceShutdown => "service_shutdown",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("error".to_string(), serde_json::json!(self.to_string()));
        map.insert("kind".to_string(), serde_json::json!(self.kind()));
        if let Self::Composition(err) = self {
            map.insert("layer".to_string(), serde_json::json!(err.layer));
        }
        map
    }
}

/// Caller input errors. Nothing is registered when one of these is raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// A required field was absent or empty.
    #[error("{field} is required")]
    MissingField {
        /// The missing field name.
        field: String,
    },

    /// An image reference uses a scheme the compositor cannot read.
    #[error("Unsupported image reference: {reference}")]
    UnsupportedReference {
        /// The offending reference.
        reference: String,
    },

    /// A storage URI could not be parsed.
    #[error("Invalid storage URI: {uri}")]
    InvalidUri {
        /// The offending URI.
        uri: String,
    },
}

impl InputError {
    /// Creates a missing field error.
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField { field: field.into() }
    }
}

/// The compositing collaborator failed.
#[derive(Debug, Clone, Error)]
#[error("Composition failed at garment {layer}: {message}")]
pub struct CompositionError {
    /// Index of the garment being applied when the failure happened.
    pub layer: usize,
    /// The collaborator's message.
    pub message: String,
}

impl CompositionError {
    /// Creates a new composition error for the first layer.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            layer: 0,
            message: message.into(),
        }
    }

    /// Sets the garment index the error belongs to.
    #[must_use]
    pub fn at_layer(mut self, layer: usize) -> Self {
        self.layer = layer;
        self
    }
}

/// Blob storage errors.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Writing an object failed.
    #[error("Failed to store '{key}': {message}")]
    Upload {
        /// The object key.
        key: String,
        /// Details.
        message: String,
    },

    /// Listing a prefix failed.
    #[error("Failed to list '{prefix}': {message}")]
    List {
        /// The listed prefix.
        prefix: String,
        /// Details.
        message: String,
    },

    /// Reading a source object failed.
    #[error("Failed to read '{location}': {message}")]
    Read {
        /// The location being read.
        location: String,
        /// Details.
        message: String,
    },
}

/// Errors from the long-running video collaborator.
#[derive(Debug, Clone, Error)]
pub enum MediaError {
    /// Starting the operation was rejected.
    #[error("Failed to start video generation: {0}")]
    Start(String),

    /// Checking the operation failed.
    #[error("Failed to poll video generation: {0}")]
    Poll(String),

    /// The operation finished with an error.
    #[error("Video generation failed: {message}")]
    OperationFailed {
        /// Provider error code, if any.
        code: Option<i64>,
        /// Provider message.
        message: String,
    },

    /// The provider returned something we could not interpret.
    #[error("Invalid video generation response: {0}")]
    InvalidResponse(String),
}

/// Errors from the apparel designer collaborators.
#[derive(Debug, Clone, Error)]
pub enum DesignError {
    /// Prompt rewriting failed.
    #[error("Prompt rewrite failed: {0}")]
    Rewrite(String),

    /// Image generation failed.
    #[error("Image generation failed: {0}")]
    ImageGeneration(String),

    /// The generator returned no image (e.g. filtered by safety settings).
    #[error("No image was generated for prompt")]
    NoImage,
}

/// Failures of the background video stage.
///
/// These are recorded on the generation and logged; they are never returned
/// to the caller that submitted the request.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The video collaborator failed.
    #[error("{0}")]
    Media(#[from] MediaError),

    /// Listing the output location failed.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// The operation completed but no video was found in the output location.
    #[error("Generated video not found under '{prefix}'")]
    ArtifactMissing {
        /// The output prefix that was searched.
        prefix: String,
    },

    /// The job exceeded its deadline.
    #[error("Video generation timed out after {after_ms}ms")]
    TimedOut {
        /// Elapsed time in milliseconds.
        after_ms: u64,
    },

    /// The poller gave up after the configured number of checks.
    #[error("Video generation still pending after {attempts} checks")]
    AttemptsExhausted {
        /// Number of checks performed.
        attempts: usize,
    },

    /// The job was cancelled.
    #[error("Video generation cancelled: {reason}")]
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },

    /// The job itself broke, e.g. a collaborator panicked.
    #[error("Video generation aborted: {0}")]
    Internal(String),
}

impl From<PollError<MediaError>> for GenerationError {
    fn from(err: PollError<MediaError>) -> Self {
        match err {
            PollError::Operation(media) => Self::Media(media),
            PollError::AttemptsExhausted { attempts } => Self::AttemptsExhausted { attempts },
            PollError::TimedOut { after_ms } => Self::TimedOut { after_ms },
            PollError::Cancelled { reason } => Self::Cancelled { reason },
        }
    }
}

impl GenerationError {
    /// Returns a short machine-readable kind for events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Media(_) => "media_error",
            Self::Storage(_) => "storage_error",
            Self::ArtifactMissing { .. } => "artifact_missing",
            Self::TimedOut { .. } => "timed_out",
            Self::AttemptsExhausted { .. } => "attempts_exhausted",
            Self::Cancelled { .. } => "cancelled",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// Registry write errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A record with this id already exists.
    #[error("Generation '{id}' is already registered")]
    Duplicate {
        /// The generation id.
        id: String,
    },

    /// No record with this id exists.
    #[error("Generation '{id}' is not registered")]
    NotFound {
        /// The generation id.
        id: String,
    },

    /// The record already reached a terminal state.
    #[error("Generation '{id}' is already {status}")]
    AlreadyTerminal {
        /// The generation id.
        id: String,
        /// The terminal status.
        status: String,
    },
}

/// Serializable error payload for HTTP responses.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Human readable message.
    pub error: String,
    /// Machine readable kind.
    pub kind: String,
}

impl From<&FittingRoomError> for ErrorBody {
    fn from(err: &FittingRoomError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_is_client_fault() {
        let err = FittingRoomError::from(InputError::missing("garmentImageRefs"));
        assert!(err.is_client_fault());
        assert_eq!(err.kind(), "input_error");
        assert_eq!(err.to_string(), "garmentImageRefs is required");
    }

    #[test]
    fn test_collaborator_errors_are_not_client_faults() {
        let err = FittingRoomError::from(CompositionError::new("bad image"));
        assert!(!err.is_client_fault());

        let err = FittingRoomError::from(StorageError::Upload {
            key: "vto/a.png".to_string(),
            message: "denied".to_string(),
        });
        assert!(!err.is_client_fault());
        assert!(!FittingRoomError::ServiceShutdown.is_client_fault());
    }

    #[test]
    fn test_composition_error_layer() {
        let err = CompositionError::new("incompatible garment").at_layer(2);
        assert_eq!(err.layer, 2);
        assert_eq!(
            err.to_string(),
            "Composition failed at garment 2: incompatible garment"
        );
    }

    #[test]
    fn test_to_dict_includes_layer_for_composition() {
        let err = FittingRoomError::from(CompositionError::new("x").at_layer(1));
        let dict = err.to_dict();
        assert_eq!(dict.get("kind"), Some(&serde_json::json!("composition_error")));
        assert_eq!(dict.get("layer"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn test_generation_error_from_media() {
        let err = GenerationError::from(MediaError::OperationFailed {
            code: Some(3),
            message: "prompt rejected".to_string(),
        });
        assert_eq!(err.to_string(), "Video generation failed: prompt rejected");
    }

    #[test]
    fn test_generation_error_from_poll_error() {
        let err = GenerationError::from(PollError::<MediaError>::Cancelled {
            reason: "shutdown".to_string(),
        });
        assert_eq!(err.kind(), "cancelled");
        assert_eq!(err.to_string(), "Video generation cancelled: shutdown");

        let err = GenerationError::from(PollError::<MediaError>::AttemptsExhausted { attempts: 4 });
        assert_eq!(err.kind(), "attempts_exhausted");
    }

    #[test]
    fn test_error_body_from_error() {
        let err = FittingRoomError::from(InputError::missing("prompt"));
        let body = ErrorBody::from(&err);
        assert_eq!(body.error, "prompt is required");
        assert_eq!(body.kind, "input_error");
    }
}

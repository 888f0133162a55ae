use std::path::PathBuf;

use thiserror::Error;

/// Error types for the duplicate engine.
/// The binary uses `anyhow` at the top level, but engine modules return these
/// so callers can tell a skippable image failure from a fatal one.
#[derive(Debug, Error)]
pub enum PhotoError {
    /// Image bytes could not be decoded (corrupt, truncated, unreadable)
    #[error("Decode error for '{id}': {message}")]
    Decode { id: String, message: String },

    /// Container was recognized but the codec does not support it
    #[error("Unsupported format for '{id}': {message}")]
    UnsupportedFormat { id: String, message: String },

    /// Nothing to fingerprint
    #[error("Input exhausted: no images to process")]
    InputExhausted,

    /// Decision file matches neither the current nor the legacy layout
    #[error("Malformed decision input '{source_name}': {message}")]
    MalformedDecisionInput { source_name: String, message: String },

    /// File system operation failed
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decision set could not be written out as JSON
    #[error("Failed to serialize decisions: {message}")]
    Serialize { message: String },

    /// Engine settings out of range
    #[error("Invalid settings: {message}")]
    InvalidSettings { message: String },

    /// Fingerprint worker pool could not be started
    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },

    /// The run was aborted through its cancel flag
    #[error("Operation cancelled")]
    Cancelled,
}

impl PhotoError {
    /// Image-local failures: the image is dropped and the batch keeps going.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            PhotoError::Decode { .. } | PhotoError::UnsupportedFormat { .. }
        )
    }

    /// Translate a codec error for the image identified by `id`.
    pub fn from_image_error(id: &str, err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(e) => PhotoError::UnsupportedFormat {
                id: id.to_string(),
                message: e.to_string(),
            },
            other => PhotoError::Decode {
                id: id.to_string(),
                message: other.to_string(),
            },
        }
    }

    pub fn malformed(source_name: &str, message: impl Into<String>) -> Self {
        PhotoError::MalformedDecisionInput {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PhotoError>;

//! Error types for envelope encoding and decoding.

use thiserror::Error;

/// Error type for codec operations.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame is not valid JSON or does not match the envelope shape.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame decoded to JSON but carries no usable `type` field.
    #[error("envelope has no message type")]
    MissingKind,

    /// The envelope is valid JSON but violates a protocol rule.
    #[error("invalid envelope: {message}")]
    InvalidEnvelope {
        /// Error message.
        message: String,
    },
}

impl CodecError {
    /// Creates an invalid envelope error.
    pub fn invalid_envelope(message: impl Into<String>) -> Self {
        Self::InvalidEnvelope {
            message: message.into(),
        }
    }
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

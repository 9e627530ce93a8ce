//! Error types for client operations.

use hassmux_core::{CodecError, ServerFailure};
use std::time::Duration;
use thiserror::Error;

/// Error type for client operations.
///
/// Errors are `Clone` because one connection failure is reported to every
/// caller that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The server rejected the access token. Never retried.
    #[error("authentication rejected: {message}")]
    AuthRejected {
        /// Message sent by the server.
        message: String,
    },

    /// Connecting failed and the retry budget is exhausted.
    #[error("connect failed after {attempts} attempt(s): {message}")]
    ConnectFailed {
        /// Number of connection attempts made.
        attempts: usize,
        /// Last failure.
        message: String,
    },

    /// The connection dropped while the request was in flight.
    #[error("connection lost")]
    ConnectionLost,

    /// No reply arrived in time.
    #[error("request {id} timed out after {timeout:?}")]
    Timeout {
        /// Request id.
        id: u64,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The server answered with `success: false`.
    #[error("server returned error: {message} (code: {code})")]
    Server {
        /// Server error code.
        code: String,
        /// Server error message.
        message: String,
    },

    /// Writing the request to the connection failed.
    #[error("send failed: {message}")]
    Send {
        /// Error message.
        message: String,
    },

    /// The request could not be encoded.
    #[error("codec error: {message}")]
    Codec {
        /// Error message.
        message: String,
    },

    /// The client was shut down.
    #[error("client shut down")]
    Shutdown,

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },
}

impl ClientError {
    /// Creates a send error.
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if the session cannot recover without an explicit
    /// `connect` call.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthRejected { .. } | Self::ConnectFailed { .. } | Self::Shutdown
        )
    }
}

impl From<CodecError> for ClientError {
    fn from(error: CodecError) -> Self {
        Self::Codec {
            message: error.to_string(),
        }
    }
}

impl From<ServerFailure> for ClientError {
    fn from(failure: ServerFailure) -> Self {
        Self::Server {
            code: failure.code,
            message: failure.message,
        }
    }
}

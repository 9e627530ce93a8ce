//! Session lifecycle states.

use std::fmt;

/// Lifecycle state of the client's single session.
///
/// ```text
/// Disconnected -> Connecting -> Authenticating -> Ready
///      ^              |               |             |
///      +--------------+---------------+-------------+
///
/// any -> Closing -> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Opening the connection.
    Connecting,
    /// Connection open, waiting for the server to accept the access token.
    Authenticating,
    /// Authenticated; requests may be written.
    Ready,
    /// Shutting down.
    Closing,
}

impl SessionState {
    /// Returns true if the state machine allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Closing, Closing) => false,
            (_, Closing) => true,
            (Disconnected, Connecting)
            | (Connecting, Authenticating)
            | (Connecting, Disconnected)
            | (Authenticating, Ready)
            | (Authenticating, Disconnected)
            | (Ready, Disconnected)
            | (Closing, Disconnected) => true,
            _ => false,
        }
    }

    /// Returns true if requests may be written in this state.
    #[must_use]
    pub fn is_ready(self) -> bool {
        self == SessionState::Ready
    }

    /// Returns the state name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::Ready => "ready",
            SessionState::Closing => "closing",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

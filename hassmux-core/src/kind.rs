//! Message kinds of the Home Assistant WebSocket API.
//!
//! The `type` field of every envelope carries one of these values, or a
//! command name such as `recorder/statistics_during_period` for requests.

/// Sent by the server right after the socket opens.
pub const AUTH_REQUIRED: &str = "auth_required";
/// Sent by the client with its access token.
pub const AUTH: &str = "auth";
/// Server accepted the access token.
pub const AUTH_OK: &str = "auth_ok";
/// Server rejected the access token.
pub const AUTH_INVALID: &str = "auth_invalid";
/// Reply to a command.
pub const RESULT: &str = "result";
/// Event pushed for an active subscription.
pub const EVENT: &str = "event";
/// Liveness probe.
pub const PING: &str = "ping";
/// Reply to [`PING`].
pub const PONG: &str = "pong";

/// Returns true if `kind` belongs to the authentication phase.
#[must_use]
pub fn is_auth_phase(kind: &str) -> bool {
    matches!(kind, AUTH_REQUIRED | AUTH | AUTH_OK | AUTH_INVALID)
}

//! Client configuration.

use crate::error::ClientError;
use crate::reconnect::ReconnectConfig;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Environment variable holding the server URL.
pub const URL_ENV: &str = "HOME_ASSISTANT_URL";
/// Environment variable holding the long-lived access token.
pub const TOKEN_ENV: &str = "HOME_ASSISTANT_ACCESS_TOKEN";
/// Environment variable overriding the default request timeout, in seconds.
pub const REQUEST_TIMEOUT_ENV: &str = "HASSMUX_REQUEST_TIMEOUT_SECS";

/// Path of the WebSocket endpoint on a Home Assistant server.
const WEBSOCKET_PATH: &str = "/api/websocket";

/// Configuration for a [`Client`](crate::Client).
#[derive(Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://homeassistant.local:8123/api/websocket`.
    pub url: String,
    /// Access token sent in the `auth` envelope.
    pub access_token: String,
    /// Default timeout for `call`.
    pub request_timeout: Duration,
    /// Timeout for opening the connection.
    pub connect_timeout: Duration,
    /// Timeout for the authentication handshake.
    pub auth_timeout: Duration,
    /// Retry policy for connection attempts.
    pub reconnect: ReconnectConfig,
    /// Reconnect as soon as the connection drops instead of on the next call.
    pub auto_reconnect: bool,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl ClientConfig {
    /// Creates a configuration with default timeouts.
    #[must_use]
    pub fn new(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: access_token.into(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            auth_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
            auto_reconnect: true,
            event_capacity: 256,
        }
    }

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    /// Returns `ClientError::Config` if a variable is missing or invalid.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// `HOME_ASSISTANT_URL` may be the server's base URL
    /// (`http://host:8123`) or the WebSocket endpoint itself.
    ///
    /// # Errors
    /// Returns `ClientError::Config` if a variable is missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let base = lookup(URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ClientError::config(format!("{URL_ENV} is not set")))?;
        let token = lookup(TOKEN_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ClientError::config(format!("{TOKEN_ENV} is not set")))?;

        let mut config = Self::new(websocket_url(base.trim())?, token.trim());

        if let Some(raw) = lookup(REQUEST_TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ClientError::config(format!(
                    "{REQUEST_TIMEOUT_ENV} must be whole seconds, got {raw:?}"
                ))
            })?;
            if secs == 0 {
                return Err(ClientError::config(format!(
                    "{REQUEST_TIMEOUT_ENV} must be greater than zero"
                )));
            }
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("access_token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("auth_timeout", &self.auth_timeout)
            .field("reconnect", &self.reconnect)
            .field("auto_reconnect", &self.auto_reconnect)
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

/// Turns a server base URL into its WebSocket endpoint.
///
/// `http` maps to `ws` and `https` to `wss`; `/api/websocket` is appended
/// unless already present.
///
/// # Errors
/// Returns `ClientError::Config` if the URL cannot be parsed or uses an
/// unsupported scheme.
pub fn websocket_url(base: &str) -> Result<String, ClientError> {
    let mut url =
        Url::parse(base).map_err(|e| ClientError::config(format!("invalid URL {base:?}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ClientError::config(format!(
                "unsupported URL scheme {other:?}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| ClientError::config(format!("cannot use scheme {scheme} for {base:?}")))?;

    if !url.path().ends_with(WEBSOCKET_PATH) {
        let path = format!("{}{WEBSOCKET_PATH}", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }

    Ok(url.to_string())
}

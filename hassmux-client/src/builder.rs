//! Client builder and client events.

use crate::client::Client;
use crate::config::ClientConfig;
use crate::state::SessionState;
use hassmux_core::Envelope;
use hassmux_transport::Connector;
use std::sync::Arc;
use std::time::Duration;

/// Builder for configuring and creating a client.
pub struct ClientBuilder {
    config: ClientConfig,
    connector: Option<Arc<dyn Connector>>,
}

impl ClientBuilder {
    /// Creates a new client builder for the given WebSocket endpoint.
    #[must_use]
    pub fn new(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::from_config(ClientConfig::new(url, access_token))
    }

    /// Creates a builder starting from an existing configuration.
    #[must_use]
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            connector: None,
        }
    }

    /// Sets the default timeout for requests.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the authentication handshake timeout.
    #[must_use]
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.config.auth_timeout = timeout;
        self
    }

    /// Enables or disables retrying failed connection attempts.
    #[must_use]
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.config.reconnect.enabled = enabled;
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect.initial_delay = delay;
        self
    }

    /// Sets the upper bound for the retry delay.
    #[must_use]
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect.max_delay = delay;
        self
    }

    /// Sets the maximum connection attempts (0 = unlimited).
    #[must_use]
    pub fn max_reconnect_attempts(mut self, max: usize) -> Self {
        self.config.reconnect.max_attempts = max;
        self
    }

    /// Reconnect in the background as soon as the connection drops.
    ///
    /// When disabled, the next `call` reconnects.
    #[must_use]
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Uses `connector` to open connections instead of the WebSocket
    /// transport.
    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Returns the configuration built so far.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Builds the client. No connection is opened until the first call or an
    /// explicit `connect`.
    #[cfg(feature = "websocket")]
    #[must_use]
    pub fn build(self) -> Client {
        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => {
                let ws = hassmux_transport::WsConfig::default()
                    .connect_timeout(self.config.connect_timeout);
                Arc::new(hassmux_transport::WsConnector::new(ws))
            }
        };
        Client::new(self.config, connector)
    }

    /// Builds the client. No connection is opened until the first call or an
    /// explicit `connect`.
    ///
    /// # Errors
    /// Returns `ClientError::Config` if no connector was given.
    #[cfg(not(feature = "websocket"))]
    pub fn build(self) -> Result<Client, crate::ClientError> {
        let connector = self
            .connector
            .ok_or_else(|| crate::ClientError::config("no connector configured"))?;
        Ok(Client::new(self.config, connector))
    }
}

/// Events emitted by the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The session moved to a new state.
    StateChanged(SessionState),
    /// A subscription event or any other frame that is not a reply.
    Message(Envelope),
}

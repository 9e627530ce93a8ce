//! The request/response facade.

use crate::builder::{ClientBuilder, ClientEvent};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::recorder::StatisticsQuery;
use crate::session::Session;
use crate::state::SessionState;
use hassmux_core::{Envelope, kind};
use hassmux_transport::Connector;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::debug;

struct Shared {
    session: Arc<Session>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        // The reader holds its own reference to the session; stop it with
        // the last client handle.
        self.session.cancel();
    }
}

/// Multiplexed client for the Home Assistant WebSocket API.
///
/// Cloning is cheap and every clone shares the same connection. Any number
/// of tasks may `call` concurrently; replies are matched to callers by id.
///
/// # Example
/// ```no_run
/// # async fn demo() -> Result<(), hassmux_client::ClientError> {
/// use hassmux_client::Client;
/// use hassmux_core::Envelope;
///
/// let client = Client::builder("ws://homeassistant.local:8123/api/websocket", "token").build();
/// let states = client.call(Envelope::new("get_states")).await?;
/// println!("{states}");
/// client.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Returns a builder for a client of `url`.
    #[must_use]
    pub fn builder(url: impl Into<String>, access_token: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(url, access_token)
    }

    pub(crate) fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            shared: Arc::new(Shared {
                session: Arc::new(Session::new(config, connector)),
            }),
        }
    }

    fn session(&self) -> &Arc<Session> {
        &self.shared.session
    }

    /// Sends `request` and waits for its reply, using the configured
    /// request timeout.
    ///
    /// # Errors
    /// See [`Client::call_with_timeout`].
    pub async fn call(&self, request: Envelope) -> Result<Value, ClientError> {
        let timeout = self.session().config().request_timeout;
        self.call_with_timeout(request, timeout).await
    }

    /// Sends `request` and waits at most `timeout` for its reply.
    ///
    /// Any `id` on the request is replaced by a freshly allocated one. A
    /// successful `result` reply yields its payload (`null` when absent);
    /// any other reply kind yields the whole envelope.
    ///
    /// # Errors
    /// - `Server` if the server answered with `success: false`
    /// - `Timeout` if no reply arrived in time
    /// - `ConnectionLost` if the connection dropped while waiting
    /// - `AuthRejected`, `ConnectFailed` or `Shutdown` if no session could
    ///   be established
    pub async fn call_with_timeout(
        &self,
        request: Envelope,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        let session = self.session();
        session.ensure_ready().await?;

        let correlator = session.correlator();
        let handle = correlator.register();
        let id = handle.id();
        let request_kind = request.kind.clone();

        let frame = match request.with_id(id).encode() {
            Ok(frame) => frame,
            Err(error) => {
                correlator.cancel(handle);
                return Err(error.into());
            }
        };
        if let Err(error) = session.write(handle.generation(), frame).await {
            correlator.cancel(handle);
            return Err(error);
        }
        debug!(id, kind = %request_kind, "request sent");

        let reply = correlator.wait(handle, timeout).await?;
        reply.into_outcome().map_err(ClientError::from)
    }

    /// Connects now instead of on the first call.
    ///
    /// Clears a remembered authentication or connect failure and tries
    /// again.
    ///
    /// # Errors
    /// Returns the reason no session could be established.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.session().connect().await
    }

    /// Sends a `ping` and returns the round-trip time.
    ///
    /// # Errors
    /// Returns `Codec` if the server answered with something other than
    /// `pong`, or any error of [`Client::call`].
    pub async fn ping(&self) -> Result<Duration, ClientError> {
        let started = Instant::now();
        let reply = self.call(Envelope::new(kind::PING)).await?;
        match reply.get("type").and_then(Value::as_str) {
            Some(kind::PONG) => Ok(started.elapsed()),
            other => Err(ClientError::Codec {
                message: format!("expected pong, got {other:?}"),
            }),
        }
    }

    /// Fetches long-term statistics from the recorder.
    ///
    /// # Errors
    /// Returns `Config` for an invalid query, or any error of
    /// [`Client::call`].
    pub async fn fetch_statistics(&self, query: &StatisticsQuery) -> Result<Value, ClientError> {
        let request = query.to_envelope()?;
        debug!(request = %request.to_value(), "sending statistics request");
        let response = self.call(request).await?;
        debug!(%response, "statistics response");
        Ok(response)
    }

    /// Shuts the client down.
    ///
    /// Pending calls fail with `Shutdown`, the connection is closed and the
    /// reader stops. Later calls fail with `Shutdown`.
    pub async fn shutdown(&self) {
        self.session().shutdown().await;
    }

    /// Returns the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session().state()
    }

    /// Returns a receiver that observes session state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.session().subscribe_state()
    }

    /// Returns a receiver for state changes and server events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.session().subscribe_events()
    }

    /// Returns the number of requests waiting for a reply.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.session().correlator().len()
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        self.session().config()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.config().url)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

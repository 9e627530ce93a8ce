//! Client session management.
//!
//! One [`Session`] owns the lifecycle of the persistent connection: opening
//! it, the authentication handshake, retries with backoff, and tearing it
//! down when the reader reports a loss or the client shuts down.
//!
//! Transitions are serialized by the `transition` lock. Callers that find the
//! session not ready queue on that lock, so a burst of calls during an outage
//! triggers one connect procedure whose outcome they all observe.

use crate::builder::ClientEvent;
use crate::config::ClientConfig;
use crate::correlator::Correlator;
use crate::error::ClientError;
use crate::reader;
use crate::reconnect::ReconnectState;
use crate::state::SessionState;
use bytes::Bytes;
use hassmux_core::{Envelope, kind};
use hassmux_transport::{Connector, FrameReceiver, FrameSender, TransportError};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sending half of the live connection, tagged with its session generation.
struct Writer {
    generation: u64,
    sender: Box<dyn FrameSender>,
}

/// Outcome of a failed connection attempt.
#[derive(Debug)]
enum ConnectError {
    /// Not worth retrying.
    Fatal(ClientError),
    /// Retry after a backoff delay.
    Retry(String),
}

impl From<TransportError> for ConnectError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::InvalidUri { message } => {
                Self::Fatal(ClientError::config(format!("invalid url: {message}")))
            }
            other => Self::Retry(other.to_string()),
        }
    }
}

/// State shared by the client handles and the reader task.
pub(crate) struct Session {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    correlator: Correlator,
    writer: AsyncMutex<Option<Writer>>,
    transition: AsyncMutex<()>,
    state: watch::Sender<SessionState>,
    fatal: Mutex<Option<ClientError>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<ClientEvent>,
    shutdown: CancellationToken,
}

impl Session {
    pub(crate) fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            connector,
            correlator: Correlator::new(),
            writer: AsyncMutex::new(None),
            transition: AsyncMutex::new(()),
            state,
            fatal: Mutex::new(None),
            reader: Mutex::new(None),
            events,
            shutdown: CancellationToken::new(),
        }
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub(crate) fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub(crate) fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub(crate) fn publish(&self, event: ClientEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn set_state(&self, next: SessionState) -> bool {
        let mut previous = next;
        let changed = self.state.send_if_modified(|current| {
            previous = *current;
            if current.can_transition_to(next) {
                *current = next;
                true
            } else {
                false
            }
        });

        if changed {
            debug!(from = %previous, to = %next, "session state changed");
            self.publish(ClientEvent::StateChanged(next));
        } else if previous != next {
            warn!(from = %previous, to = %next, "ignoring invalid state transition");
        }
        changed
    }

    /// Returns the outcome a caller can observe without taking the
    /// transition lock, if there is one.
    fn settled(&self) -> Option<Result<(), ClientError>> {
        if self.shutdown.is_cancelled() {
            return Some(Err(ClientError::Shutdown));
        }
        if self.state().is_ready() {
            return Some(Ok(()));
        }
        self.fatal.lock().clone().map(Err)
    }

    /// Returns once the session is `Ready`, connecting if needed.
    ///
    /// A remembered fatal error is returned without a new attempt.
    pub(crate) async fn ensure_ready(self: &Arc<Self>) -> Result<(), ClientError> {
        if let Some(outcome) = self.settled() {
            return outcome;
        }

        let guard = self.transition.lock().await;
        if let Some(outcome) = self.settled() {
            return outcome;
        }
        self.connect_with_retry(&guard).await
    }

    /// Connects now, clearing any remembered fatal error first.
    pub(crate) async fn connect(self: &Arc<Self>) -> Result<(), ClientError> {
        if self.shutdown.is_cancelled() {
            return Err(ClientError::Shutdown);
        }

        let guard = self.transition.lock().await;
        if self.shutdown.is_cancelled() {
            return Err(ClientError::Shutdown);
        }
        if let Some(previous) = self.fatal.lock().take() {
            debug!(error = %previous, "clearing previous connect failure");
        }
        if self.state().is_ready() {
            return Ok(());
        }
        self.connect_with_retry(&guard).await
    }

    async fn connect_with_retry(
        self: &Arc<Self>,
        _transition: &MutexGuard<'_, ()>,
    ) -> Result<(), ClientError> {
        let mut backoff = ReconnectState::new(self.config.reconnect.clone());

        loop {
            let attempt = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => Err(ConnectError::Fatal(ClientError::Shutdown)),
                result = self.connect_once() => result,
            };

            let message = match attempt {
                Ok(()) => return Ok(()),
                Err(ConnectError::Fatal(error)) => {
                    self.set_state(SessionState::Disconnected);
                    if error != ClientError::Shutdown {
                        error!(%error, "connect failed permanently");
                        *self.fatal.lock() = Some(error.clone());
                    }
                    return Err(error);
                }
                Err(ConnectError::Retry(message)) => message,
            };

            self.set_state(SessionState::Disconnected);
            match backoff.on_failure() {
                Some(delay) => {
                    warn!(
                        attempt = backoff.attempts(),
                        ?delay,
                        error = %message,
                        "connect attempt failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = self.shutdown.cancelled() => return Err(ClientError::Shutdown),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                None => {
                    let error = ClientError::ConnectFailed {
                        attempts: backoff.attempts(),
                        message,
                    };
                    error!(%error, "giving up on connecting");
                    *self.fatal.lock() = Some(error.clone());
                    return Err(error);
                }
            }
        }
    }

    async fn connect_once(self: &Arc<Self>) -> Result<(), ConnectError> {
        let url = self.config.url.as_str();
        self.set_state(SessionState::Connecting);
        debug!(%url, "opening connection");

        let connection =
            match tokio::time::timeout(self.config.connect_timeout, self.connector.open(url)).await
            {
                Ok(result) => result?,
                Err(_) => return Err(TransportError::ConnectTimeout.into()),
            };

        self.set_state(SessionState::Authenticating);
        let (mut sender, mut receiver) = connection.into_split();

        let handshake = tokio::time::timeout(
            self.config.auth_timeout,
            authenticate(
                sender.as_mut(),
                receiver.as_mut(),
                &self.config.access_token,
            ),
        )
        .await
        .unwrap_or_else(|_| Err(ConnectError::Retry("authentication timed out".to_string())));

        if let Err(error) = handshake {
            if let Err(close_error) = sender.close().await {
                debug!(error = %close_error, "close after failed handshake");
            }
            return Err(error);
        }

        let generation = self.correlator.reset();
        *self.writer.lock().await = Some(Writer { generation, sender });
        self.set_state(SessionState::Ready);
        info!(%url, generation, "session ready");

        let handle = tokio::spawn(reader::run(Arc::clone(self), receiver, generation));
        // The previous reader has already returned or is about to.
        drop(self.reader.lock().replace(handle));
        Ok(())
    }

    /// Writes one frame on the connection of `generation`.
    ///
    /// Fails with `ConnectionLost` if that connection has been replaced or
    /// torn down since the request was registered.
    pub(crate) async fn write(&self, generation: u64, frame: Bytes) -> Result<(), ClientError> {
        if self.shutdown.is_cancelled() {
            return Err(ClientError::Shutdown);
        }

        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(writer) if writer.generation == generation => writer
                .sender
                .send(frame)
                .await
                .map_err(|e| ClientError::send(e.to_string())),
            _ => Err(ClientError::ConnectionLost),
        }
    }

    /// Called by the reader of `generation` when its connection ends.
    pub(crate) async fn on_connection_lost(&self, generation: u64) {
        if self.shutdown.is_cancelled() {
            return;
        }

        let writer = {
            let mut slot = self.writer.lock().await;
            if slot.as_ref().is_some_and(|w| w.generation == generation) {
                slot.take()
            } else {
                None
            }
        };
        let Some(mut writer) = writer else {
            debug!(generation, "connection already replaced");
            return;
        };

        // Fail before leaving Ready so no reconnect can register new
        // requests that this drain would catch.
        let failed = self.correlator.fail_all(ClientError::ConnectionLost);
        self.set_state(SessionState::Disconnected);
        warn!(generation, failed, "connection lost");

        if let Err(error) = writer.sender.close().await {
            debug!(%error, "close after connection loss");
        }
    }

    /// Stops the reader, closes the connection and fails every pending call.
    pub(crate) async fn shutdown(&self) {
        if self.shutdown.is_cancelled() && self.state() == SessionState::Disconnected {
            return;
        }
        self.shutdown.cancel();

        let guard = self.transition.lock().await;
        self.set_state(SessionState::Closing);
        *self.fatal.lock() = Some(ClientError::Shutdown);

        let writer = self.writer.lock().await.take();
        let failed = self.correlator.fail_all(ClientError::Shutdown);
        if let Some(mut writer) = writer {
            if let Err(error) = writer.sender.close().await {
                debug!(%error, "close during shutdown");
            }
        }
        let reader = self.reader.lock().take();
        drop(guard);

        if let Some(reader) = reader {
            if let Err(error) = reader.await {
                warn!(%error, "reader task ended abnormally");
            }
        }
        self.set_state(SessionState::Disconnected);
        info!(failed, "client shut down");
    }

    /// Signals the reader to stop without waiting for it.
    pub(crate) fn cancel(&self) {
        self.shutdown.cancel();
    }
}

/// Runs the authentication handshake on a freshly opened connection.
async fn authenticate(
    sender: &mut dyn FrameSender,
    receiver: &mut dyn FrameReceiver,
    access_token: &str,
) -> Result<(), ConnectError> {
    let frame = Envelope::auth(access_token)
        .encode()
        .map_err(|e| ConnectError::Fatal(e.into()))?;
    sender.send(frame).await?;

    loop {
        let Some(frame) = receiver.recv().await? else {
            return Err(ConnectError::Retry(
                "connection closed during authentication".to_string(),
            ));
        };

        let envelope = match Envelope::decode(&frame) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(%error, "ignoring malformed frame during authentication");
                continue;
            }
        };

        match envelope.kind.as_str() {
            kind::AUTH_REQUIRED => {
                let version = envelope.field("ha_version").and_then(Value::as_str);
                debug!(server_version = ?version, "server requested authentication");
            }
            kind::AUTH_OK => return Ok(()),
            kind::AUTH_INVALID => {
                let message = envelope
                    .field("message")
                    .and_then(Value::as_str)
                    .unwrap_or("invalid access token")
                    .to_string();
                return Err(ConnectError::Fatal(ClientError::AuthRejected { message }));
            }
            other => {
                return Err(ConnectError::Retry(format!(
                    "unexpected {other} frame during authentication"
                )));
            }
        }
    }
}

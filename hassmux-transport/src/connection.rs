//! Collaborator interface between the client and a transport.
//!
//! A [`Connector`] opens a [`Connection`] to a URI. The connection is ordered
//! and bidirectional; it is split into a [`FrameSender`] shared by callers and
//! a [`FrameReceiver`] owned by a single reader task.

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;

/// Sending half of a connection.
#[async_trait]
pub trait FrameSender: Send {
    /// Writes one frame.
    ///
    /// # Errors
    /// Returns `TransportError` if the frame could not be written.
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError>;

    /// Closes the connection from this side.
    ///
    /// # Errors
    /// Returns `TransportError` if the close handshake fails.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Receiving half of a connection.
#[async_trait]
pub trait FrameReceiver: Send {
    /// Waits for the next frame.
    ///
    /// # Returns
    /// `Ok(Some(frame))` if a frame was received, `Ok(None)` if the
    /// connection closed.
    ///
    /// # Errors
    /// Returns `TransportError` if the read fails.
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// Opens connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a connection to `uri`.
    ///
    /// # Errors
    /// Returns `TransportError` if the connection cannot be established.
    async fn open(&self, uri: &str) -> Result<Connection, TransportError>;
}

/// An open connection.
pub struct Connection {
    sender: Box<dyn FrameSender>,
    receiver: Box<dyn FrameReceiver>,
}

impl Connection {
    /// Creates a connection from its two halves.
    pub fn new(
        sender: impl FrameSender + 'static,
        receiver: impl FrameReceiver + 'static,
    ) -> Self {
        Self {
            sender: Box::new(sender),
            receiver: Box::new(receiver),
        }
    }

    /// Writes one frame.
    ///
    /// # Errors
    /// Returns `TransportError` if the frame could not be written.
    pub async fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        self.sender.send(frame).await
    }

    /// Waits for the next frame, `None` once the connection closed.
    ///
    /// # Errors
    /// Returns `TransportError` if the read fails.
    pub async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        self.receiver.recv().await
    }

    /// Closes the connection.
    ///
    /// # Errors
    /// Returns `TransportError` if the close handshake fails.
    pub async fn close(mut self) -> Result<(), TransportError> {
        self.sender.close().await
    }

    /// Splits the connection into its sending and receiving halves.
    #[must_use]
    pub fn into_split(self) -> (Box<dyn FrameSender>, Box<dyn FrameReceiver>) {
        (self.sender, self.receiver)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

//! In-process loopback transport.
//!
//! [`MemoryConnector`] hands the far end of every connection it opens to a
//! [`MemoryListener`], so a test can play the server side of the protocol
//! without sockets. Dropping the [`MemoryPeer`] closes the connection.

use crate::connection::{Connection, Connector, FrameReceiver, FrameSender};
use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Default per-direction frame queue depth.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Opens in-memory connections.
///
/// Clones share the listener and the attempt counters.
#[derive(Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    capacity: usize,
    refuse: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Creates a connector and the listener receiving its connections.
    #[must_use]
    pub fn new() -> (Self, MemoryListener) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a connector with a custom frame queue depth.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, MemoryListener) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let connector = Self {
            accept_tx,
            capacity: capacity.max(1),
            refuse: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(AtomicUsize::new(0)),
        };
        (connector, MemoryListener { accept_rx })
    }

    /// Makes the next `count` calls to `open` fail with connection refused.
    pub fn refuse_next(&self, count: usize) {
        self.refuse.store(count, Ordering::SeqCst);
    }

    /// Returns the number of `open` calls seen, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn take_refusal(&self) -> bool {
        self.refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, uri: &str) -> Result<Connection, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if self.take_refusal() {
            return Err(TransportError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )));
        }

        let (client_tx, server_rx) = mpsc::channel(self.capacity);
        let (server_tx, client_rx) = mpsc::channel(self.capacity);

        let peer = MemoryPeer {
            uri: uri.to_string(),
            tx: server_tx,
            rx: server_rx,
        };
        self.accept_tx.send(peer).map_err(|_| {
            TransportError::Io(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            ))
        })?;

        Ok(Connection::new(
            MemorySender {
                tx: Some(client_tx),
            },
            MemoryReceiver { rx: client_rx },
        ))
    }
}

/// Receives the server side of connections opened by a [`MemoryConnector`].
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
    /// Waits for the next connection, `None` once the connector is dropped.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }
}

/// Server side of an in-memory connection.
pub struct MemoryPeer {
    uri: String,
    tx: mpsc::Sender<Bytes>,
    rx: mpsc::Receiver<Bytes>,
}

impl MemoryPeer {
    /// Returns the URI the client opened.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Receives the next frame written by the client, `None` once it closed.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Sends a frame to the client.
    ///
    /// # Errors
    /// Returns `TransportError::ConnectionClosed` if the client side is gone.
    pub async fn send(&self, frame: impl Into<Bytes>) -> Result<(), TransportError> {
        self.tx
            .send(frame.into())
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Closes the connection from the server side.
    pub fn close(self) {}
}

/// Client sending half of an in-memory connection.
pub struct MemorySender {
    tx: Option<mpsc::Sender<Bytes>>,
}

#[async_trait]
impl FrameSender for MemorySender {
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::ConnectionClosed)?;
        tx.send(frame)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

/// Client receiving half of an in-memory connection.
pub struct MemoryReceiver {
    rx: mpsc::Receiver<Bytes>,
}

#[async_trait]
impl FrameReceiver for MemoryReceiver {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

//! WebSocket client implementation.

use crate::connection::{Connection, Connector, FrameReceiver, FrameSender};
use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Configuration for the WebSocket connector.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Timeout for the TCP connect and the WebSocket upgrade together.
    pub connect_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl WsConfig {
    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Opens WebSocket connections.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    config: WsConfig,
}

impl WsConnector {
    /// Creates a connector with the given configuration.
    #[must_use]
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, uri: &str) -> Result<Connection, TransportError> {
        let (stream, _response) = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(uri),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout)??;

        tracing::debug!(uri, "websocket connected");

        let (sink, stream) = stream.split();
        Ok(Connection::new(WsSender { sink }, WsReceiver { stream }))
    }
}

/// Sending half of a WebSocket connection.
pub struct WsSender {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSender for WsSender {
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        let text = std::str::from_utf8(&frame)
            .map_err(|e| TransportError::invalid_frame(format!("frame is not UTF-8: {e}")))?;
        self.sink.send(Message::text(text.to_owned())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.sink.close().await {
            Ok(()) => Ok(()),
            Err(e) => match TransportError::from(e) {
                TransportError::ConnectionClosed => Ok(()),
                other => Err(other),
            },
        }
    }
}

/// Receiving half of a WebSocket connection.
pub struct WsReceiver {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameReceiver for WsReceiver {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    return Ok(Some(Bytes::copy_from_slice(text.as_bytes())));
                }
                Ok(Message::Binary(data)) => return Ok(Some(data)),
                Ok(Message::Close(frame)) => {
                    tracing::debug!(?frame, "websocket closed by peer");
                    return Ok(None);
                }
                // Control frames are answered by tungstenite itself.
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => {
                    return match TransportError::from(e) {
                        TransportError::ConnectionClosed => Ok(None),
                        other => Err(other),
                    };
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_config_default() {
        let config = WsConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_ws_config_builder() {
        let config = WsConfig::default().connect_timeout(Duration::from_secs(10));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = WsConnector::default();
        let result = connector.open(&format!("ws://{addr}/api/websocket")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalid_uri() {
        let connector = WsConnector::default();
        let result = connector.open("not a uri").await;
        assert!(result.is_err());
    }
}

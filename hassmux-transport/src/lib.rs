//! # hassmux Transport
//!
//! Connection layer for the hassmux client.
//!
//! This crate provides:
//! - [`connection`] - The [`Connector`] / [`FrameSender`] / [`FrameReceiver`]
//!   traits the client is written against
//! - [`ws`] - WebSocket transport (tokio-tungstenite)
//! - [`memory`] - In-process loopback transport for tests and demos

pub mod connection;
pub mod error;
pub mod memory;
#[cfg(feature = "websocket")]
pub mod ws;

pub use connection::{Connection, Connector, FrameReceiver, FrameSender};
pub use error::TransportError;
pub use memory::{MemoryConnector, MemoryListener, MemoryPeer};
#[cfg(feature = "websocket")]
pub use ws::{WsConfig, WsConnector};

//! WebSocket transport module.
//!
//! Carries one JSON envelope per text frame over tokio-tungstenite.

pub mod client;

pub use client::{WsConfig, WsConnector, WsReceiver, WsSender};

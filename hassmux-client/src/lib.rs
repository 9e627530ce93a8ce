//! # hassmux Client
//!
//! Multiplexed request/response client for the Home Assistant WebSocket API.
//!
//! One persistent connection is shared by any number of concurrent callers.
//! Each request gets a correlation id; a background reader matches replies
//! back to the caller waiting on that id, in any order.
//!
//! This crate provides:
//! - [`Client`] - The `call` facade and lifecycle operations
//! - [`ClientBuilder`] - Client configuration
//! - [`Correlator`] - Request id allocation and reply matching
//! - Session management with authentication and automatic reconnection
//! - [`recorder`] - Long-term statistics queries

pub mod builder;
pub mod client;
pub mod config;
pub mod correlator;
pub mod error;
pub mod reconnect;
pub mod recorder;
pub mod state;

mod reader;
mod session;

pub use builder::{ClientBuilder, ClientEvent};
pub use client::Client;
pub use config::ClientConfig;
pub use correlator::{Correlator, PendingHandle};
pub use error::ClientError;
pub use reconnect::{ReconnectConfig, ReconnectState};
pub use recorder::{StatisticType, StatisticsPeriod, StatisticsQuery};
pub use state::SessionState;

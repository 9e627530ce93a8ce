//! # hassmux
//!
//! Multiplexed request/response client for the Home Assistant WebSocket API.
//!
//! One persistent connection is shared by any number of concurrent callers.
//! Every request is tagged with a fresh id; replies are matched back to the
//! caller waiting on that id, in whatever order the server sends them.
//!
//! ## Features
//!
//! - **Concurrent calls** - Callers wait only on their own reply
//! - **Per-call timeouts** - A timed-out call never affects the others
//! - **Reconnection** - Exponential backoff, fresh id space per session
//! - **Pluggable transport** - WebSocket, or in-memory for tests
//!
//! ## Quick Start
//!
//! ```no_run
//! use hassmux::prelude::*;
//!
//! # async fn demo() -> Result<(), ClientError> {
//! let client = ClientBuilder::from_config(ClientConfig::from_env()?).build();
//!
//! let config = client.call(Envelope::new("get_config")).await?;
//! println!("{}", config["version"]);
//!
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Message envelope and codec
//! - [`transport`] - Connection traits, WebSocket and in-memory transports
//! - [`client`] - Correlator, session and the `call` facade

pub mod prelude;

/// Message envelope and codec.
pub mod core {
    pub use hassmux_core::*;
}

/// Connection layer.
pub mod transport {
    pub use hassmux_transport::*;
}

/// Client engine.
pub mod client {
    pub use hassmux_client::*;
}

// Re-export commonly used items at the crate root
pub use hassmux_client::{Client, ClientBuilder, ClientConfig, ClientError};
pub use hassmux_core::Envelope;

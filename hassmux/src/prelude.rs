//! Prelude module for convenient imports.
//!
//! ```ignore
//! use hassmux::prelude::*;
//! ```

// Core types
pub use hassmux_core::{CodecError, Envelope, ServerFailure, kind};

// Transport types
pub use hassmux_transport::{
    Connector, MemoryConnector, MemoryListener, MemoryPeer, TransportError,
};
#[cfg(feature = "websocket")]
pub use hassmux_transport::{WsConfig, WsConnector};

// Client types
pub use hassmux_client::{
    Client, ClientBuilder, ClientConfig, ClientError, ClientEvent, ReconnectConfig, SessionState,
    StatisticType, StatisticsPeriod, StatisticsQuery,
};

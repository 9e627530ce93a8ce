//! # hassmux Core
//!
//! Wire model shared by the hassmux crates.
//!
//! This crate provides:
//! - [`envelope`] - The tagged JSON message exchanged over the connection
//! - [`kind`] - Well-known message kinds of the Home Assistant WebSocket API
//! - [`error`] - Codec error types

pub mod envelope;
pub mod error;
pub mod kind;

pub use envelope::{Envelope, ServerFailure};
pub use error::{CodecError, Result};

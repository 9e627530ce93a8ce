//! Background task draining the receiving half of a connection.

use crate::builder::ClientEvent;
use crate::session::Session;
use futures::future::BoxFuture;
use hassmux_core::Envelope;
use hassmux_transport::FrameReceiver;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Runs the reader for the connection of `generation`.
///
/// Replies are routed to the correlator, events and id-less frames go to the
/// event channel. When the connection ends the session is told, and the
/// reader drives the reconnect if the client asks for it.
pub(crate) fn run(
    session: Arc<Session>,
    mut receiver: Box<dyn FrameReceiver>,
    generation: u64,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let shutdown = session.shutdown_token();

        loop {
            let next = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    debug!(generation, "reader stopped");
                    return;
                }
                next = receiver.recv() => next,
            };

            match next {
                Ok(Some(frame)) => dispatch(&session, &frame),
                Ok(None) => {
                    debug!(generation, "connection closed by peer");
                    break;
                }
                Err(error) if error.is_closed() => {
                    debug!(generation, %error, "connection reset by peer");
                    break;
                }
                Err(error) => {
                    warn!(generation, %error, "receive failed");
                    break;
                }
            }
        }

        drop(receiver);
        session.on_connection_lost(generation).await;

        if !session.config().auto_reconnect {
            return;
        }
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {}
            result = session.ensure_ready() => {
                if let Err(error) = result {
                    error!(%error, "automatic reconnect failed");
                }
            }
        }
    })
}

fn dispatch(session: &Session, frame: &[u8]) {
    let envelope = match Envelope::decode(frame) {
        Ok(envelope) => envelope,
        Err(error) => {
            warn!(%error, len = frame.len(), "dropping malformed frame");
            return;
        }
    };

    if envelope.is_auth_phase() {
        debug!(kind = %envelope.kind, "dropping authentication frame after handshake");
        return;
    }

    match envelope.id {
        Some(id) if !envelope.is_event() => {
            session.correlator().resolve(id, envelope);
        }
        _ => session.publish(ClientEvent::Message(envelope)),
    }
}

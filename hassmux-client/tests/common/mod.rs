//! Scripted Home Assistant server on top of the in-memory transport.

#![allow(dead_code)]

use hassmux_client::{Client, ClientBuilder};
use hassmux_core::Envelope;
use hassmux_transport::{MemoryConnector, MemoryListener, MemoryPeer};
use serde_json::{Value, json};
use std::time::Duration;

pub const TOKEN: &str = "test-token";

/// Builder wired to `connector` with short retry delays.
pub fn builder(connector: MemoryConnector) -> ClientBuilder {
    ClientBuilder::new("memory://homeassistant/api/websocket", TOKEN)
        .connector(connector)
        .reconnect_delay(Duration::from_millis(10))
        .max_reconnect_delay(Duration::from_millis(100))
}

pub fn client(connector: MemoryConnector) -> Client {
    builder(connector).build()
}

/// Reads and decodes the next frame the client wrote.
pub async fn next_envelope(peer: &mut MemoryPeer) -> Envelope {
    let frame = peer.recv().await.expect("client closed the connection");
    Envelope::decode(&frame).expect("client wrote a malformed frame")
}

pub async fn send_json(peer: &MemoryPeer, value: Value) {
    peer.send(value.to_string()).await.expect("client is gone");
}

/// Accepts the next connection and completes the handshake with `auth_ok`.
pub async fn accept_authenticated(listener: &mut MemoryListener) -> MemoryPeer {
    let mut peer = listener.accept().await.expect("no connection attempt");
    send_json(&peer, json!({"type": "auth_required", "ha_version": "2024.6.0"})).await;

    let auth = next_envelope(&mut peer).await;
    assert_eq!(auth.kind, "auth");
    assert_eq!(auth.field("access_token"), Some(&json!(TOKEN)));

    send_json(&peer, json!({"type": "auth_ok", "ha_version": "2024.6.0"})).await;
    peer
}

/// Accepts the next connection and rejects its token.
pub async fn accept_rejected(listener: &mut MemoryListener) -> MemoryPeer {
    let mut peer = listener.accept().await.expect("no connection attempt");
    send_json(&peer, json!({"type": "auth_required"})).await;
    let auth = next_envelope(&mut peer).await;
    assert_eq!(auth.kind, "auth");
    send_json(
        &peer,
        json!({"type": "auth_invalid", "message": "Invalid access token or password"}),
    )
    .await;
    peer
}

pub async fn send_result(peer: &MemoryPeer, id: u64, result: Value) {
    send_json(
        peer,
        json!({"id": id, "type": "result", "success": true, "result": result}),
    )
    .await;
}

pub async fn send_error(peer: &MemoryPeer, id: u64, code: &str, message: &str) {
    send_json(
        peer,
        json!({
            "id": id,
            "type": "result",
            "success": false,
            "error": {"code": code, "message": message},
        }),
    )
    .await;
}

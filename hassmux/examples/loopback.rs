//! Runs the client against a scripted server on the in-memory transport.
//!
//! The server answers requests in reverse order to show replies being
//! matched by id, then drops the connection to show the reconnect.
//!
//! Run with: `cargo run --example loopback`

use hassmux::prelude::*;
use serde_json::json;
use std::time::Duration;

async fn serve(mut listener: MemoryListener) -> anyhow::Result<()> {
    while let Some(mut peer) = listener.accept().await {
        peer.send(json!({"type": "auth_required"}).to_string()).await?;
        let Some(frame) = peer.recv().await else {
            continue;
        };
        let auth = Envelope::decode(&frame)?;
        println!("[Server] {} from {}", auth.kind, peer.uri());
        peer.send(json!({"type": "auth_ok"}).to_string()).await?;

        // Collect a batch, then answer it backwards.
        let mut batch = Vec::new();
        while batch.len() < 3 {
            let Some(frame) = peer.recv().await else {
                break;
            };
            batch.push(Envelope::decode(&frame)?);
        }
        for request in batch.iter().rev() {
            let reply = json!({
                "id": request.id,
                "type": "result",
                "success": true,
                "result": {"echo": request.field("entity_id")},
            });
            peer.send(reply.to_string()).await?;
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        println!("[Server] dropping connection");
        peer.close();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (connector, listener) = MemoryConnector::new();
    let server = tokio::spawn(serve(listener));

    let client = ClientBuilder::new("memory://loopback/api/websocket", "demo-token")
        .connector(connector)
        .reconnect_delay(Duration::from_millis(20))
        .build();

    let mut events = client.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let ClientEvent::StateChanged(state) = event {
                println!("[Client] state: {state}");
            }
        }
    });

    for round in 1..=2 {
        let calls = ["sensor.a", "sensor.b", "sensor.c"].map(|entity| {
            let client = client.clone();
            async move {
                let request = Envelope::new("get_state").with_field("entity_id", entity);
                (entity, client.call(request).await)
            }
        });
        let [a, b, c] = calls;
        let results = tokio::join!(a, b, c);
        for (entity, result) in [results.0, results.1, results.2] {
            println!("[Client] round {round}: {entity} -> {}", result?);
        }

        let mut state = client.subscribe_state();
        state.wait_for(|s| !s.is_ready()).await?;
    }

    client.shutdown().await;
    server.abort();
    Ok(())
}

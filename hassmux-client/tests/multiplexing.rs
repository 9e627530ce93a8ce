mod common;

use async_trait::async_trait;
use bytes::Bytes;
use common::{accept_authenticated, client, next_envelope, send_error, send_json, send_result};
use hassmux_client::{ClientBuilder, ClientError, ClientEvent, SessionState, StatisticsQuery};
use hassmux_core::Envelope;
use hassmux_transport::{
    Connection, Connector, FrameReceiver, FrameSender, MemoryConnector, TransportError,
};
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

/// Memory connector whose sending half fails after the `auth` frame.
struct FailingWrites {
    inner: MemoryConnector,
}

struct FailAfterAuth {
    inner: Box<dyn FrameSender>,
    sent: usize,
}

#[async_trait]
impl FrameSender for FailAfterAuth {
    async fn send(&mut self, frame: Bytes) -> Result<(), TransportError> {
        if self.sent > 0 {
            return Err(TransportError::ConnectionClosed);
        }
        self.sent += 1;
        self.inner.send(frame).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close().await
    }
}

struct Receiver(Box<dyn FrameReceiver>);

#[async_trait]
impl FrameReceiver for Receiver {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        self.0.recv().await
    }
}

#[async_trait]
impl Connector for FailingWrites {
    async fn open(&self, uri: &str) -> Result<Connection, TransportError> {
        let (sender, receiver) = self.inner.open(uri).await?.into_split();
        Ok(Connection::new(
            FailAfterAuth {
                inner: sender,
                sent: 0,
            },
            Receiver(receiver),
        ))
    }
}

#[tokio::test]
async fn test_concurrent_calls_resolved_out_of_order() {
    let (connector, mut listener) = MemoryConnector::new();
    let client = client(connector);

    let server = tokio::spawn(async move {
        let mut peer = accept_authenticated(&mut listener).await;
        let mut requests = Vec::new();
        for _ in 0..3 {
            requests.push(next_envelope(&mut peer).await);
        }
        let ids: HashSet<u64> = requests.iter().filter_map(|r| r.id).collect();

        // Answer in reverse order, echoing the entity each request asked for.
        for request in requests.iter().rev() {
            let entity = request.field("entity_id").cloned().unwrap();
            send_result(&peer, request.id.unwrap(), json!({"entity_id": entity})).await;
        }
        (ids, peer)
    });

    let call = |entity: &str| {
        let client = client.clone();
        let request = Envelope::new("get_state").with_field("entity_id", entity);
        async move { client.call(request).await }
    };
    let (a, b, c) = tokio::join!(call("sensor.a"), call("sensor.b"), call("sensor.c"));

    assert_eq!(a.unwrap(), json!({"entity_id": "sensor.a"}));
    assert_eq!(b.unwrap(), json!({"entity_id": "sensor.b"}));
    assert_eq!(c.unwrap(), json!({"entity_id": "sensor.c"}));

    let (ids, _peer) = server.await.unwrap();
    assert_eq!(ids, HashSet::from([1, 2, 3]));
    assert_eq!(client.pending(), 0);
}

#[tokio::test]
async fn test_unmatched_reply_is_harmless() {
    let (connector, mut listener) = MemoryConnector::new();
    let client = client(connector);

    let server = tokio::spawn(async move {
        let mut peer = accept_authenticated(&mut listener).await;
        let request = next_envelope(&mut peer).await;
        send_result(&peer, 99, json!("nobody asked")).await;
        send_result(&peer, request.id.unwrap(), json!("ok")).await;
        peer
    });

    let value = client.call(Envelope::new("get_config")).await.unwrap();
    assert_eq!(value, json!("ok"));
    assert_eq!(client.state(), SessionState::Ready);

    let _peer = server.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_timeout_removes_entry_and_late_reply_is_ignored() {
    let (connector, mut listener) = MemoryConnector::new();
    let client = client(connector);

    let slow = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .call_with_timeout(Envelope::new("get_states"), Duration::from_secs(2))
                .await
        }
    });

    let mut peer = accept_authenticated(&mut listener).await;
    let request = next_envelope(&mut peer).await;
    assert_eq!(request.id, Some(1));

    assert_eq!(
        slow.await.unwrap(),
        Err(ClientError::Timeout {
            id: 1,
            timeout: Duration::from_secs(2)
        })
    );
    assert_eq!(client.pending(), 0);

    send_result(&peer, 1, json!("too late")).await;

    let next = tokio::spawn({
        let client = client.clone();
        async move { client.call(Envelope::new("get_states")).await }
    });
    let request = next_envelope(&mut peer).await;
    assert_eq!(request.id, Some(2));
    send_result(&peer, 2, json!(["light.kitchen"])).await;

    assert_eq!(next.await.unwrap().unwrap(), json!(["light.kitchen"]));
    assert_eq!(client.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_server_failure_maps_to_error() {
    let (connector, mut listener) = MemoryConnector::new();
    let client = client(connector);

    let server = tokio::spawn(async move {
        let mut peer = accept_authenticated(&mut listener).await;
        let request = next_envelope(&mut peer).await;
        send_error(&peer, request.id.unwrap(), "not_found", "Entity not found").await;
        peer
    });

    let result = client
        .call(Envelope::new("get_state").with_field("entity_id", "sensor.missing"))
        .await;
    assert_eq!(
        result,
        Err(ClientError::Server {
            code: "not_found".to_string(),
            message: "Entity not found".to_string(),
        })
    );

    let _peer = server.await.unwrap();
}

#[tokio::test]
async fn test_success_without_payload_is_null() {
    let (connector, mut listener) = MemoryConnector::new();
    let client = client(connector);

    let server = tokio::spawn(async move {
        let mut peer = accept_authenticated(&mut listener).await;
        let request = next_envelope(&mut peer).await;
        assert_eq!(request.field("domain"), Some(&json!("light")));
        send_json(
            &peer,
            json!({"id": request.id, "type": "result", "success": true}),
        )
        .await;
        peer
    });

    let request = Envelope::new("call_service")
        .with_field("domain", "light")
        .with_field("service", "turn_on");
    assert_eq!(client.call(request).await.unwrap(), serde_json::Value::Null);

    let _peer = server.await.unwrap();
}

#[tokio::test]
async fn test_malformed_frames_and_events_do_not_resolve_calls() {
    let (connector, mut listener) = MemoryConnector::new();
    let client = client(connector);
    let mut events = client.events();

    let server = tokio::spawn(async move {
        let mut peer = accept_authenticated(&mut listener).await;
        let request = next_envelope(&mut peer).await;
        let id = request.id.unwrap();

        peer.send("this is not json").await.unwrap();
        send_json(&peer, json!({"id": 7})).await;
        // Subscription events reuse the subscribing request's id.
        send_json(
            &peer,
            json!({"id": id, "type": "event", "event": {"event_type": "state_changed"}}),
        )
        .await;
        send_json(&peer, json!({"type": "auth_ok"})).await;
        send_result(&peer, id, json!("done")).await;
        peer
    });

    assert_eq!(
        client.call(Envelope::new("subscribe_events")).await.unwrap(),
        json!("done")
    );

    let event = loop {
        match events.recv().await.unwrap() {
            ClientEvent::Message(envelope) => break envelope,
            ClientEvent::StateChanged(_) => {}
        }
    };
    assert_eq!(event.kind, "event");
    assert_eq!(
        event.field("event"),
        Some(&json!({"event_type": "state_changed"}))
    );

    let _peer = server.await.unwrap();
}

#[tokio::test]
async fn test_ping() {
    let (connector, mut listener) = MemoryConnector::new();
    let client = client(connector);

    let server = tokio::spawn(async move {
        let mut peer = accept_authenticated(&mut listener).await;
        let request = next_envelope(&mut peer).await;
        assert_eq!(request.kind, "ping");
        send_json(&peer, json!({"id": request.id, "type": "pong"})).await;
        peer
    });

    assert!(client.ping().await.is_ok());
    let _peer = server.await.unwrap();
}

#[tokio::test]
async fn test_fetch_statistics() {
    use chrono::{TimeZone, Utc};

    let (connector, mut listener) = MemoryConnector::new();
    let client = client(connector);

    let server = tokio::spawn(async move {
        let mut peer = accept_authenticated(&mut listener).await;
        let request = next_envelope(&mut peer).await;
        assert_eq!(request.kind, "recorder/statistics_during_period");
        assert_eq!(
            request.field("statistic_ids"),
            Some(&json!(["sensor.energy"]))
        );
        assert_eq!(request.field("period"), Some(&json!("hour")));
        assert_eq!(request.field("types"), Some(&json!(["mean", "state"])));
        send_result(
            &peer,
            request.id.unwrap(),
            json!({"sensor.energy": [{"start": 1709251200000u64, "mean": 1.5, "state": 42.0}]}),
        )
        .await;
        peer
    });

    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let query = StatisticsQuery::new(["sensor.energy"], start)
        .end_time(Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap());
    let statistics = client.fetch_statistics(&query).await.unwrap();
    assert_eq!(statistics["sensor.energy"][0]["mean"], json!(1.5));

    let _peer = server.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_fails_pending_calls() {
    let (connector, mut listener) = MemoryConnector::new();
    let client = client(connector);

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.call(Envelope::new("get_states")).await }
    });

    let mut peer = accept_authenticated(&mut listener).await;
    let _request = next_envelope(&mut peer).await;

    client.shutdown().await;
    assert_eq!(pending.await.unwrap(), Err(ClientError::Shutdown));
    assert_eq!(client.state(), SessionState::Disconnected);
    assert!(peer.recv().await.is_none());

    assert_eq!(
        client.call(Envelope::new("get_states")).await,
        Err(ClientError::Shutdown)
    );
    assert_eq!(client.connect().await, Err(ClientError::Shutdown));
}

#[tokio::test]
async fn test_failed_write_rolls_back_registration() {
    let (connector, mut listener) = MemoryConnector::new();
    let client = ClientBuilder::new("memory://homeassistant/api/websocket", common::TOKEN)
        .connector(FailingWrites { inner: connector })
        .build();

    let server = tokio::spawn(async move { accept_authenticated(&mut listener).await });

    let result = client.call(Envelope::new("get_states")).await;
    assert!(
        matches!(result, Err(ClientError::Send { .. })),
        "expected Send error, got {result:?}"
    );
    assert_eq!(client.pending(), 0);
    assert_eq!(client.state(), SessionState::Ready);

    let _peer = server.await.unwrap();
}

mod common;

use common::{accept_authenticated, accept_rejected, builder, client, next_envelope, send_result};
use hassmux_client::{ClientError, SessionState};
use hassmux_core::Envelope;
use hassmux_transport::MemoryConnector;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_connection_loss_fails_every_pending_call() {
    let (connector, mut listener) = MemoryConnector::new();
    let client = builder(connector).auto_reconnect(false).build();
    let mut state = client.subscribe_state();

    let calls: Vec<_> = (0..3)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.call(Envelope::new("get_states")).await })
        })
        .collect();

    let mut peer = accept_authenticated(&mut listener).await;
    for _ in 0..3 {
        next_envelope(&mut peer).await;
    }
    assert_eq!(client.pending(), 3);

    peer.close();
    for call in calls {
        assert_eq!(call.await.unwrap(), Err(ClientError::ConnectionLost));
    }
    state
        .wait_for(|s| *s == SessionState::Disconnected)
        .await
        .unwrap();
    assert_eq!(client.pending(), 0);

    // The next call reconnects, and ids start over on the new session.
    let next = tokio::spawn({
        let client = client.clone();
        async move { client.call(Envelope::new("get_config")).await }
    });
    let mut peer = accept_authenticated(&mut listener).await;
    let request = next_envelope(&mut peer).await;
    assert_eq!(request.id, Some(1));
    send_result(&peer, 1, json!({"version": "2024.6.0"})).await;

    assert_eq!(
        next.await.unwrap().unwrap(),
        json!({"version": "2024.6.0"})
    );
}

#[tokio::test]
async fn test_automatic_reconnect_after_loss() {
    let (connector, mut listener) = MemoryConnector::new();
    let attempts = connector.clone();
    let client = client(connector);

    let connect = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    let peer = accept_authenticated(&mut listener).await;
    assert_eq!(connect.await.unwrap(), Ok(()));
    peer.close();

    // The reader reconnects on its own.
    let mut peer = accept_authenticated(&mut listener).await;
    let mut state = client.subscribe_state();
    state.wait_for(|s| s.is_ready()).await.unwrap();
    assert_eq!(attempts.attempts(), 2);

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call(Envelope::new("get_states")).await }
    });
    let request = next_envelope(&mut peer).await;
    assert_eq!(request.id, Some(1));
    send_result(&peer, 1, json!([])).await;
    assert_eq!(call.await.unwrap().unwrap(), json!([]));
}

#[tokio::test]
async fn test_auth_rejected_is_not_retried() {
    let (connector, mut listener) = MemoryConnector::new();
    let attempts = connector.clone();
    let client = client(connector);

    let first = tokio::spawn({
        let client = client.clone();
        async move { client.call(Envelope::new("get_states")).await }
    });
    let _rejected = accept_rejected(&mut listener).await;

    let expected = ClientError::AuthRejected {
        message: "Invalid access token or password".to_string(),
    };
    assert_eq!(first.await.unwrap(), Err(expected.clone()));
    assert_eq!(client.state(), SessionState::Disconnected);

    // Remembered: later calls fail fast without dialing again.
    assert_eq!(
        client.call(Envelope::new("get_states")).await,
        Err(expected)
    );
    assert_eq!(attempts.attempts(), 1);

    // An explicit connect clears it.
    let connect = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    let _peer = accept_authenticated(&mut listener).await;
    assert_eq!(connect.await.unwrap(), Ok(()));
    assert_eq!(client.state(), SessionState::Ready);
    assert_eq!(attempts.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhausted() {
    let (connector, _listener) = MemoryConnector::new();
    connector.refuse_next(usize::MAX);
    let attempts = connector.clone();
    let client = builder(connector).max_reconnect_attempts(3).build();

    let result = client.call(Envelope::new("get_states")).await;
    match result {
        Err(ClientError::ConnectFailed { attempts: 3, .. }) => {}
        other => panic!("expected ConnectFailed after 3 attempts, got {other:?}"),
    }
    assert_eq!(attempts.attempts(), 3);

    // The failure is remembered.
    assert!(matches!(
        client.call(Envelope::new("get_states")).await,
        Err(ClientError::ConnectFailed { .. })
    ));
    assert_eq!(attempts.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_refused_attempts() {
    let (connector, mut listener) = MemoryConnector::new();
    connector.refuse_next(2);
    let attempts = connector.clone();
    let client = builder(connector).max_reconnect_attempts(5).build();

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call(Envelope::new("get_config")).await }
    });

    let mut peer = accept_authenticated(&mut listener).await;
    let request = next_envelope(&mut peer).await;
    send_result(&peer, request.id.unwrap(), json!({"state": "RUNNING"})).await;

    assert_eq!(call.await.unwrap().unwrap(), json!({"state": "RUNNING"}));
    assert_eq!(attempts.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_timeout_is_retried() {
    let (connector, mut listener) = MemoryConnector::new();
    let client = builder(connector)
        .auth_timeout(Duration::from_secs(1))
        .max_reconnect_attempts(2)
        .build();

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call(Envelope::new("get_states")).await }
    });

    // First server never answers the auth message.
    let _silent = listener.accept().await.unwrap();
    let mut peer = accept_authenticated(&mut listener).await;
    let request = next_envelope(&mut peer).await;
    send_result(&peer, request.id.unwrap(), json!("ok")).await;

    assert_eq!(call.await.unwrap().unwrap(), json!("ok"));
}

#[tokio::test]
async fn test_concurrent_callers_share_one_connect() {
    let (connector, mut listener) = MemoryConnector::new();
    let attempts = connector.clone();
    let client = client(connector);

    let calls: Vec<_> = (0..5)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.call(Envelope::new("get_states")).await })
        })
        .collect();

    let mut peer = accept_authenticated(&mut listener).await;
    for _ in 0..5 {
        let request = next_envelope(&mut peer).await;
        send_result(&peer, request.id.unwrap(), json!(request.id)).await;
    }
    for call in calls {
        assert!(call.await.unwrap().is_ok());
    }
    assert_eq!(attempts.attempts(), 1);
}

#[tokio::test]
async fn test_queued_callers_all_see_auth_rejected() {
    let (connector, mut listener) = MemoryConnector::new();
    let attempts = connector.clone();
    let client = client(connector);

    let calls: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.call(Envelope::new("get_states")).await })
        })
        .collect();
    let _rejected = accept_rejected(&mut listener).await;

    for call in calls {
        assert_eq!(
            call.await.unwrap(),
            Err(ClientError::AuthRejected {
                message: "Invalid access token or password".to_string(),
            })
        );
    }
    assert_eq!(attempts.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_queued_callers_all_see_connect_failed() {
    let (connector, _listener) = MemoryConnector::new();
    connector.refuse_next(usize::MAX);
    let attempts = connector.clone();
    let client = builder(connector).max_reconnect_attempts(3).build();

    let calls: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.call(Envelope::new("get_states")).await })
        })
        .collect();

    for call in calls {
        match call.await.unwrap() {
            Err(ClientError::ConnectFailed { attempts: 3, .. }) => {}
            other => panic!("expected ConnectFailed after 3 attempts, got {other:?}"),
        }
    }
    assert_eq!(attempts.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_background_reconnect_exhausted() {
    let (connector, mut listener) = MemoryConnector::new();
    let attempts = connector.clone();
    let client = builder(connector).max_reconnect_attempts(3).build();

    let connect = tokio::spawn({
        let client = client.clone();
        async move { client.connect().await }
    });
    let peer = accept_authenticated(&mut listener).await;
    assert_eq!(connect.await.unwrap(), Ok(()));

    attempts.refuse_next(usize::MAX);
    let mut state = client.subscribe_state();
    peer.close();
    state.wait_for(|s| !s.is_ready()).await.unwrap();

    match client.call(Envelope::new("get_states")).await {
        Err(ClientError::ConnectFailed { attempts: 3, .. }) => {}
        other => panic!("expected ConnectFailed after 3 attempts, got {other:?}"),
    }
    assert_eq!(attempts.attempts(), 4);
}


use futures_util::SinkExt;
use peer_relay_server::protocol::Role;
use serde_json::json;
use test_helpers::{
    connect_peer, connect_raw, eventually, expect_closed, next_json, send_json, spawn_app,
    stays_quiet, test_config,
};
use tokio::time::Duration;

#[tokio::test]
async fn test_offer_answer_candidate_exchange() {
    let app = spawn_app(test_config()).await;
    let (mut a_tx, mut a_rx) = connect_peer(app.addr, "alice", "tok-a").await;
    let (mut b_tx, mut b_rx) = connect_peer(app.addr, "bob", "tok-b").await;

    let offer = json!({"sdp": {"type": "offer", "sdp": "v=0\r\n"}, "type": "media", "connectionId": "mc_1"});
    send_json(
        &mut a_tx,
        json!({"type": "OFFER", "dst": "bob", "payload": offer}),
    )
    .await;

    let delivered = next_json(&mut b_rx).await;
    assert_eq!(delivered["type"], "OFFER");
    assert_eq!(delivered["src"], "alice");
    assert_eq!(delivered["dst"], "bob");
    assert_eq!(delivered["payload"], offer);

    let answer = json!({"sdp": {"type": "answer", "sdp": "v=0\r\n"}, "connectionId": "mc_1"});
    send_json(
        &mut b_tx,
        json!({"type": "ANSWER", "dst": "alice", "payload": answer}),
    )
    .await;

    let delivered = next_json(&mut a_rx).await;
    assert_eq!(delivered["type"], "ANSWER");
    assert_eq!(delivered["src"], "bob");
    assert_eq!(delivered["payload"], answer);

    let candidate = json!({"candidate": {"candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host", "sdpMid": "0"}, "connectionId": "mc_1"});
    send_json(
        &mut a_tx,
        json!({"type": "CANDIDATE", "dst": "bob", "payload": candidate}),
    )
    .await;

    let delivered = next_json(&mut b_rx).await;
    assert_eq!(delivered["type"], "CANDIDATE");
    assert_eq!(delivered["payload"], candidate);

    assert_eq!(app.metrics.snapshot().relay.messages_relayed, 3);
}

#[tokio::test]
async fn test_relay_to_missing_peer_returns_expire() {
    let app = spawn_app(test_config()).await;
    let (mut tx, mut rx) = connect_peer(app.addr, "alice", "tok").await;

    send_json(
        &mut tx,
        json!({"type": "OFFER", "dst": "ghost", "payload": {"sdp": "x"}}),
    )
    .await;

    let reply = next_json(&mut rx).await;
    assert_eq!(reply, json!({"type": "EXPIRE", "src": "ghost", "dst": "alice"}));

    // LEAVE towards a missing peer is not answered.
    send_json(&mut tx, json!({"type": "LEAVE", "dst": "ghost"})).await;
    assert!(stays_quiet(&mut rx, Duration::from_millis(300)).await);
}

#[tokio::test]
async fn test_duplicate_peer_id_is_rejected_with_id_taken() {
    let app = spawn_app(test_config()).await;
    let (_a_tx, _a_rx) = connect_peer(app.addr, "alice", "first").await;

    let (_tx, mut rx) = connect_raw(app.addr, "key=peerjs&id=alice&token=second").await;
    let reply = next_json(&mut rx).await;
    assert_eq!(reply["type"], "ID-TAKEN");
    assert_eq!(reply["payload"]["msg"], "ID is taken");
    expect_closed(&mut rx).await;

    assert!(app.server().is_connected("alice"));
    assert_eq!(app.metrics.snapshot().connections.duplicate_peer_ids, 1);
}

#[tokio::test]
async fn test_reconnect_with_same_token_replaces_session() {
    let app = spawn_app(test_config()).await;
    let (_old_tx, mut old_rx) = connect_peer(app.addr, "alice", "same").await;

    let (_new_tx, mut new_rx) = connect_peer(app.addr, "alice", "same").await;

    let notice = next_json(&mut old_rx).await;
    assert_eq!(notice["type"], "ERROR");
    assert_eq!(notice["payload"]["code"], "SESSION_REPLACED");
    expect_closed(&mut old_rx).await;

    // The replacement session still receives relayed frames.
    let (mut b_tx, _b_rx) = connect_peer(app.addr, "bob", "b").await;
    send_json(
        &mut b_tx,
        json!({"type": "OFFER", "dst": "alice", "payload": {"sdp": "y"}}),
    )
    .await;
    let delivered = next_json(&mut new_rx).await;
    assert_eq!(delivered["src"], "bob");
    assert_eq!(app.server().session_count(), 2);
}

#[tokio::test]
async fn test_invalid_key_is_reported_then_closed() {
    let app = spawn_app(test_config()).await;
    let (_tx, mut rx) = connect_raw(app.addr, "key=wrong&id=alice&token=t").await;

    let reply = next_json(&mut rx).await;
    assert_eq!(reply["type"], "ERROR");
    assert_eq!(reply["payload"]["code"], "INVALID_KEY");
    expect_closed(&mut rx).await;

    assert!(!app.server().is_connected("alice"));
    assert_eq!(app.metrics.snapshot().connections.rejected_connections, 1);
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let app = spawn_app(test_config()).await;
    let (_tx, mut rx) = connect_raw(app.addr, "key=peerjs&id=alice").await;

    let reply = next_json(&mut rx).await;
    assert_eq!(reply["payload"]["code"], "MISSING_TOKEN");
    expect_closed(&mut rx).await;
}

#[tokio::test]
async fn test_malformed_frame_keeps_session_open() {
    let app = spawn_app(test_config()).await;
    let (mut tx, mut rx) = connect_peer(app.addr, "alice", "tok").await;

    tx.send(tokio_tungstenite::tungstenite::Message::Text(
        "definitely not json".into(),
    ))
    .await
    .unwrap();
    let reply = next_json(&mut rx).await;
    assert_eq!(reply["type"], "ERROR");
    assert_eq!(reply["payload"]["code"], "INVALID_MESSAGE");

    send_json(&mut tx, json!({"type": "HEARTBEAT"})).await;
    assert!(stays_quiet(&mut rx, Duration::from_millis(200)).await);
    assert!(app.server().is_connected("alice"));
}

#[tokio::test]
async fn test_disconnect_purges_presence_registry() {
    let app = spawn_app(test_config()).await;
    let server = app.server().clone();

    server.register(Role::Broadcaster, "alice");
    server.register(Role::Receiver, "bob");

    let (a_tx, a_rx) = connect_peer(app.addr, "alice", "tok").await;
    assert!(server.list(Role::Broadcaster).contains(&"alice".to_string()));

    drop(a_tx);
    drop(a_rx);

    assert!(
        eventually(|| !server.is_connected("alice")).await,
        "session should be released after the socket closes"
    );
    assert!(!server.list(Role::Broadcaster).contains(&"alice".to_string()));
    assert_eq!(server.list(Role::Receiver), vec!["bob".to_string()]);
}

#[tokio::test]
async fn test_idle_session_expires_without_heartbeat() {
    let mut config = test_config();
    config.websocket.alive_timeout_secs = 1;
    config.websocket.cleanup_interval_secs = 1;
    let app = spawn_app(config).await;

    let maintenance = app.server().clone();
    tokio::spawn(async move { maintenance.maintenance_task().await });

    let (_tx, mut rx) = connect_peer(app.addr, "sleepy", "tok").await;

    let notice = next_json(&mut rx).await;
    assert_eq!(notice["type"], "ERROR");
    assert_eq!(notice["payload"]["code"], "SESSION_EXPIRED");
    expect_closed(&mut rx).await;

    assert!(!app.server().is_connected("sleepy"));
    assert_eq!(app.metrics.snapshot().connections.expired_sessions, 1);
}

#[tokio::test]
async fn test_leave_is_forwarded_to_live_peer() {
    let app = spawn_app(test_config()).await;
    let (mut a_tx, _a_rx) = connect_peer(app.addr, "alice", "a").await;
    let (_b_tx, mut b_rx) = connect_peer(app.addr, "bob", "b").await;

    send_json(&mut a_tx, json!({"type": "LEAVE", "dst": "bob"})).await;

    let delivered = next_json(&mut b_rx).await;
    assert_eq!(delivered["type"], "LEAVE");
    assert_eq!(delivered["src"], "alice");
    assert!(delivered.get("payload").is_none());
}

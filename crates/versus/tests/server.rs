//! End-to-end tests: real WebSocket clients against a relay on a random port.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use versus::prelude::*;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a relay on a random port and returns its address and hub.
async fn start_server(config: HubConfig) -> (String, HubHandle) {
    let server = VersusServer::builder()
        .bind("127.0.0.1:0")
        .hub_config(config)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let hub = server.hub();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, hub)
}

fn quiet() -> HubConfig {
    HubConfig {
        announce_host: false,
        ..HubConfig::default()
    }
}

/// Connects and consumes the `identity` greeting, returning the client's id.
async fn connect(addr: &str) -> (ClientWs, String) {
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    let identity = recv_json(&mut ws).await;
    assert_eq!(identity["type"], "identity");
    let id = identity["senderId"]
        .as_str()
        .expect("identity carries senderId")
        .to_string();
    (ws, id)
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(WsMessage::Text(value.to_string().into()))
        .await
        .expect("send should succeed");
}

async fn send_raw(ws: &mut ClientWs, text: &str) {
    ws.send(WsMessage::Text(text.to_string().into()))
        .await
        .expect("send should succeed");
}

/// Next text frame as raw text.
async fn recv_text(ws: &mut ClientWs) -> String {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("frame error");
        match frame {
            WsMessage::Text(text) => return text.to_string(),
            WsMessage::Close(_) => panic!("unexpected close"),
            _ => continue,
        }
    }
}

async fn recv_json(ws: &mut ClientWs) -> Value {
    serde_json::from_str(&recv_text(ws).await).expect("frame should be JSON")
}

/// Asserts no text frame arrives within a short window.
async fn assert_quiet(ws: &mut ClientWs) {
    let next = tokio::time::timeout(Duration::from_millis(150), ws.next()).await;
    if let Ok(Some(Ok(WsMessage::Text(text)))) = next {
        panic!("expected silence, got {text}");
    }
}

/// Two clients joined and matched. Returns (host, host id, joiner, joiner id).
async fn matched_pair(addr: &str) -> (ClientWs, String, ClientWs, String) {
    let (mut a, a_id) = connect(addr).await;
    let (mut b, b_id) = connect(addr).await;

    send_json(&mut a, json!({"type": "join_game", "payload": {"name": "Ann", "attackMode": "lines"}})).await;
    assert_eq!(recv_json(&mut a).await["type"], "waiting_for_opponent");

    send_json(&mut b, json!({"type": "join_game", "payload": {"name": "Bo"}})).await;
    let a_start = recv_json(&mut a).await;
    let b_start = recv_json(&mut b).await;
    assert_eq!(a_start["type"], "game_start");
    assert_eq!(b_start["type"], "game_start");

    (a, a_id, b, b_id)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_server_binds_to_random_port() {
    let (addr, _hub) = start_server(quiet()).await;
    assert!(addr.starts_with("127.0.0.1:"));
    assert_ne!(addr, "127.0.0.1:0");
}

#[tokio::test]
async fn test_each_client_gets_a_distinct_identity() {
    let (addr, hub) = start_server(quiet()).await;
    let (_a, a_id) = connect(&addr).await;
    let (_b, b_id) = connect(&addr).await;

    assert_ne!(a_id, b_id);
    assert_eq!(a_id.len(), 8);
    assert_eq!(hub.stats().await.unwrap().clients, 2);
}

#[tokio::test]
async fn test_match_payloads_and_host_rules() {
    let (addr, _hub) = start_server(quiet()).await;
    let (mut a, a_id) = connect(&addr).await;
    let (mut b, b_id) = connect(&addr).await;

    send_json(&mut a, json!({"type": "join_game", "payload": {"name": "Ann", "attackMode": "lines"}})).await;
    assert_eq!(recv_json(&mut a).await, json!({"type": "waiting_for_opponent"}));

    send_json(&mut b, json!({"type": "join_game", "payload": {"attackMode": "garbage", "allowHoldPiece": false}})).await;

    let a_start = recv_json(&mut a).await;
    let b_start = recv_json(&mut b).await;

    assert_eq!(a_start["payload"]["opponentId"], b_id.as_str());
    assert_eq!(b_start["payload"]["opponentId"], a_id.as_str());
    assert_eq!(b_start["payload"]["opponentName"], "Ann");
    assert_eq!(
        a_start["payload"]["opponentName"],
        format!("Player {}", &b_id[4..])
    );
    assert_eq!(a_start["payload"]["matchId"], b_start["payload"]["matchId"]);
    for start in [&a_start, &b_start] {
        assert_eq!(start["payload"]["attackMode"], "lines");
        assert_eq!(start["payload"]["allowHoldPiece"], true);
        assert_eq!(start["payload"]["useCascadeGravity"], false);
        assert_eq!(start["payload"]["increaseGravity"], true);
    }
}

#[tokio::test]
async fn test_relay_is_stamped_and_byte_identical() {
    let (addr, _hub) = start_server(quiet()).await;
    let (mut a, a_id, mut b, _b_id) = matched_pair(&addr).await;

    let payload = r#"{"board":[[0,1],[2,3]],"score":1.50,"level":2}"#;
    send_raw(
        &mut a,
        &format!(r#"{{"type":"game_state","payload":{payload},"senderId":"spoofed"}}"#),
    )
    .await;

    let text = recv_text(&mut b).await;
    assert_eq!(
        text,
        format!(r#"{{"type":"game_state","payload":{payload},"senderId":"{a_id}"}}"#)
    );
    assert_quiet(&mut a).await;
}

#[tokio::test]
async fn test_pause_and_resume_reach_opponent_only() {
    let (addr, _hub) = start_server(quiet()).await;
    let (mut a, a_id, mut b, _b_id) = matched_pair(&addr).await;

    send_json(&mut a, json!({"type": "pause"})).await;
    send_json(&mut a, json!({"type": "resume"})).await;

    assert_eq!(recv_json(&mut b).await, json!({"type": "pause", "senderId": a_id}));
    assert_eq!(recv_json(&mut b).await, json!({"type": "resume", "senderId": a_id}));
    assert_quiet(&mut a).await;
}

#[tokio::test]
async fn test_malformed_and_unknown_frames_keep_connection_open() {
    let (addr, _hub) = start_server(quiet()).await;
    let (mut a, _a_id, mut b, _b_id) = matched_pair(&addr).await;

    send_raw(&mut a, "this is not json").await;
    send_raw(&mut a, r#"{"payload":{}}"#).await;
    send_raw(&mut a, r#"{"type":"emote","payload":{"id":3}}"#).await;
    send_raw(&mut a, r#"{"type":"game_start","payload":{}}"#).await;

    // Still relaying afterwards.
    send_json(&mut a, json!({"type": "attack", "payload": {"lines": 2}})).await;
    let got = recv_json(&mut b).await;
    assert_eq!(got["type"], "attack");
    assert_eq!(got["payload"], json!({"lines": 2}));
}

#[tokio::test]
async fn test_attack_before_matching_goes_nowhere() {
    let (addr, _hub) = start_server(quiet()).await;
    let (mut a, _a_id) = connect(&addr).await;
    let (mut b, _b_id) = connect(&addr).await;

    send_json(&mut a, json!({"type": "attack", "payload": {"lines": 4}})).await;

    assert_quiet(&mut a).await;
    assert_quiet(&mut b).await;
}

#[tokio::test]
async fn test_disconnect_sends_player_left() {
    let (addr, hub) = start_server(quiet()).await;
    let (mut a, a_id, mut b, _b_id) = matched_pair(&addr).await;

    a.close(None).await.expect("close should succeed");

    let left = recv_json(&mut b).await;
    assert_eq!(left, json!({"type": "player_left", "payload": {"id": a_id}}));

    let stats = hub.stats().await.unwrap();
    assert_eq!(stats.clients, 1);
    assert_eq!(stats.rooms, 1);
}

#[tokio::test]
async fn test_room_status_reaches_idle_clients() {
    let (addr, _hub) = start_server(HubConfig::default()).await;
    let (mut idle, _) = connect(&addr).await;
    let (mut host, _) = connect(&addr).await;

    send_json(&mut host, json!({"type": "join_game", "payload": {"attackMode": "lines"}})).await;
    assert_eq!(recv_json(&mut host).await["type"], "waiting_for_opponent");

    let status = recv_json(&mut idle).await;
    assert_eq!(status["type"], "room_status");
    assert_eq!(status["payload"]["hasHost"], true);
    assert_eq!(status["payload"]["hostSettings"]["attackMode"], "lines");
}

#[tokio::test]
async fn test_stalled_consumer_socket_is_dropped() {
    let (addr, hub) = start_server(HubConfig {
        outbox_capacity: 4,
        ..quiet()
    })
    .await;
    let (a, _a_id, mut b, b_id) = matched_pair(&addr).await;

    // B stops reading. A floods large states until the relay evicts B.
    let (mut a_tx, mut a_rx) = a.split();
    let (evicted_tx, mut evicted_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        while let Some(Ok(frame)) = a_rx.next().await {
            if let WsMessage::Text(text) = frame {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                if value["type"] == "player_left" {
                    let _ = evicted_tx.send(value["payload"]["id"].clone());
                    return;
                }
            }
        }
    });

    let frame = format!(
        r#"{{"type":"game_state","payload":{{"pad":"{}"}}}}"#,
        "x".repeat(256 * 1024)
    );
    let mut left = None;
    for _ in 0..512 {
        if let Ok(id) = evicted_rx.try_recv() {
            left = Some(id);
            break;
        }
        a_tx.send(WsMessage::Text(frame.clone().into())).await.unwrap();
    }
    let left = match left {
        Some(id) => id,
        None => tokio::time::timeout(Duration::from_secs(10), evicted_rx)
            .await
            .expect("relay should evict the stalled client")
            .expect("A's connection ended before player_left"),
    };
    assert_eq!(left, b_id.as_str());
    assert_eq!(hub.stats().await.unwrap().clients, 1);

    // Once B drains what was already buffered, the socket must end.
    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match b.next().await {
                None | Some(Err(_)) | Some(Ok(WsMessage::Close(_))) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "relay still holds the evicted client's socket open");
}

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let server = VersusServer::builder()
        .bind("127.0.0.1:0")
        .hub_config(quiet())
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async move {
        let _ = stop_rx.await;
    }));

    let (mut a, _) = connect(&addr).await;
    stop_tx.send(()).unwrap();
    running.await.unwrap().unwrap();

    // The client sees the socket end rather than hang.
    let end = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match a.next().await {
                None | Some(Err(_)) | Some(Ok(WsMessage::Close(_))) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(end.is_ok(), "client should observe the close");
}

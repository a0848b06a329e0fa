//! EventSub session against an in-process WebSocket server and a stub
//! Helix subscriptions endpoint.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use argus_sdk::config::ConnectionConfig;
use argus_sdk::event::{Event, Feed};
use argus_sdk::eventsub::{self, Termination};
use argus_sdk::notification::{Notification, SUBSCRIPTION_TYPES};
use argus_sdk::registrar::{HelixRegistrar, SubscriptionRegistrar, SubscriptionRequest};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// Helper: wait for a specific event, with timeout.
async fn expect_event(
    events: &mut mpsc::Receiver<Event>,
    timeout_ms: u64,
    predicate: impl Fn(&Event) -> bool,
    description: &str,
) -> Event {
    let deadline = Duration::from_millis(timeout_ms);
    let start = tokio::time::Instant::now();
    loop {
        match timeout(deadline.saturating_sub(start.elapsed()), events.recv()).await {
            Ok(Some(event)) => {
                if predicate(&event) {
                    return event;
                }
            }
            Ok(None) => panic!("Channel closed while waiting for: {description}"),
            Err(_) => panic!("Timeout waiting for: {description}"),
        }
    }
}

// ── Stub Helix ──────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Helix {
    seen: Arc<Mutex<Vec<(HeaderMap, SubscriptionRequest)>>>,
}

/// Accepts everything except cheers, which it rejects as duplicates.
async fn create_subscription(
    State(helix): State<Helix>,
    headers: HeaderMap,
    Json(request): Json<SubscriptionRequest>,
) -> StatusCode {
    let status = if request.kind == "channel.cheer" {
        StatusCode::CONFLICT
    } else if request.kind == "channel.subscribe" {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    helix.seen.lock().unwrap().push((headers, request));
    status
}

async fn start_helix() -> (String, Helix) {
    let helix = Helix::default();
    let app = Router::new()
        .route("/helix/eventsub/subscriptions", post(create_subscription))
        .with_state(helix.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/helix/eventsub/subscriptions"), helix)
}

fn test_config(eventsub_url: String, subscriptions_url: String) -> Arc<ConnectionConfig> {
    let mut config = ConnectionConfig::new("viewer", "s3cret", "#somechannel", "1234", "client-id");
    config.eventsub_url = eventsub_url;
    config.subscriptions_url = subscriptions_url;
    Arc::new(config)
}

fn welcome(id: &str) -> Message {
    Message::Text(
        json!({
            "metadata": {"message_id": "w", "message_type": "session_welcome"},
            "payload": {"session": {"id": id, "status": "connected", "keepalive_timeout_seconds": 10}}
        })
        .to_string(),
    )
}

fn notification(kind: &str, event: serde_json::Value) -> Message {
    Message::Text(
        json!({
            "metadata": {"message_id": "n", "message_type": "notification"},
            "payload": {"subscription": {"type": kind, "version": "1"}, "event": event}
        })
        .to_string(),
    )
}

fn plain(message_type: &str) -> Message {
    Message::Text(json!({"metadata": {"message_type": message_type}, "payload": {}}).to_string())
}

// ── Test: full session until revocation ─────────────────────────────

#[tokio::test]
async fn welcome_subscribe_notify_revoke() {
    let (subscriptions_url, helix) = start_helix().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(welcome("abc123")).await.unwrap();
        ws.send(plain("session_keepalive")).await.unwrap();
        ws.send(Message::Text("{not json".to_string())).await.unwrap();
        ws.send(plain("brand_new_type")).await.unwrap();
        ws.send(notification(
            "channel.cheer",
            json!({"user_name": "Cheerer", "bits": 500.0}),
        ))
        .await
        .unwrap();
        ws.send(notification("channel.follow", json!({"user_name": "Follower"})))
            .await
            .unwrap();
        ws.send(notification("channel.subscribe", json!({}))).await.unwrap();
        ws.send(notification(
            "channel.channel_points_custom_reward_redemption.add",
            json!({"user_name": "Fan", "reward": {"title": "Hydrate", "cost": 250.0}}),
        ))
        .await
        .unwrap();
        ws.send(plain("revocation")).await.unwrap();
        // Must never be processed.
        let _ = ws
            .send(notification("channel.subscribe", json!({"user_name": "TooLate"})))
            .await;
        // Hold the socket open until the client goes away.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let config = test_config(format!("ws://{addr}"), subscriptions_url);
    let registrar: Arc<dyn SubscriptionRegistrar> = Arc::new(HelixRegistrar::new(&config));
    let (event_tx, mut events) = mpsc::channel(64);
    let client = tokio::spawn(eventsub::connect(config, registrar, event_tx));

    let welcomed = expect_event(&mut events, 3000, |e| matches!(e, Event::Welcomed { .. }), "Welcomed").await;
    if let Event::Welcomed { session_id } = welcomed {
        assert_eq!(session_id, "abc123");
    }
    expect_event(&mut events, 3000, |e| matches!(e, Event::ActivityFeedReady), "ActivityFeedReady").await;

    // All three registrations were attempted before the feed became ready,
    // including the one the stub rejected.
    {
        let seen = helix.seen.lock().unwrap();
        let kinds: Vec<&str> = seen.iter().map(|(_, r)| r.kind.as_str()).collect();
        assert_eq!(kinds, SUBSCRIPTION_TYPES.to_vec());
        for (headers, request) in seen.iter() {
            assert_eq!(request.transport.session_id, "abc123");
            assert_eq!(request.transport.method, "websocket");
            assert_eq!(request.condition.broadcaster_user_id, "1234");
            assert_eq!(headers["client-id"], "client-id");
            assert_eq!(headers["authorization"], "Bearer s3cret");
            assert_eq!(headers["content-type"], "application/json");
        }
    }

    let mut activities = Vec::new();
    let disconnected = loop {
        let event = expect_event(&mut events, 3000, |_| true, "activity or disconnect").await;
        match event {
            Event::Activity(notification) => activities.push(notification),
            Event::Disconnected { feed, reason } => break (feed, reason),
            other => panic!("unexpected event: {other:?}"),
        }
    };
    assert_eq!(
        activities,
        vec![
            Notification::Cheer { user_name: "Cheerer".into(), bits: 500 },
            Notification::PointRedemption {
                user_name: "Fan".into(),
                reward_title: "Hydrate".into(),
                reward_cost: 250,
            },
        ]
    );
    assert_eq!(disconnected.0, Feed::EventSub);
    assert_eq!(disconnected.1, "session revoked");

    let termination = timeout(Duration::from_secs(2), client).await.unwrap().unwrap().unwrap();
    assert_eq!(termination, Termination::Revoked);
    assert_eq!(helix.seen.lock().unwrap().len(), 3);

    server.abort();
}

// ── Test: server ping, then close ───────────────────────────────────

#[tokio::test]
async fn ping_is_answered_and_close_ends_session() {
    let (subscriptions_url, helix) = start_helix().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Ping(vec![7, 7, 7])).await.unwrap();
        let reply = timeout(Duration::from_secs(2), ws.next()).await.unwrap();
        assert!(matches!(reply, Some(Ok(Message::Pong(data))) if data == vec![7, 7, 7]));
        ws.close(None).await.unwrap();
    });

    let config = test_config(format!("ws://{addr}"), subscriptions_url);
    let registrar: Arc<dyn SubscriptionRegistrar> = Arc::new(HelixRegistrar::new(&config));
    let (event_tx, mut events) = mpsc::channel(16);
    let termination = timeout(Duration::from_secs(3), eventsub::connect(config, registrar, event_tx))
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(termination, Termination::ConnectionLost { .. }));
    expect_event(&mut events, 1000, |e| matches!(e, Event::Disconnected { feed: Feed::EventSub, .. }), "Disconnected").await;
    // Never welcomed, so nothing was registered.
    assert!(helix.seen.lock().unwrap().is_empty());

    server.await.unwrap();
}

// ── Test: reconnect request ends the session ────────────────────────

#[tokio::test]
async fn reconnect_request_stops_the_session() {
    let (subscriptions_url, _helix) = start_helix().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(welcome("s-1")).await.unwrap();
        ws.send(Message::Text(
            json!({
                "metadata": {"message_type": "session_reconnect"},
                "payload": {"session": {"id": "s-1", "status": "reconnecting", "reconnect_url": "wss://elsewhere.test/ws"}}
            })
            .to_string(),
        ))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let config = test_config(format!("ws://{addr}"), subscriptions_url);
    let registrar: Arc<dyn SubscriptionRegistrar> = Arc::new(HelixRegistrar::new(&config));
    let (event_tx, _events) = mpsc::channel(16);
    let termination = timeout(Duration::from_secs(3), eventsub::connect(config, registrar, event_tx))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        termination,
        Termination::ReconnectRequested {
            reconnect_url: Some("wss://elsewhere.test/ws".to_string())
        }
    );
    server.abort();
}

// ── Test: the EventSub path logs only at debug ──────────────────────

/// In-memory sink for a test subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn session_lifecycle_is_silent_at_info() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (subscriptions_url, _helix) = start_helix().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(welcome("quiet-1")).await.unwrap();
        ws.send(plain("session_keepalive")).await.unwrap();
        ws.send(plain("revocation")).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let config = test_config(format!("ws://{addr}"), subscriptions_url);
    let registrar: Arc<dyn SubscriptionRegistrar> = Arc::new(HelixRegistrar::new(&config));
    let (event_tx, _events) = mpsc::channel(16);
    let termination = timeout(Duration::from_secs(3), eventsub::connect(config, registrar, event_tx))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(termination, Termination::Revoked);
    server.abort();

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let ours: Vec<&str> = output.lines().filter(|line| line.contains("argus_sdk")).collect();
    assert!(ours.iter().any(|line| line.contains("Connected to EventSub")), "{output}");
    assert!(ours.iter().any(|line| line.contains("Received revocation")), "{output}");
    assert!(ours.iter().any(|line| line.contains("EventSub connection closed")), "{output}");
    for line in ours {
        assert!(line.contains("DEBUG"), "logged above debug: {line}");
    }
}

// ── Test: dial failure and registrar errors ─────────────────────────

#[tokio::test]
async fn dial_failure_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = test_config(format!("ws://{addr}"), "http://127.0.0.1:9/unused".to_string());
    let registrar: Arc<dyn SubscriptionRegistrar> = Arc::new(HelixRegistrar::new(&config));
    let (event_tx, _events) = mpsc::channel(4);
    let err = eventsub::connect(config, registrar, event_tx).await.unwrap_err();
    assert!(err.to_string().contains("WebSocket connection error"));
}

#[tokio::test]
async fn helix_registrar_status_handling() {
    let (subscriptions_url, _helix) = start_helix().await;
    let config = test_config("ws://unused".to_string(), subscriptions_url);
    let registrar = HelixRegistrar::new(&config);

    let ok = SubscriptionRequest::websocket("channel.subscribe", "1234", "sid");
    registrar.register(&ok).await.unwrap();

    let ok = SubscriptionRequest::websocket("channel.channel_points_custom_reward_redemption.add", "1234", "sid");
    registrar.register(&ok).await.unwrap();

    let rejected = SubscriptionRequest::websocket("channel.cheer", "1234", "sid");
    let err = registrar.register(&rejected).await.unwrap_err();
    assert!(err.to_string().contains("409"), "{err}");

    // Nothing listens on the discard port.
    let unreachable = test_config("ws://unused".to_string(), "http://127.0.0.1:9/subs".to_string());
    let err = HelixRegistrar::new(&unreachable).register(&ok).await.unwrap_err();
    assert!(err.to_string().contains("Error making request"));
}

//! End-to-end chat tests over real WebSocket connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use murmur_core::{ChatMessage, MessageKind, ServerEvent};
use murmur_server::server::{self, AppState};
use murmur_server::ServerConfig;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

/// Default timeout for test operations.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait before concluding no event is coming.
const QUIET_PERIOD: Duration = Duration::from_millis(200);

struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    shutdown: CancellationToken,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_with(ServerConfig::test_local()).await
    }

    async fn start_with(config: ServerConfig) -> Self {
        let listener = TcpListener::bind(config.bind_addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(AppState::new(config));
        let shutdown = CancellationToken::new();

        tokio::spawn(server::serve(listener, Arc::clone(&state), shutdown.clone()));

        Self {
            addr,
            state,
            shutdown,
        }
    }

    async fn connect(&self) -> TestClient {
        let url = format!("ws://{}/ws", self.addr);
        let (ws, _) = connect_async(url).await.unwrap();
        TestClient { ws }
    }

    /// Connect and join, returning the client and its replayed history.
    async fn join(&self, identity: &str) -> (TestClient, Vec<ChatMessage>) {
        let mut client = self.connect().await;
        client
            .send(&format!(r#"{{"type":"join","identity":"{}"}}"#, identity))
            .await;
        match client.recv().await {
            ServerEvent::History { messages } => (client, messages),
            other => panic!("expected history, got {:?}", other),
        }
    }

    /// Wait until the registry has caught up with connects and disconnects.
    async fn wait_for_connections(&self, expected: usize) {
        timeout(DEFAULT_TIMEOUT, async {
            while self.state.router.registry().connection_count() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("registry never reached expected size");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct TestClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    async fn send(&mut self, frame: &str) {
        self.ws.send(Message::text(frame.to_string())).await.unwrap();
    }

    async fn send_public(&mut self, text: &str) {
        let frame = serde_json::json!({ "type": "sendPublic", "text": text });
        self.send(&frame.to_string()).await;
    }

    async fn send_private(&mut self, recipient: &str, text: &str) {
        let frame = serde_json::json!({
            "type": "sendPrivate",
            "text": text,
            "recipientId": recipient,
        });
        self.send(&frame.to_string()).await;
    }

    async fn recv(&mut self) -> ServerEvent {
        loop {
            let msg = timeout(DEFAULT_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for event")
                .expect("connection closed")
                .expect("websocket error");
            if msg.is_text() {
                return serde_json::from_str(msg.to_text().unwrap()).unwrap();
            }
        }
    }

    async fn recv_message(&mut self) -> ChatMessage {
        let event = self.recv().await;
        event
            .message()
            .cloned()
            .unwrap_or_else(|| panic!("expected a message event, got {:?}", event))
    }

    async fn assert_quiet(&mut self) {
        if let Ok(Some(Ok(msg))) = timeout(QUIET_PERIOD, self.ws.next()).await {
            panic!("expected no event, got {:?}", msg);
        }
    }

    async fn close(mut self) {
        self.ws.close(None).await.unwrap();
    }
}

#[tokio::test]
async fn test_example_scenario() {
    let server = TestServer::start().await;
    let (mut alice, history) = server.join("Alice").await;
    assert!(history.is_empty());
    let (mut bob, _) = server.join("Bob").await;

    alice.send_public("hi").await;
    let to_alice = alice.recv_message().await;
    let to_bob = bob.recv_message().await;
    assert_eq!(to_alice.text, "hi");
    assert_eq!(to_bob.text, "hi");
    assert_eq!(to_bob.sender_id, "Alice");
    assert_eq!(to_bob.kind, MessageKind::Public);

    alice.send_private("Bob", "secret").await;
    let to_bob = bob.recv_message().await;
    let to_alice = alice.recv_message().await;
    assert_eq!(to_bob.text, "secret");
    assert_eq!(to_bob.recipient_id.as_deref(), Some("Bob"));
    assert_eq!(to_alice, to_bob);

    alice.send_private("Carol", "lost").await;
    let notice = alice.recv_message().await;
    assert!(notice.is_system());
    assert_eq!(notice.text, "Carol is currently offline or does not exist.");
    assert_eq!(alice.recv_message().await.text, "lost");

    alice.assert_quiet().await;
    bob.assert_quiet().await;

    let history = server.state.router.store().snapshot().await;
    let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["hi", "secret", "lost"]);
}

#[tokio::test]
async fn test_private_is_not_seen_by_others() {
    let server = TestServer::start().await;
    let (mut alice, _) = server.join("alice").await;
    let (mut bob, _) = server.join("bob").await;
    let (mut carol, _) = server.join("carol").await;

    alice.send_private("bob", "psst").await;

    assert_eq!(bob.recv_message().await.text, "psst");
    assert_eq!(alice.recv_message().await.text, "psst");
    carol.assert_quiet().await;
}

#[tokio::test]
async fn test_late_joiner_gets_history_in_order() {
    let server = TestServer::start().await;
    let (mut alice, _) = server.join("alice").await;

    for text in ["one", "two", "three"] {
        alice.send_public(text).await;
        alice.recv_message().await;
    }

    let (_dave, history) = server.join("dave").await;
    let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_history_limit() {
    let config = ServerConfig {
        history_limit: Some(2),
        ..ServerConfig::test_local()
    };
    let server = TestServer::start_with(config).await;
    let (mut alice, _) = server.join("alice").await;

    for text in ["one", "two", "three"] {
        alice.send_public(text).await;
        alice.recv_message().await;
    }

    let (_dave, history) = server.join("dave").await;
    let texts: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["two", "three"]);
}

#[tokio::test]
async fn test_disconnect_unregisters() {
    let server = TestServer::start().await;
    let (alice, _) = server.join("alice").await;
    let (mut bob, _) = server.join("bob").await;
    server.wait_for_connections(2).await;

    alice.close().await;
    server.wait_for_connections(1).await;

    bob.send_private("alice", "still there?").await;
    let notice = bob.recv_message().await;
    assert!(notice.is_system());
    assert_eq!(notice.text, "alice is currently offline or does not exist.");
}

#[tokio::test]
async fn test_reconnect_survives_stale_disconnect() {
    let server = TestServer::start().await;
    let (old, _) = server.join("alice").await;
    let (mut new, _) = server.join("alice").await;
    let (mut bob, _) = server.join("bob").await;

    old.close().await;
    // Give the old connection's leave time to run
    tokio::time::sleep(QUIET_PERIOD).await;

    assert!(server.state.router.registry().is_connected("alice"));
    bob.send_private("alice", "hello again").await;
    assert_eq!(new.recv_message().await.text, "hello again");
}

#[tokio::test]
async fn test_invalid_events_are_rejected() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    client.send_public("hi").await;
    assert_eq!(
        client.recv().await,
        ServerEvent::Error {
            message: "Join before sending messages".to_string()
        }
    );

    client.send("{broken").await;
    assert!(matches!(client.recv().await, ServerEvent::Error { .. }));

    client.send(r#"{"type":"join","identity":"   "}"#).await;
    assert_eq!(
        client.recv().await,
        ServerEvent::Error {
            message: "Identity must not be empty".to_string()
        }
    );

    client.send(r#"{"type":"join","identity":"alice"}"#).await;
    assert!(matches!(client.recv().await, ServerEvent::History { .. }));

    client.send_public("").await;
    assert_eq!(
        client.recv().await,
        ServerEvent::Error {
            message: "Message text must not be empty".to_string()
        }
    );

    assert!(server.state.router.store().is_empty().await);
}

#[tokio::test]
async fn test_close_handshake_is_answered() {
    let server = TestServer::start().await;
    let (mut alice, _) = server.join("alice").await;

    alice.ws.close(None).await.unwrap();

    let reply = timeout(DEFAULT_TIMEOUT, alice.ws.next())
        .await
        .expect("timed out waiting for close reply");
    assert!(
        matches!(reply, Some(Ok(Message::Close(_)))),
        "expected close reply, got {:?}",
        reply
    );
    server.wait_for_connections(0).await;
}

#[tokio::test]
async fn test_ping_is_answered_with_pong() {
    let server = TestServer::start().await;
    let (mut alice, _) = server.join("alice").await;

    alice.ws.send(Message::Ping("heartbeat".into())).await.unwrap();

    let reply = timeout(DEFAULT_TIMEOUT, alice.ws.next())
        .await
        .expect("timed out waiting for pong")
        .expect("connection closed")
        .expect("websocket error");
    match reply {
        Message::Pong(payload) => assert_eq!(&payload[..], b"heartbeat"),
        other => panic!("expected pong, got {:?}", other),
    }

    // The connection keeps routing after the ping
    alice.send_public("still here").await;
    assert_eq!(alice.recv_message().await.text, "still here");
}

//! End-to-end tests: login over HTTP, then chat over real WebSocket
//! connections against a server bound to an ephemeral port.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_test::assert_ok;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use chat_hub::app::build_app;
use chat_hub::app_state::AppState;
use chat_hub::domain::{Credentials, TokenStore};
use chat_hub::ws::{EventRouter, SessionRegistry, SessionSettings};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Hub {
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    http: reqwest::Client,
}

impl Hub {
    async fn start(allowed_origins: Vec<String>) -> Self {
        let registry = Arc::new(SessionRegistry::new(
            TokenStore::new(Duration::from_secs(5)),
            EventRouter::with_default_handlers(),
            SessionSettings::default(),
        ));
        let state = AppState::new(
            Arc::clone(&registry),
            Credentials::new("percy", "123"),
            allowed_origins,
        );

        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0").await);
        let addr = assert_ok!(listener.local_addr());
        tokio::spawn(async move {
            let _ = axum::serve(listener, build_app(state)).await;
        });

        Self {
            addr,
            registry,
            http: reqwest::Client::new(),
        }
    }

    async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        let body = serde_json::json!({ "username": username, "password": password });
        assert_ok!(
            self.http
                .post(format!("http://{}/login", self.addr))
                .json(&body)
                .send()
                .await
        )
    }

    async fn token(&self) -> String {
        let response = self.login("percy", "123").await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = assert_ok!(response.json().await);
        let Some(otp) = body["otp"].as_str() else {
            panic!("login response carries otp");
        };
        otp.to_string()
    }

    fn ws_url(&self, otp: &str) -> String {
        format!("ws://{}/ws?otp={otp}", self.addr)
    }

    async fn connect(&self) -> Client {
        let url = self.ws_url(&self.token().await);
        let (client, _) = assert_ok!(connect_async(url).await);
        client
    }

    async fn wait_for_sessions(&self, expected: usize) {
        let reached = tokio::time::timeout(Duration::from_secs(5), async {
            while self.registry.len().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(reached.is_ok(), "expected {expected} sessions");
    }
}

fn rejected_status(err: tungstenite::Error) -> u16 {
    match err {
        tungstenite::Error::Http(response) => response.status().as_u16(),
        other => panic!("expected an HTTP rejection, got {other}"),
    }
}

async fn next_event(client: &mut Client) -> serde_json::Value {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(5), client.next()).await;
        let Ok(Some(Ok(message))) = next else {
            panic!("expected a frame from the hub");
        };
        if let Message::Text(text) = message {
            return assert_ok!(serde_json::from_str(text.as_str()));
        }
    }
}

fn chat(message: &str, from: &str) -> Message {
    Message::text(
        serde_json::json!({
            "type": "send_message",
            "payload": { "message": message, "from": from }
        })
        .to_string(),
    )
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let hub = Hub::start(Vec::new()).await;

    let response = hub.login("percy", "wrong").await;
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert!(assert_ok!(response.bytes().await).is_empty());
    assert!(hub.registry.tokens().is_empty().await);
    assert!(hub.registry.is_empty().await);
}

#[tokio::test]
async fn upgrade_without_token_is_unauthorized() {
    let hub = Hub::start(Vec::new()).await;

    let url = format!("ws://{}/ws", hub.addr);
    let Err(err) = connect_async(url).await else {
        panic!("upgrade without token must fail");
    };
    assert_eq!(rejected_status(err), 401);
    assert!(hub.registry.is_empty().await);
}

#[tokio::test]
async fn token_admits_exactly_one_connection() {
    let hub = Hub::start(Vec::new()).await;
    let otp = hub.token().await;

    let (_client, _) = assert_ok!(connect_async(hub.ws_url(&otp)).await);
    hub.wait_for_sessions(1).await;

    let Err(err) = connect_async(hub.ws_url(&otp)).await else {
        panic!("reused token must fail");
    };
    assert_eq!(rejected_status(err), 401);
    assert_eq!(hub.registry.len().await, 1);
}

#[tokio::test]
async fn chat_message_is_broadcast_to_all_sessions() {
    let hub = Hub::start(Vec::new()).await;
    let mut a = hub.connect().await;
    let mut b = hub.connect().await;
    hub.wait_for_sessions(2).await;

    assert_ok!(a.send(chat("hi", "A")).await);

    for client in [&mut a, &mut b] {
        let event = next_event(client).await;
        assert_eq!(event["type"], "new_message");
        assert_eq!(event["payload"]["message"], "hi");
        assert_eq!(event["payload"]["from"], "A");
        assert!(event["payload"]["sent"].is_string());
    }
}

#[tokio::test]
async fn unknown_event_does_not_drop_connection() {
    let hub = Hub::start(Vec::new()).await;
    let mut a = hub.connect().await;
    hub.wait_for_sessions(1).await;

    let unknown = serde_json::json!({ "type": "unknown_type", "payload": {} }).to_string();
    assert_ok!(a.send(Message::text(unknown)).await);
    assert_ok!(a.send(chat("after", "A")).await);

    let event = next_event(&mut a).await;
    assert_eq!(event["payload"]["message"], "after");
    assert_eq!(hub.registry.len().await, 1);
}

#[tokio::test]
async fn disconnect_evicts_session() {
    let hub = Hub::start(Vec::new()).await;
    let mut a = hub.connect().await;
    let _b = hub.connect().await;
    hub.wait_for_sessions(2).await;

    assert_ok!(a.close(None).await);
    hub.wait_for_sessions(1).await;
}

#[tokio::test]
async fn foreign_origin_is_forbidden_and_token_survives() {
    let hub = Hub::start(vec!["https://localhost:3000".to_string()]).await;
    let otp = hub.token().await;

    let mut request = assert_ok!(hub.ws_url(&otp).into_client_request());
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("https://evil.example"));
    let Err(err) = connect_async(request).await else {
        panic!("foreign origin must be rejected");
    };
    assert_eq!(rejected_status(err), 403);

    let mut request = assert_ok!(hub.ws_url(&otp).into_client_request());
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("https://localhost:3000"));
    let (_client, _) = assert_ok!(connect_async(request).await);
    hub.wait_for_sessions(1).await;
}

#[tokio::test]
async fn health_reports_live_counts() {
    let hub = Hub::start(Vec::new()).await;
    let _pending = hub.token().await;
    let _client = hub.connect().await;
    hub.wait_for_sessions(1).await;

    let response = assert_ok!(
        hub.http
            .get(format!("http://{}/health", hub.addr))
            .send()
            .await
    );
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = assert_ok!(response.json().await);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["active_sessions"], 1);
    assert_eq!(body["pending_tokens"], 1);
}

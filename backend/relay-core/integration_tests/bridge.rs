use crate::helpers::{auth_store, wait_for_status};

use relay_core::address::AddressNormalizer;
use relay_core::backend::{BackendClient, MessagingBackend};
use relay_core::bridge::BridgeBackend;
use relay_core::config::BridgeConfig;
use relay_core::error::backend::BackendError;
use relay_core::session::SessionManager;

use common::RedactedToken;

use models::{MediaPayloadBuilder, SessionStatus};

use std::io::Write;
use std::sync::{Arc, Mutex};

use futures_util::SinkExt;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse,
};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn bridge_config(server: &MockServer) -> BridgeConfig {
    BridgeConfig {
        url: server.uri(),
        token: Some(RedactedToken::new("bridge-secret")),
        ..BridgeConfig::default()
    }
}

fn client_for(server: &MockServer) -> Arc<dyn BackendClient> {
    BridgeBackend::new(&bridge_config(server))
        .unwrap()
        .create_client(&auth_store())
        .unwrap()
}

/// **VALUE**: Verifies text sends hit the session's messages endpoint with the expected body.
///
/// **WHY THIS MATTERS**: This is the wire contract with the bridge; a renamed field means
/// every message silently fails.
///
/// **BUG THIS CATCHES**: Would catch a wrong path, a missing bearer token, or body drift.
#[tokio::test]
async fn given_bridge_when_sending_text_then_posts_message_with_token() {
    // GIVEN: A bridge expecting one text message
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/test-client/messages"))
        .and(header("authorization", "Bearer bridge-secret"))
        .and(body_json(json!({
            "chatId": "919876543210@c.us",
            "content": { "type": "text", "body": "hello" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "msg-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let to = AddressNormalizer::default().normalize("9876543210");

    // WHEN: Sending
    let result = client.send_text(&to, "hello").await;

    // THEN: Accepted
    assert!(result.is_ok(), "send failed: {result:?}");
}

/// **VALUE**: Verifies bridge rejections carry the bridge's own error text.
///
/// **BUG THIS CATCHES**: Would catch the raw JSON body, or a generic message, reaching users.
#[tokio::test]
async fn given_bridge_rejects_when_sending_text_then_rejected_with_error_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/test-client/messages"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Chat not found" })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let to = AddressNormalizer::default().normalize("1");

    let result = client.send_text(&to, "hi").await;

    match result {
        Err(e @ BackendError::Rejected { .. }) => {
            assert_eq!(e.reason(), "Chat not found");
            assert!(!e.is_transient());
        }
        other => panic!("Expected Rejected, got {other:?}"),
    }
}

/// **VALUE**: Verifies media is sent base64-encoded with caption in the same request.
#[tokio::test]
async fn given_media_file_when_sending_media_then_single_request_with_base64_data() {
    // GIVEN: A small file and a bridge expecting it
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    write!(file, "abc").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/test-client/messages"))
        .and(body_partial_json(json!({
            "chatId": "919876543210@c.us",
            "caption": "notes",
            "content": { "type": "media", "mimetype": "text/plain", "data": "YWJj" },
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let media = MediaPayloadBuilder::default()
        .with_source(file.path())
        .with_mime_type("text/plain")
        .with_size_bytes(3)
        .build()
        .unwrap();
    let client = client_for(&server);
    let to = AddressNormalizer::default().normalize("9876543210");

    // WHEN: Sending media
    let result = client.send_media(&to, &media, "notes").await;

    // THEN: One request carried file and caption
    assert!(result.is_ok(), "send failed: {result:?}");
}

/// **VALUE**: Verifies destroying a session the bridge already forgot is not an error.
#[tokio::test]
async fn given_session_gone_on_bridge_when_destroying_then_ok() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/test-client"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);

    assert!(client.destroy().await.is_ok());
    assert!(!client.is_ready());
}

/// **VALUE**: Verifies initialize fails cleanly when the event stream can't be opened.
///
/// **WHY THIS MATTERS**: Without the event stream the relay would never see a QR code, so
/// starting the session anyway would leave it stuck in `initializing`.
///
/// **BUG THIS CATCHES**: Would catch the session being started before the subscription.
#[tokio::test]
async fn given_bridge_without_event_stream_when_initializing_then_error_and_no_start() {
    // GIVEN: A plain HTTP server that won't upgrade to WebSocket
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions/test-client"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let backend = BridgeBackend::new(&bridge_config(&server)).unwrap();
    let session = SessionManager::new(Arc::new(backend), auth_store());

    // WHEN: Connecting
    let result = session.connect().await;

    // THEN: The error surfaces, no handle is kept and the start call was never made
    assert!(result.is_err());
    assert!(session.client_handle().await.is_none());
}

/// **VALUE**: Verifies the health check.
#[tokio::test]
async fn given_bridge_health_endpoint_when_checked_then_reflects_status() {
    let healthy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&healthy)
        .await;
    let unhealthy = MockServer::start().await;

    let up = BridgeBackend::new(&bridge_config(&healthy)).unwrap();
    let down = BridgeBackend::new(&bridge_config(&unhealthy)).unwrap();

    assert!(up.check_health().await);
    assert!(!down.check_health().await);
}

/// **VALUE**: Verifies an unusable bridge URL is rejected at construction.
#[test]
fn given_invalid_url_when_building_backend_then_url_error() {
    let config = BridgeConfig {
        url: String::from("not a url"),
        ..BridgeConfig::default()
    };

    assert!(matches!(
        BridgeBackend::new(&config),
        Err(BackendError::UrlParse { .. })
    ));
}

// ============================================================================
// Event stream against a live socket
// ============================================================================

/// A bridge on one local port. The first connection is upgraded to the event
/// WebSocket; every later one is answered as plain HTTP with `200 {}`.
struct EventBridge {
    url: String,
    frames: mpsc::UnboundedSender<Message>,
    /// `(path, authorization header)` of the WebSocket handshake
    handshake: Arc<Mutex<Option<(String, Option<String>)>>>,
    /// Request lines of the plain HTTP calls, in arrival order
    requests: Arc<Mutex<Vec<String>>>,
}

impl EventBridge {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (frames, mut frames_rx) = mpsc::unbounded_channel::<Message>();
        let handshake = Arc::new(Mutex::new(None));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handshake_slot = Arc::clone(&handshake);
        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |request: &HandshakeRequest,
                                 response: HandshakeResponse|
                  -> Result<HandshakeResponse, ErrorResponse> {
                let authorization = request
                    .headers()
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                *handshake_slot.lock().unwrap() =
                    Some((request.uri().path().to_string(), authorization));
                Ok(response)
            };
            let mut socket = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();

            tokio::spawn(async move {
                while let Some(frame) = frames_rx.recv().await {
                    if socket.send(frame).await.is_err() {
                        break;
                    }
                }
            });

            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(answer_http(stream, Arc::clone(&seen)));
            }
        });

        Self {
            url,
            frames,
            handshake,
            requests,
        }
    }

    fn send(&self, frame: &str) {
        self.frames.send(Message::text(frame.to_string())).unwrap();
    }

    fn close(&self) {
        self.frames.send(Message::Close(None)).unwrap();
    }

    fn handshake(&self) -> Option<(String, Option<String>)> {
        self.handshake.lock().unwrap().clone()
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Read one HTTP request, record its request line, answer `200 {}`.
async fn answer_http(mut stream: TcpStream, seen: Arc<Mutex<Vec<String>>>) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let read = stream.read(&mut chunk).await.unwrap_or(0);
        if read == 0 {
            return;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buffer.len() < head_end + content_length {
        let read = stream.read(&mut chunk).await.unwrap_or(0);
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    if let Some(line) = head.lines().next() {
        seen.lock().unwrap().push(line.to_string());
    }

    let _ = stream
        .write_all(
            b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{}",
        )
        .await;
    let _ = stream.shutdown().await;
}

/// **VALUE**: Verifies the full bridge session lifecycle over a real socket: subscribe,
/// start, QR, ready, close.
///
/// **WHY THIS MATTERS**: This is the only path by which the relay learns a QR code was
/// issued or scanned. The ready flag it drives decides whether any message is sent.
///
/// **BUG THIS CATCHES**: Would catch the session being started before the subscription, the
/// token missing from the handshake, frames not reaching the session, `is_ready()` not
/// following the frames, or a closed socket leaving the session `ready`.
#[tokio::test]
async fn given_live_event_stream_when_bridge_sends_qr_ready_close_then_session_follows() {
    // GIVEN: A bridge with an event socket and a session driven by it
    let bridge = EventBridge::start().await;
    let config = BridgeConfig {
        url: bridge.url.clone(),
        token: Some(RedactedToken::new("bridge-secret")),
        ..BridgeConfig::default()
    };
    let backend = BridgeBackend::new(&config).unwrap();
    let session = SessionManager::new(Arc::new(backend), auth_store());

    // WHEN: Connecting
    session.connect().await.unwrap();

    // THEN: Subscribed with the token, then started, and not ready yet
    assert_eq!(
        bridge.handshake(),
        Some((
            String::from("/sessions/test-client/events"),
            Some(String::from("Bearer bridge-secret")),
        ))
    );
    assert_eq!(
        bridge.requests(),
        vec![String::from("POST /sessions/test-client HTTP/1.1")]
    );
    let client = Arc::clone(session.client_handle().await.unwrap().client());
    assert!(!client.is_ready());

    // WHEN: The bridge issues a QR code
    bridge.send(r#"{"event":"qr","qr":"2@scan-me"}"#);

    // THEN: The session awaits auth with that code
    wait_for_status(&session, SessionStatus::AwaitingAuth).await;
    assert_eq!(
        session.current_state().await.unwrap().auth_challenge(),
        Some("2@scan-me")
    );
    assert!(!client.is_ready());

    // WHEN: The phone scans it
    bridge.send(r#"{"event":"ready"}"#);

    // THEN: Ready, and the client says so
    wait_for_status(&session, SessionStatus::Ready).await;
    assert!(client.is_ready());

    // WHEN: The bridge closes the socket
    bridge.close();

    // THEN: Disconnected, handle released, client no longer ready
    wait_for_status(&session, SessionStatus::Disconnected).await;
    assert!(session.client_handle().await.is_none());
    assert!(!client.is_ready());
}

//! Shared fixtures for the integration tests.
//!
//! - A scripted in-memory backend built only on the public traits
//! - Router and request builders for driving the HTTP surface with `oneshot`
//!
//! The unit tests have their own fake in `src/tests/fake.rs`. That one reaches
//! crate-private items (the session inbox, per-client send logs, media
//! metadata) which this crate-external test tree cannot see, so this backend
//! only scripts what the HTTP surface exposes.

use relay_core::address::AddressNormalizer;
use relay_core::api::{ApiState, UploadStore, router};
use relay_core::backend::{AuthStore, BackendClient, MessagingBackend, SessionEvent};
use relay_core::dispatch::Dispatcher;
use relay_core::error::backend::BackendError;
use relay_core::session::{EventSink, SessionManager};

use common::{ErrorLocation, HttpStatusCode};

use models::{MediaPayload, RecipientAddress, SessionStatus};

use std::panic::Location;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header::CONTENT_TYPE};
use serde_json::Value;
use tempfile::TempDir;

pub const TEST_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
pub const MULTIPART_BOUNDARY: &str = "relay-test-boundary";

#[derive(Default)]
pub struct ScriptedBackend {
    pub ready_on_init: bool,
    pub fail_init: bool,
    pub failing_recipient: Option<String>,
    pub(crate) created: AtomicUsize,
    pub(crate) sent: Arc<Mutex<Vec<(String, String)>>>,
    pub(crate) latest_sink: Arc<Mutex<Option<EventSink>>>,
}

impl ScriptedBackend {
    pub fn ready() -> Self {
        Self {
            ready_on_init: true,
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// `(chat address, text or caption)` for every successful send, in order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Raise `event` from the most recently initialized client.
    pub async fn emit(&self, event: SessionEvent) {
        let sink = self
            .latest_sink
            .lock()
            .unwrap()
            .clone()
            .expect("a client was initialized");
        sink.emit(event).await;
    }
}

impl MessagingBackend for ScriptedBackend {
    fn create_client(&self, _store: &AuthStore) -> Result<Arc<dyn BackendClient>, BackendError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedClient {
            ready_on_init: self.ready_on_init,
            fail_init: self.fail_init,
            failing_recipient: self.failing_recipient.clone(),
            ready: AtomicBool::new(false),
            sent: Arc::clone(&self.sent),
            latest_sink: Arc::clone(&self.latest_sink),
        }))
    }
}

struct ScriptedClient {
    ready_on_init: bool,
    fail_init: bool,
    failing_recipient: Option<String>,
    ready: AtomicBool,
    sent: Arc<Mutex<Vec<(String, String)>>>,
    latest_sink: Arc<Mutex<Option<EventSink>>>,
}

impl ScriptedClient {
    fn record(&self, to: &RecipientAddress, text: &str) -> Result<(), BackendError> {
        if self.failing_recipient.as_deref() == Some(to.as_str()) {
            return Err(rejection("Recipient not on WhatsApp"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), text.to_string()));
        Ok(())
    }
}

#[async_trait]
impl BackendClient for ScriptedClient {
    async fn initialize(&self, events: EventSink) -> Result<(), BackendError> {
        if self.fail_init {
            return Err(rejection("Failed to launch the browser process"));
        }
        *self.latest_sink.lock().unwrap() = Some(events.clone());
        if self.ready_on_init {
            self.ready.store(true, Ordering::SeqCst);
            events.emit(SessionEvent::Ready).await;
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn send_text(&self, to: &RecipientAddress, body: &str) -> Result<(), BackendError> {
        self.record(to, body)
    }

    async fn send_media(
        &self,
        to: &RecipientAddress,
        _media: &MediaPayload,
        caption: &str,
    ) -> Result<(), BackendError> {
        self.record(to, caption)
    }

    async fn destroy(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

fn rejection(message: &str) -> BackendError {
    BackendError::Rejected {
        status: HttpStatusCode(400),
        message: message.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}

pub fn auth_store() -> AuthStore {
    AuthStore {
        client_id: String::from("test-client"),
        data_path: PathBuf::from("sessions"),
        headless: true,
    }
}

pub struct TestApp {
    pub backend: Arc<ScriptedBackend>,
    pub session: SessionManager,
    pub router: Router,
    pub uploads: TempDir,
}

pub fn test_app(backend: ScriptedBackend) -> TestApp {
    let backend = Arc::new(backend);
    let session = SessionManager::new(backend.clone(), auth_store());
    let dispatcher = Dispatcher::new(session.clone(), AddressNormalizer::default());
    let uploads = tempfile::tempdir().unwrap();
    let state = ApiState::new(
        session.clone(),
        dispatcher,
        UploadStore::new(uploads.path(), false),
    );

    TestApp {
        backend,
        session,
        router: router(state, TEST_MAX_UPLOAD_BYTES),
        uploads,
    }
}

/// Connect and wait for the scripted `Ready` to be applied.
pub async fn connect_ready(session: &SessionManager) {
    session.connect().await.unwrap();
    wait_for_status(session, SessionStatus::Ready).await;
}

/// Poll until the session actor has applied whatever produces `status`.
pub async fn wait_for_status(session: &SessionManager, status: SessionStatus) {
    for _ in 0..400 {
        let current = session.current_state().await.ok().map(|s| s.status());
        if current == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session never reached {status:?}");
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// One multipart part: `(field name, file name for file parts, bytes)`.
pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

pub fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, file_name, data) in parts {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        let disposition = match file_name {
            Some(file_name) => format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            ),
            None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"),
        };
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

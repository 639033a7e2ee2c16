//! Scripted in-memory backend for driving the session manager and dispatchers.

use crate::backend::{AuthStore, BackendClient, MessagingBackend, SessionEvent};
use crate::error::backend::BackendError;
use crate::session::{EventSink, SessionManager};

use common::{ErrorLocation, HttpStatusCode};

use models::{MediaPayload, RecipientAddress, SessionStatus};

use std::panic::Location;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};

pub(crate) const REJECTION_TEXT: &str = "No LID for user";

/// How every client created by a [`FakeBackend`] behaves.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeScript {
    /// Emit `Ready` from `initialize`.
    pub ready_on_init: bool,
    /// Fail `initialize` with a rejection.
    pub fail_init: bool,
    /// Chat addresses whose sends are rejected.
    pub failing_recipients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Sent {
    Text { to: String, body: String },
    Media { to: String, mime_type: String, size_bytes: u64, caption: String },
}

pub(crate) struct FakeBackend {
    script: FakeScript,
    clients: Mutex<Vec<Arc<FakeClient>>>,
    created: AtomicUsize,
}

impl FakeBackend {
    pub(crate) fn new(script: FakeScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            clients: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
        })
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub(crate) fn client(&self, index: usize) -> Arc<FakeClient> {
        Arc::clone(&self.clients.lock().unwrap()[index])
    }

    pub(crate) fn latest(&self) -> Arc<FakeClient> {
        let clients = self.clients.lock().unwrap();
        Arc::clone(clients.last().expect("at least one client created"))
    }
}

impl MessagingBackend for FakeBackend {
    fn create_client(&self, _store: &AuthStore) -> Result<Arc<dyn BackendClient>, BackendError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let client = Arc::new(FakeClient {
            script: self.script.clone(),
            ready: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            sink: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        });
        self.clients.lock().unwrap().push(Arc::clone(&client));
        Ok(client)
    }
}

pub(crate) struct FakeClient {
    script: FakeScript,
    ready: AtomicBool,
    destroyed: AtomicBool,
    sink: Mutex<Option<EventSink>>,
    sent: Mutex<Vec<Sent>>,
}

impl FakeClient {
    /// Push an event as if the backend raised it.
    pub(crate) async fn emit(&self, event: SessionEvent) {
        match event {
            SessionEvent::Ready => self.ready.store(true, Ordering::SeqCst),
            SessionEvent::Disconnected(_) => self.ready.store(false, Ordering::SeqCst),
            SessionEvent::QrCodeIssued(_) => {}
        }

        let sink = self.sink.lock().unwrap().clone().expect("client initialized");
        sink.emit(event).await;
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn was_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn check_recipient(&self, to: &RecipientAddress) -> Result<(), BackendError> {
        if self.script.failing_recipients.iter().any(|r| r == to.as_str()) {
            return Err(rejection(REJECTION_TEXT));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendClient for FakeClient {
    async fn initialize(&self, events: EventSink) -> Result<(), BackendError> {
        if self.script.fail_init {
            return Err(rejection("browser failed to launch"));
        }

        *self.sink.lock().unwrap() = Some(events);

        if self.script.ready_on_init {
            self.emit(SessionEvent::Ready).await;
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn send_text(&self, to: &RecipientAddress, body: &str) -> Result<(), BackendError> {
        self.check_recipient(to)?;
        self.sent.lock().unwrap().push(Sent::Text {
            to: to.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    async fn send_media(
        &self,
        to: &RecipientAddress,
        media: &MediaPayload,
        caption: &str,
    ) -> Result<(), BackendError> {
        self.check_recipient(to)?;
        self.sent.lock().unwrap().push(Sent::Media {
            to: to.to_string(),
            mime_type: media.mime_type().to_string(),
            size_bytes: media.size_bytes(),
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BackendError> {
        self.destroyed.store(true, Ordering::SeqCst);
        self.ready.store(false, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) fn rejection(message: &str) -> BackendError {
    BackendError::Rejected {
        status: HttpStatusCode(400),
        message: message.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}

pub(crate) fn auth_store() -> AuthStore {
    AuthStore {
        client_id: String::from("test-client"),
        data_path: PathBuf::from("sessions"),
        headless: true,
    }
}

pub(crate) fn session_with(script: FakeScript) -> (Arc<FakeBackend>, SessionManager) {
    let backend = FakeBackend::new(script);
    let session = SessionManager::new(backend.clone(), auth_store());
    (backend, session)
}

/// Poll until the actor has applied whatever produces `status`.
pub(crate) async fn wait_for_status(session: &SessionManager, status: SessionStatus) {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let current = session.current_state().await.ok().map(|state| state.status());
        if current == Some(status) {
            return;
        }
        assert!(Instant::now() < deadline, "session never reached {status:?}");
        sleep(Duration::from_millis(5)).await;
    }
}

//! HTTP/WebSocket client for the WhatsApp automation bridge.
//!
//! The bridge is a sidecar that owns the headless browser and the actual
//! WhatsApp Web session. Commands go over JSON HTTP, lifecycle events come
//! back over a WebSocket per session:
//!
//! | Operation | Call |
//! |---|---|
//! | start | `POST sessions/{clientId}` |
//! | events | `GET sessions/{clientId}/events` (WebSocket) |
//! | send | `POST sessions/{clientId}/messages` |
//! | destroy | `DELETE sessions/{clientId}` |

mod events;
pub mod launcher;

pub(crate) use events::{STREAM_CLOSED_REASON, parse_frame, pump};

use crate::backend::{AuthStore, BackendClient, MessagingBackend};
use crate::config::BridgeConfig;
use crate::error::backend::BackendError;
use crate::session::EventSink;

use common::{ErrorLocation, HttpStatusCode, RedactedToken};

use models::{MediaPayload, RecipientAddress};

use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use backoff::{ExponentialBackoff, backoff::Backoff};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{debug, info, trace, warn};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::sleep as TokioSleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use url::Url;

const SESSIONS_SEGMENT: &str = "sessions";
const EVENTS_SEGMENT: &str = "events";
const MESSAGES_SEGMENT: &str = "messages";
const HEALTH_SEGMENT: &str = "health";
const ERROR_FIELD: &str = "error";

/// Factory producing [`BridgeClient`]s that share one connection pool.
#[derive(Clone)]
pub struct BridgeBackend {
    base_url: Url,
    http: Client,
    token: Option<RedactedToken>,
    startup_timeout: Duration,
}

impl BridgeBackend {
    pub fn new(config: &BridgeConfig) -> Result<Self, BackendError> {
        let base_url = Url::parse(&config.url)?;
        ensure_base(&base_url)?;

        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            base_url,
            http,
            token: config.token.clone(),
            startup_timeout: config.startup_timeout(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET health` answered with 2xx.
    pub async fn check_health(&self) -> bool {
        let Ok(url) = endpoint(&self.base_url, &[HEALTH_SEGMENT]) else {
            return false;
        };

        match authorize(self.http.get(url), self.token.as_ref()).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!("Bridge health check returned {}", response.status());
                false
            }
            Err(e) => {
                debug!("Bridge health check failed: {e}");
                false
            }
        }
    }
}

impl MessagingBackend for BridgeBackend {
    fn create_client(&self, store: &AuthStore) -> Result<Arc<dyn BackendClient>, BackendError> {
        let session_url = endpoint(&self.base_url, &[SESSIONS_SEGMENT, &store.client_id])?;

        Ok(Arc::new(BridgeClient {
            session_url,
            http: self.http.clone(),
            token: self.token.clone(),
            store: store.clone(),
            startup_timeout: self.startup_timeout,
            ready: Arc::new(AtomicBool::new(false)),
            listener: Mutex::new(None),
        }))
    }
}

/// One bridge session, addressed by the auth store's client id.
pub struct BridgeClient {
    session_url: Url,
    http: Client,
    token: Option<RedactedToken>,
    store: AuthStore,
    startup_timeout: Duration,

    /// Flipped by the event listener on `ready` / `disconnected`
    ready: Arc<AtomicBool>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl BridgeClient {
    async fn start_session(&self) -> Result<(), BackendError> {
        let body = json!({
            "clientId": self.store.client_id,
            "dataPath": self.store.data_path.to_string_lossy(),
            "headless": self.store.headless,
        });

        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.startup_timeout),
            ..Default::default()
        };

        loop {
            match self.try_start_session(&body).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() => match backoff.next_backoff() {
                    Some(duration) => {
                        trace!("Bridge not ready to start session ({e}), retrying after {duration:?}");
                        TokioSleep(duration).await;
                    }
                    None => {
                        warn!("Giving up starting bridge session after {:?}", self.startup_timeout);
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_start_session(&self, body: &Value) -> Result<(), BackendError> {
        let response = self
            .request(self.http.post(self.session_url.clone()))
            .json(body)
            .send()
            .await?;

        check_status(response).await.map(|_| ())
    }

    async fn post_message(&self, payload: Value) -> Result<(), BackendError> {
        let url = endpoint(&self.session_url, &[MESSAGES_SEGMENT])?;
        let response = self
            .request(self.http.post(url))
            .json(&payload)
            .send()
            .await?;

        check_status(response).await.map(|_| ())
    }

    fn request(&self, request: RequestBuilder) -> RequestBuilder {
        authorize(request, self.token.as_ref())
    }
}

#[async_trait]
impl BackendClient for BridgeClient {
    async fn initialize(&self, events: EventSink) -> Result<(), BackendError> {
        // Subscribe before starting so the first QR code is not missed.
        let mut events_url = endpoint(&self.session_url, &[EVENTS_SEGMENT])?;
        let ws_scheme = if events_url.scheme() == "https" { "wss" } else { "ws" };
        events_url
            .set_scheme(ws_scheme)
            .map_err(|_| BackendError::UrlParse {
                message: format!("Cannot derive WebSocket URL from {events_url}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let mut request = events_url.as_str().into_client_request()?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.expose())).map_err(|e| {
                BackendError::EventStream {
                    message: format!("Invalid bridge token header: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                }
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, _) = connect_async(request).await?;
        debug!("Subscribed to bridge events at {events_url}");

        self.start_session().await?;
        info!("Bridge session '{}' started", self.store.client_id);

        let pump = tokio::spawn(events::pump(stream, events, Arc::clone(&self.ready)));
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(previous) = listener.replace(pump) {
                previous.abort();
            }
        }

        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn send_text(&self, to: &RecipientAddress, body: &str) -> Result<(), BackendError> {
        self.post_message(json!({
            "chatId": to.as_str(),
            "content": { "type": "text", "body": body },
        }))
        .await
    }

    async fn send_media(
        &self,
        to: &RecipientAddress,
        media: &MediaPayload,
        caption: &str,
    ) -> Result<(), BackendError> {
        let bytes = tokio::fs::read(media.source()).await?;
        debug!(
            "Uploading {} ({}, {} bytes) to bridge",
            media.file_name(),
            media.mime_type(),
            bytes.len()
        );

        self.post_message(json!({
            "chatId": to.as_str(),
            "caption": caption,
            "content": {
                "type": "media",
                "mimetype": media.mime_type(),
                "filename": media.file_name(),
                "data": BASE64.encode(&bytes),
            },
        }))
        .await
    }

    async fn destroy(&self) -> Result<(), BackendError> {
        self.ready.store(false, Ordering::SeqCst);

        if let Ok(mut listener) = self.listener.lock() {
            if let Some(pump) = listener.take() {
                pump.abort();
            }
        }

        let response = self
            .request(self.http.delete(self.session_url.clone()))
            .send()
            .await?;

        // Already gone on the bridge side is fine.
        if response.status().as_u16() == 404 {
            return Ok(());
        }

        check_status(response).await.map(|_| ())
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(pump) = listener.take() {
                pump.abort();
            }
        }
    }
}

fn authorize(request: RequestBuilder, token: Option<&RedactedToken>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token.expose()),
        None => request,
    }
}

/// Bridge base URLs must be able to carry path segments.
fn ensure_base(url: &Url) -> Result<(), BackendError> {
    if url.cannot_be_a_base() {
        return Err(BackendError::UrlParse {
            message: format!("Bridge URL cannot be used as a base: {url}"),
            location: ErrorLocation::from(Location::caller()),
        });
    }
    Ok(())
}

/// Append percent-encoded path segments to `base`.
#[track_caller]
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, BackendError> {
    let location = ErrorLocation::from(Location::caller());
    let mut url = base.clone();

    url.path_segments_mut()
        .map_err(|_| BackendError::UrlParse {
            message: format!("Bridge URL cannot be used as a base: {base}"),
            location,
        })?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

/// Pass 2xx through; turn anything else into [`BackendError::Rejected`] with the bridge's text.
async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = HttpStatusCode::from(response.status().as_u16());
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(BackendError::Rejected {
        status,
        message: rejection_message(&text),
        location: ErrorLocation::from(Location::caller()),
    })
}

/// The `error` field of a JSON body, else the trimmed raw body.
pub(crate) fn rejection_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get(ERROR_FIELD)
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

//! Seam between the relay and the messaging automation engine.
//!
//! The relay never talks to WhatsApp directly. It asks a [`MessagingBackend`]
//! for a fresh [`BackendClient`] bound to the persistent auth store, tells it
//! to start connecting, and receives lifecycle events through an
//! [`EventSink`](crate::session::EventSink). [`crate::bridge`] is the
//! production implementation; tests plug in scripted fakes.

use crate::error::backend::BackendError;
use crate::session::EventSink;

use models::{MediaPayload, RecipientAddress};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

/// Where the backend keeps its authenticated session between restarts.
///
/// The relay never reads this directory; it only tells the backend which
/// directory and client id to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStore {
    pub client_id: String,
    pub data_path: PathBuf,
    pub headless: bool,
}

/// Lifecycle notifications emitted by a backend client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The backend needs the user to scan this challenge.
    QrCodeIssued(String),
    Ready,
    Disconnected(String),
}

/// Factory for backend clients. One live client at a time is the session
/// manager's concern, not the factory's.
pub trait MessagingBackend: Send + Sync {
    fn create_client(&self, store: &AuthStore) -> Result<Arc<dyn BackendClient>, BackendError>;
}

/// One backend session.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Start the connection sequence and return without waiting for `Ready`.
    async fn initialize(&self, events: EventSink) -> Result<(), BackendError>;

    /// Whether the backend reports this session as authenticated.
    fn is_ready(&self) -> bool;

    async fn send_text(&self, to: &RecipientAddress, body: &str) -> Result<(), BackendError>;

    /// Media and caption go out as a single message.
    async fn send_media(
        &self,
        to: &RecipientAddress,
        media: &MediaPayload,
        caption: &str,
    ) -> Result<(), BackendError>;

    async fn destroy(&self) -> Result<(), BackendError>;
}

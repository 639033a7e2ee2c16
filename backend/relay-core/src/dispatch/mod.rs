//! Sending one message to one recipient.
//!
//! Backend failures never escape this module as faults: they come back as a
//! failed [`DispatchResult`] carrying the backend's own text. The only error
//! [`Dispatcher::send_one`] returns is `NotReady`, so the single-send endpoint
//! can tell "no session" apart from "backend said no".

pub mod batch;

use crate::address::AddressNormalizer;
use crate::error::dispatch::DispatchError;
use crate::session::{ClientHandle, SessionManager};

use common::ErrorLocation;

use models::{DispatchResult, MediaPayload, MediaPayloadBuilder, RecipientAddress};

use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

/// WhatsApp Web rejects attachments above this size.
pub const MAX_MEDIA_BYTES: u64 = 16 * 1024 * 1024;

pub const MEDIA_TOO_LARGE_MESSAGE: &str = "File size exceeds the limit of 16MB.";
pub const NOT_READY_MESSAGE: &str =
    "WhatsApp client is not ready! Please wait for initialization.";
pub const MESSAGE_SENT_MESSAGE: &str = "Message sent successfully!";
pub const MEDIA_SENT_MESSAGE: &str = "Media message sent successfully!";
pub const TEXT_SENT_MESSAGE: &str = "Text message sent successfully!";
pub const SEND_FAILED_MESSAGE: &str = "Failed to send message.";

/// What to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Plain text, sent as-is.
    Text(String),

    /// An uploaded file with optional caption. Without a file, the caption
    /// goes out as a text message.
    Attachment {
        source: Option<PathBuf>,
        caption: String,
    },
}

/// Delivers a single message through the session's live client.
#[derive(Clone)]
pub struct Dispatcher {
    session: SessionManager,
    normalizer: AddressNormalizer,
}

impl Dispatcher {
    pub fn new(session: SessionManager, normalizer: AddressNormalizer) -> Self {
        Self {
            session,
            normalizer,
        }
    }

    /// Send `body` to `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NotReady`] if there is no authenticated client.
    /// Everything else, including backend rejections, is folded into the
    /// returned [`DispatchResult`].
    pub async fn send_one(
        &self,
        raw: &str,
        body: &MessageBody,
    ) -> Result<DispatchResult, DispatchError> {
        let handle = self.ready_handle().await?;
        Ok(self.deliver(&handle, raw, body).await)
    }

    /// Like [`send_one`](Self::send_one) but `NotReady` becomes a failed result too.
    pub(crate) async fn attempt(&self, raw: &str, body: &MessageBody) -> DispatchResult {
        match self.ready_handle().await {
            Ok(handle) => self.deliver(&handle, raw, body).await,
            Err(e) => {
                warn!("Skipping send to {raw}: {e}");
                DispatchResult::failed(raw, e.reason())
            }
        }
    }

    async fn ready_handle(&self) -> Result<ClientHandle, DispatchError> {
        self.session
            .ready_client()
            .await
            .ok_or_else(|| DispatchError::NotReady {
                message: String::from(NOT_READY_MESSAGE),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    async fn deliver(&self, handle: &ClientHandle, raw: &str, body: &MessageBody) -> DispatchResult {
        let address = self.normalizer.normalize(raw);
        info!("Sending message to: {address}");

        match self.try_deliver(handle, &address, body).await {
            Ok(message) => {
                info!("Message sent to {address}");
                DispatchResult::sent(raw, message)
            }
            Err(e) => {
                error!("Error sending message to {address}: {e}");
                let reason = e.reason();
                if reason.is_empty() {
                    DispatchResult::failed(raw, SEND_FAILED_MESSAGE)
                } else {
                    DispatchResult::failed(raw, reason)
                }
            }
        }
    }

    async fn try_deliver(
        &self,
        handle: &ClientHandle,
        address: &RecipientAddress,
        body: &MessageBody,
    ) -> Result<&'static str, DispatchError> {
        let client = handle.client();

        match body {
            MessageBody::Text(text) => {
                client.send_text(address, text).await?;
                Ok(MESSAGE_SENT_MESSAGE)
            }
            MessageBody::Attachment {
                source: None,
                caption,
            } => {
                client.send_text(address, caption).await?;
                Ok(TEXT_SENT_MESSAGE)
            }
            MessageBody::Attachment {
                source: Some(source),
                caption,
            } => {
                let media = load_media(source).await?;
                client.send_media(address, &media, caption).await?;
                Ok(MEDIA_SENT_MESSAGE)
            }
        }
    }
}

/// Resolve an uploaded file into a payload, enforcing the size limit before any send.
pub(crate) async fn load_media(source: &Path) -> Result<MediaPayload, DispatchError> {
    let metadata = tokio::fs::metadata(source)
        .await
        .map_err(|e| DispatchError::MediaUnavailable {
            message: format!("Media file not found: {}: {e}", source.display()),
            location: ErrorLocation::from(Location::caller()),
        })?;

    if !metadata.is_file() {
        return Err(DispatchError::MediaUnavailable {
            message: format!("Media source is not a file: {}", source.display()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let size = metadata.len();
    debug!("Media file size: {size}");

    if size > MAX_MEDIA_BYTES {
        return Err(DispatchError::MediaTooLarge {
            message: String::from(MEDIA_TOO_LARGE_MESSAGE),
            size,
            limit: MAX_MEDIA_BYTES,
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let mime_type = mime_guess::from_path(source).first_or_octet_stream();
    debug!("Media MIME type: {mime_type}");

    MediaPayloadBuilder::default()
        .with_source(source)
        .with_mime_type(mime_type.essence_str())
        .with_size_bytes(size)
        .build()
        .map_err(|e| DispatchError::MediaUnavailable {
            message: e.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
}

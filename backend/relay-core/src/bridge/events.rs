//! Bridge lifecycle event stream.

use crate::backend::SessionEvent;
use crate::error::backend::BackendError;
use crate::session::EventSink;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{Stream, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

pub(crate) const STREAM_CLOSED_REASON: &str = "bridge event stream closed";

/// One JSON frame from `sessions/{clientId}/events`.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum BridgeEvent {
    Qr {
        qr: String,
    },
    Ready,
    Disconnected {
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Decode a text frame. `Ok(None)` for event kinds the relay doesn't track.
pub(crate) fn parse_frame(text: &str) -> Result<Option<SessionEvent>, BackendError> {
    let event = match serde_json::from_str::<BridgeEvent>(text)? {
        BridgeEvent::Qr { qr } => SessionEvent::QrCodeIssued(qr),
        BridgeEvent::Ready => SessionEvent::Ready,
        BridgeEvent::Disconnected { reason } => SessionEvent::Disconnected(
            reason.unwrap_or_else(|| STREAM_CLOSED_REASON.to_string()),
        ),
        BridgeEvent::Unknown => return Ok(None),
    };

    Ok(Some(event))
}

/// Forward bridge events to the session inbox until the stream ends.
///
/// The end of the stream, for whatever reason, is reported as a disconnect
/// unless the bridge already said so.
pub(crate) async fn pump<S>(mut stream: S, sink: EventSink, ready: Arc<AtomicBool>)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let mut reason = String::from(STREAM_CLOSED_REASON);

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => match parse_frame(text.as_str()) {
                Ok(Some(event)) => {
                    let disconnected = matches!(event, SessionEvent::Disconnected(_));
                    ready.store(event == SessionEvent::Ready, Ordering::SeqCst);

                    if !sink.emit(event).await || disconnected {
                        return;
                    }
                }
                Ok(None) => debug!("Ignoring unrecognized bridge event: {}", text.as_str()),
                Err(e) => warn!("Malformed bridge event frame: {e}"),
            },
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    reason = format!("{STREAM_CLOSED_REASON}: {}", frame.reason.as_str());
                }
                break;
            }
            Ok(_) => {}
            Err(e) => {
                reason = format!("{STREAM_CLOSED_REASON}: {e}");
                break;
            }
        }
    }

    info!("Bridge event stream for client {} ended", sink.instance());
    ready.store(false, Ordering::SeqCst);
    sink.emit(SessionEvent::Disconnected(reason)).await;
}

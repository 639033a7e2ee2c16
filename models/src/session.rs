//! Lifecycle state of the single backend session.

use serde::Serialize;

/// Where the backend session is in its lifecycle.
///
/// The wire names are the ones existing dashboards already poll for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    #[serde(rename = "initializing")]
    Initializing,
    #[serde(rename = "QR RECEIVED")]
    AwaitingAuth,
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "disconnected")]
    Disconnected,
}

/// Snapshot of the session: status plus the pending auth challenge, if any.
///
/// Only the transition constructors below produce values, which keeps
/// `auth_challenge` populated exactly while `status == AwaitingAuth`. It is
/// serialize-only for the same reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    status: SessionStatus,
    #[serde(rename = "qrCode")]
    auth_challenge: Option<String>,
}

impl SessionState {
    pub fn initializing() -> Self {
        Self {
            status: SessionStatus::Initializing,
            auth_challenge: None,
        }
    }

    pub fn awaiting_auth(challenge: impl Into<String>) -> Self {
        Self {
            status: SessionStatus::AwaitingAuth,
            auth_challenge: Some(challenge.into()),
        }
    }

    pub fn ready() -> Self {
        Self {
            status: SessionStatus::Ready,
            auth_challenge: None,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            auth_challenge: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn auth_challenge(&self) -> Option<&str> {
        self.auth_challenge.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initializing()
    }
}

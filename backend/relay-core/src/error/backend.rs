use common::{ErrorLocation, HttpStatusCode};

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

/// Failures talking to the messaging backend.
///
/// `message` holds the backend's own text; [`BackendError::reason`] exposes it
/// without the location suffix so it can be handed back to API callers.
#[derive(Debug, ThisError)]
pub enum BackendError {
    #[error("HTTP Error: {message} {location}")]
    Http {
        message: String,
        location: ErrorLocation,
    },

    #[error("JSON Error: {message} {location}")]
    Json {
        message: String,
        location: ErrorLocation,
    },

    #[error("URL Parse Error: {message} {location}")]
    UrlParse {
        message: String,
        location: ErrorLocation,
    },

    #[error("Backend Rejected Error: HTTP {status} - {message} {location}")]
    Rejected {
        status: HttpStatusCode,
        message: String,
        location: ErrorLocation,
    },

    #[error("Event Stream Error: {message} {location}")]
    EventStream {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },
}

impl BackendError {
    pub fn reason(&self) -> &str {
        match self {
            BackendError::Http { message, .. }
            | BackendError::Json { message, .. }
            | BackendError::UrlParse { message, .. }
            | BackendError::Rejected { message, .. }
            | BackendError::EventStream { message, .. }
            | BackendError::Io { message, .. } => message,
        }
    }

    /// Worth another attempt: the bridge is unreachable or shedding load.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Http { .. } => true,
            BackendError::Rejected { status, .. } => status.is_retryable(),
            _ => false,
        }
    }
}

impl From<url::ParseError> for BackendError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        BackendError::UrlParse {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    #[track_caller]
    fn from(error: reqwest::Error) -> Self {
        BackendError::Http {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        BackendError::Json {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<IoError> for BackendError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        BackendError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BackendError {
    #[track_caller]
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        BackendError::EventStream {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

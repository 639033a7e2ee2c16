use crate::error::backend::BackendError;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum DispatchError {
    #[error("Not Ready Error: {message} {location}")]
    NotReady {
        message: String,
        location: ErrorLocation,
    },

    #[error("Media Unavailable Error: {message} {location}")]
    MediaUnavailable {
        message: String,
        location: ErrorLocation,
    },

    #[error("Media Too Large Error: {message} ({size} > {limit} bytes) {location}")]
    MediaTooLarge {
        message: String,
        size: u64,
        limit: u64,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl DispatchError {
    /// Text handed back to API callers, without the location suffix.
    pub fn reason(&self) -> &str {
        match self {
            DispatchError::NotReady { message, .. }
            | DispatchError::MediaUnavailable { message, .. }
            | DispatchError::MediaTooLarge { message, .. } => message,
            DispatchError::Backend(error) => error.reason(),
        }
    }
}

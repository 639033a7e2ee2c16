use crate::error::backend::BackendError;

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error("Not Initialized Error: {message} {location}")]
    NotInitialized {
        message: String,
        location: ErrorLocation,
    },

    #[error("Session Actor Error: {message} {location}")]
    ActorGone {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SessionError {
    /// Text handed back to API callers, without the location suffix.
    pub fn reason(&self) -> &str {
        match self {
            SessionError::NotInitialized { message, .. }
            | SessionError::ActorGone { message, .. } => message,
            SessionError::Backend(error) => error.reason(),
        }
    }
}

use common::ErrorLocation;

use relay_core::error::backend::BackendError;
use relay_core::error::config::ConfigError;
use relay_core::error::launch::LaunchError;
use relay_core::error::server::ServerError;

use thiserror::Error;

/// Errors that stop the relay process.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Error from the binary itself (log directory, logger setup)
    #[error("Relay Error: {message} {location}")]
    Relay {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Server(#[from] ServerError),
}

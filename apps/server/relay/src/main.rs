use relay_server::app::run;
use relay_server::error::RelayError;
use relay_server::logger::initialize as LoggerInitialize;

use relay_core::config::RelayConfig;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::process::ExitCode;

use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    match start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn start() -> Result<(), RelayError> {
    let config = RelayConfig::load()?;

    create_dir_all(&config.logging.dir).map_err(|e| RelayError::Relay {
        message: format!(
            "Failed to create log directory {}: {e}",
            config.logging.dir.display()
        ),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&config.logging.dir, config.logging.level_filter())?;

    info!("WhatsApp relay starting");
    info!("Log directory: {}", config.logging.dir.display());
    info!("Bridge: {}", config.bridge.url);

    run(config).await
}

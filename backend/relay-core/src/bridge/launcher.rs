//! Spawn the automation bridge as a child process and wait until it answers.

use crate::bridge::BridgeBackend;
use crate::config::BridgeConfig;
use crate::error::launch::LaunchError;

use common::ErrorLocation;

use std::panic::Location;
use std::process::Stdio;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child as TokioChild;
use tokio::process::Command as TokioCommand;
use tokio::spawn as TokioSpawn;
use tokio::time::sleep as TokioSleep;

/// A bridge process owned by the relay. Killed when dropped.
#[derive(Debug)]
pub struct BridgeProcess {
    child: TokioChild,
}

impl BridgeProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the bridge and wait for it to exit.
    pub async fn stop(mut self) {
        let pid = self.child.id();
        match self.child.kill().await {
            Ok(()) => info!("Bridge process stopped (PID: {pid:?})"),
            Err(e) => warn!("Failed to stop bridge process (PID: {pid:?}): {e}"),
        }
    }
}

pub(crate) fn build_launch_command(command: &str, args: &[String]) -> TokioCommand {
    let mut cmd = TokioCommand::new(command);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Launch the configured bridge command, if any, and wait for it to be healthy.
///
/// # Returns
///
/// * `Ok(None)` - No `bridge.command` configured; the bridge is managed externally
/// * `Ok(Some(BridgeProcess))` - Bridge spawned and answering `GET health`
/// * `Err(LaunchError)` - Spawn failed or the bridge never became healthy
pub async fn launch(
    config: &BridgeConfig,
    backend: &BridgeBackend,
) -> Result<Option<BridgeProcess>, LaunchError> {
    let Some(command) = config.command.as_deref() else {
        debug!("No bridge command configured, expecting bridge at {}", backend.base_url());
        return Ok(None);
    };

    info!("Launching bridge: {command} {}", config.args.join(" "));

    let mut child = build_launch_command(command, &config.args)
        .spawn()
        .map_err(|e| LaunchError::Spawn {
            message: format!("Failed to spawn bridge command '{command}': {e}"),
            location: ErrorLocation::from(Location::caller()),
            source: Box::new(e),
        })?;

    if let Some(stdout) = child.stdout.take() {
        drain_output("stdout", stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        drain_output("stderr", stderr);
    }

    if let Err(e) = wait_for_health(backend, config.startup_timeout()).await {
        warn!(
            "Health check failed, killing spawned bridge (PID: {:?})",
            child.id()
        );
        let _ = child.kill().await;
        return Err(e);
    }

    info!(
        "Bridge ready at {} (PID: {:?})",
        backend.base_url(),
        child.id()
    );

    Ok(Some(BridgeProcess { child }))
}

fn drain_output<R>(stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    TokioSpawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            trace!("Bridge {stream}: {line}");
        }
    });
}

pub(crate) async fn wait_for_health(
    backend: &BridgeBackend,
    max_elapsed: Duration,
) -> Result<(), LaunchError> {
    let mut backoff = ExponentialBackoff {
        max_elapsed_time: Some(max_elapsed),
        ..Default::default()
    };

    debug!("Waiting for bridge health at {}", backend.base_url());

    loop {
        if backend.check_health().await {
            info!("Bridge is healthy at {}", backend.base_url());
            return Ok(());
        }

        match backoff.next_backoff() {
            Some(duration) => {
                trace!("Bridge not ready, retrying after {duration:?}");
                TokioSleep(duration).await;
            }
            None => {
                return Err(LaunchError::Timeout {
                    message: format!(
                        "Bridge at {} did not become healthy within {max_elapsed:?}",
                        backend.base_url()
                    ),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }
    }
}

use relay_core::bridge::BridgeBackend;
use relay_core::bridge::launcher::launch;
use relay_core::config::BridgeConfig;
use relay_core::error::launch::LaunchError;

use wiremock::MockServer;

// Note: launching a real bridge needs Node and a browser. These tests cover the paths
// that don't: no command, a command that can't start, and one that never gets healthy.

/// **VALUE**: Verifies an externally managed bridge is left alone.
#[tokio::test]
async fn given_no_command_when_launching_then_nothing_spawned() {
    let config = BridgeConfig::default();
    let backend = BridgeBackend::new(&config).unwrap();

    let result = launch(&config, &backend).await;

    assert!(matches!(result, Ok(None)));
}

/// **VALUE**: Verifies a command that can't be spawned is a `Spawn` error, not a panic.
///
/// **BUG THIS CATCHES**: Would catch an `unwrap()` on the spawn result.
#[tokio::test]
async fn given_missing_binary_when_launching_then_spawn_error() {
    let config = BridgeConfig {
        command: Some(String::from("definitely-not-a-whatsapp-bridge-binary")),
        ..BridgeConfig::default()
    };
    let backend = BridgeBackend::new(&config).unwrap();

    let result = launch(&config, &backend).await;

    match result {
        Err(LaunchError::Spawn { message, .. }) => {
            assert!(message.contains("definitely-not-a-whatsapp-bridge-binary"));
        }
        other => panic!("Expected Spawn error, got {other:?}"),
    }
}

/// **VALUE**: Verifies a bridge that never becomes healthy times out within the startup budget.
///
/// **WHY THIS MATTERS**: Without the bound, a broken bridge install would hang startup forever.
///
/// **BUG THIS CATCHES**: Would catch the health loop ignoring `startup_timeout_secs`.
#[cfg(unix)]
#[tokio::test]
async fn given_process_never_healthy_when_launching_then_timeout() {
    // GIVEN: A long-running process and a bridge URL whose health check always 404s
    let server = MockServer::start().await;
    let config = BridgeConfig {
        url: server.uri(),
        command: Some(String::from("sleep")),
        args: vec![String::from("30")],
        startup_timeout_secs: 1,
        ..BridgeConfig::default()
    };
    let backend = BridgeBackend::new(&config).unwrap();

    // WHEN: Launching
    let started = std::time::Instant::now();
    let result = launch(&config, &backend).await;

    // THEN: Timeout, well before the process would have exited by itself
    assert!(matches!(result, Err(LaunchError::Timeout { .. })));
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}

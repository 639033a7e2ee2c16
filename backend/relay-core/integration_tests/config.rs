use relay_core::config::RelayConfig;
use relay_core::error::config::ConfigError;

use std::io::Write;

use serial_test::serial;
use tempfile::NamedTempFile;

const OVERRIDE_VARS: [&str; 5] = ["PORT", "BRIDGE_URL", "BRIDGE_TOKEN", "CLIENT_ID", "LOG_LEVEL"];

fn clear_overrides() {
    for var in OVERRIDE_VARS {
        // SAFETY: env-mutating tests are #[serial]
        unsafe { std::env::remove_var(var) };
    }
}

fn set_var(name: &str, value: &str) {
    // SAFETY: env-mutating tests are #[serial]
    unsafe { std::env::set_var(name, value) };
}

/// **VALUE**: Verifies environment variables win over the config file.
///
/// **WHY THIS MATTERS**: Deployments set `PORT` and the bridge location in the environment;
/// a checked-in `relay.toml` must not override them.
///
/// **BUG THIS CATCHES**: Would catch overrides being applied before the file is read.
#[test]
#[serial]
fn given_file_and_env_when_overrides_applied_then_env_wins() {
    // GIVEN: A file and conflicting env vars
    clear_overrides();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[server]\nport = 7000\n\n[bridge]\nurl = \"http://from-file:1\"\n"
    )
    .unwrap();
    set_var("PORT", "8081");
    set_var("BRIDGE_URL", "http://from-env:2");
    set_var("BRIDGE_TOKEN", "env-token");
    set_var("CLIENT_ID", "ops-phone");

    // WHEN: Loading and applying overrides
    let mut config = RelayConfig::load_from_path(file.path()).unwrap();
    config.apply_env_overrides().unwrap();
    clear_overrides();

    // THEN: Env values are in effect and the result validates
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.bridge.url, "http://from-env:2");
    assert_eq!(
        config.bridge.token.as_ref().map(|t| t.expose()),
        Some("env-token")
    );
    assert_eq!(config.auth_store().client_id, "ops-phone");
    assert!(config.validate().is_ok());
}

/// **VALUE**: Verifies a non-numeric `PORT` is reported against the variable.
#[test]
#[serial]
fn given_non_numeric_port_when_overrides_applied_then_env_error() {
    clear_overrides();
    set_var("PORT", "http");

    let mut config = RelayConfig::default();
    let result = config.apply_env_overrides();
    clear_overrides();

    match result {
        Err(ConfigError::EnvError { variable, .. }) => assert_eq!(variable, "PORT"),
        other => panic!("Expected EnvError, got {other:?}"),
    }
}

/// **VALUE**: Verifies blank variables are treated as unset.
///
/// **BUG THIS CATCHES**: Would catch `PORT=` in a `.env` file wiping the default.
#[test]
#[serial]
fn given_blank_env_var_when_overrides_applied_then_ignored() {
    clear_overrides();
    set_var("LOG_LEVEL", "   ");

    let mut config = RelayConfig::default();
    config.apply_env_overrides().unwrap();
    clear_overrides();

    assert_eq!(config.logging.level, "info");
}

/// **VALUE**: Verifies a missing config file is a read error naming the path.
#[test]
fn given_missing_file_when_loaded_then_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relay.toml");

    match RelayConfig::load_from_path(&path) {
        Err(ConfigError::ReadError { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("Expected ReadError, got {other:?}"),
    }
}

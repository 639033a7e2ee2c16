// Unit tests for logger initialization
// Both tests share the process-wide logger, so only the first call can install it

use crate::logger::initialize;

use std::path::PathBuf;

use log::LevelFilter;

/// **VALUE**: Verifies that calling initialize() multiple times doesn't panic or fail.
///
/// **WHY THIS MATTERS**: A second global logger install makes fern return an error; the
/// relay must not die at startup because some code path initialized logging twice.
///
/// **BUG THIS CATCHES**: Would catch if the Once or AtomicBool guards are removed.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN: A valid temporary directory
    let temp_dir = tempfile::tempdir().unwrap();

    // WHEN: Calling initialize twice
    let first = initialize(temp_dir.path(), LevelFilter::Debug);
    let second = initialize(temp_dir.path(), LevelFilter::Info);

    // THEN: The second call is a no-op either way
    assert!(
        second.is_ok(),
        "Second initialization should succeed (idempotent), first was {first:?}"
    );
}

/// **VALUE**: Verifies an unusable log directory is an error, not a panic.
///
/// **BUG THIS CATCHES**: Would catch `fern::log_file()` being unwrapped.
#[test]
fn given_invalid_log_dir_when_initialized_then_error_or_already_initialized() {
    // GIVEN: A path that can never hold a file
    let invalid_dir = PathBuf::from("/dev/null/invalid-path");

    // WHEN: Initializing
    let result = initialize(&invalid_dir, LevelFilter::Info);

    // THEN: Either it failed cleanly, or another test already installed the logger
    if let Err(e) = result {
        assert!(
            e.to_string().contains("Failed to create log file"),
            "unexpected error: {e}"
        );
    }
}

use crate::backend::SessionEvent;
use crate::error::session::SessionError;
use crate::tests::fake::{FakeScript, session_with, wait_for_status};

use models::SessionStatus;

/// **VALUE**: Verifies `connect()` is idempotent while a client exists.
///
/// **WHY THIS MATTERS**: `/initialize` and `/state` can both trigger connect. A second
/// backend client on the same auth store would fight the first over the browser profile.
///
/// **BUG THIS CATCHES**: Would catch if the existing-handle check is skipped or races.
#[tokio::test]
async fn given_connected_session_when_connect_called_again_then_backend_setup_runs_once() {
    // GIVEN: A session that has connected once
    let (backend, session) = session_with(FakeScript::default());
    session.connect().await.unwrap();

    // WHEN: Connecting again
    session.connect().await.unwrap();

    // THEN: Only one client was ever created
    assert_eq!(backend.created(), 1);
}

/// **VALUE**: Verifies concurrent first connects still build one client.
///
/// **WHY THIS MATTERS**: Requests are handled in parallel; two `/state` calls arriving
/// together must not both see "no handle" and each create one.
///
/// **BUG THIS CATCHES**: Would catch a check-then-create race in `connect()`.
#[tokio::test]
async fn given_fresh_session_when_connect_called_concurrently_then_one_client_created() {
    // GIVEN: A fresh session
    let (backend, session) = session_with(FakeScript::default());

    // WHEN: Two connects race
    let (a, b) = tokio::join!(session.connect(), session.connect());

    // THEN: Both succeed and one client exists
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(backend.created(), 1);
}

/// **VALUE**: Verifies state is unavailable before any connect attempt.
///
/// **BUG THIS CATCHES**: Would catch a default state being reported for a session
/// that was never started.
#[tokio::test]
async fn given_fresh_session_when_reading_state_then_not_initialized() {
    let (_backend, session) = session_with(FakeScript::default());

    let result = session.current_state().await;

    match result {
        Err(SessionError::NotInitialized { message, .. }) => {
            assert_eq!(message, "Client not initialized");
        }
        other => panic!("Expected NotInitialized, got {other:?}"),
    }
}

/// **VALUE**: Verifies the lifecycle transitions driven by backend events.
///
/// **WHY THIS MATTERS**: `/state` is how operators find the QR code to scan. The challenge
/// must be visible while awaiting auth and gone once ready.
///
/// **BUG THIS CATCHES**: Would catch a stale QR code surviving the transition to ready.
#[tokio::test]
async fn given_connected_session_when_qr_then_ready_then_challenge_shown_then_cleared() {
    // GIVEN: A connected session
    let (backend, session) = session_with(FakeScript::default());
    session.connect().await.unwrap();
    wait_for_status(&session, SessionStatus::Initializing).await;

    // WHEN: The backend issues a QR code
    backend
        .latest()
        .emit(SessionEvent::QrCodeIssued(String::from("2@abc")))
        .await;

    // THEN: State carries the challenge
    wait_for_status(&session, SessionStatus::AwaitingAuth).await;
    let state = session.current_state().await.unwrap();
    assert_eq!(state.auth_challenge(), Some("2@abc"));

    // WHEN: The backend reports ready
    backend.latest().emit(SessionEvent::Ready).await;

    // THEN: Ready and the challenge is cleared
    wait_for_status(&session, SessionStatus::Ready).await;
    let state = session.current_state().await.unwrap();
    assert_eq!(state.auth_challenge(), None);
    assert!(session.ready_client().await.is_some());
}

/// **VALUE**: Verifies a disconnect resets the session and the next connect builds a new client.
///
/// **WHY THIS MATTERS**: After WhatsApp logs the device out, the old client is dead. Reusing
/// it would leave the relay permanently stuck.
///
/// **BUG THIS CATCHES**: Would catch the handle not being released on disconnect, or the
/// old client never being destroyed.
#[tokio::test]
async fn given_ready_session_when_disconnected_then_state_resets_and_reconnect_uses_new_client() {
    // GIVEN: A ready session
    let (backend, session) = session_with(FakeScript {
        ready_on_init: true,
        ..FakeScript::default()
    });
    session.connect().await.unwrap();
    wait_for_status(&session, SessionStatus::Ready).await;
    let first = session.client_handle().await.unwrap().instance();

    // WHEN: The backend disconnects
    backend
        .latest()
        .emit(SessionEvent::Disconnected(String::from("LOGOUT")))
        .await;

    // THEN: State is disconnected and the handle is gone
    wait_for_status(&session, SessionStatus::Disconnected).await;
    assert!(session.client_handle().await.is_none());
    assert!(session.ready_client().await.is_none());

    // AND: The old client gets destroyed
    let old = backend.client(0);
    for _ in 0..100 {
        if old.was_destroyed() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert!(old.was_destroyed());

    // WHEN: Connecting again
    session.connect().await.unwrap();

    // THEN: A genuinely new client is in place
    assert_eq!(backend.created(), 2);
    let second = session.client_handle().await.unwrap().instance();
    assert_ne!(first, second);
}

/// **VALUE**: Verifies events from a replaced client are ignored.
///
/// **WHY THIS MATTERS**: A dying client can still flush a late `ready` after its replacement
/// started. Applying it would report ready while the live client awaits a QR scan.
///
/// **BUG THIS CATCHES**: Would catch events being applied without checking the instance id.
#[tokio::test]
async fn given_replaced_client_when_stale_event_arrives_then_state_unchanged() {
    // GIVEN: A first client that disconnected and a second one awaiting auth
    let (backend, session) = session_with(FakeScript::default());
    session.connect().await.unwrap();
    let stale = backend.latest();
    stale
        .emit(SessionEvent::Disconnected(String::from("NAVIGATION")))
        .await;
    wait_for_status(&session, SessionStatus::Disconnected).await;

    session.connect().await.unwrap();
    backend
        .latest()
        .emit(SessionEvent::QrCodeIssued(String::from("fresh")))
        .await;
    wait_for_status(&session, SessionStatus::AwaitingAuth).await;

    // WHEN: The stale client emits ready
    stale.emit(SessionEvent::Ready).await;
    // Flush the inbox with an event that is applied
    backend
        .latest()
        .emit(SessionEvent::QrCodeIssued(String::from("fresh-2")))
        .await;

    // THEN: Once the later event is applied, the live client's state wins
    let mut state = session.current_state().await.unwrap();
    for _ in 0..100 {
        if state.auth_challenge() == Some("fresh-2") {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        state = session.current_state().await.unwrap();
    }
    assert_eq!(state.auth_challenge(), Some("fresh-2"));
    assert_eq!(state.status(), SessionStatus::AwaitingAuth);
}

/// **VALUE**: Verifies a failed initialize leaves the session retryable.
///
/// **BUG THIS CATCHES**: Would catch a half-built handle being kept, which would make every
/// later `connect()` a silent no-op.
#[tokio::test]
async fn given_failing_backend_when_connect_then_error_and_handle_discarded() {
    // GIVEN: A backend whose clients fail to start
    let (backend, session) = session_with(FakeScript {
        fail_init: true,
        ..FakeScript::default()
    });

    // WHEN: Connecting
    let result = session.connect().await;

    // THEN: The backend text comes through and no handle remains
    match result {
        Err(SessionError::Backend(e)) => assert_eq!(e.reason(), "browser failed to launch"),
        other => panic!("Expected backend error, got {other:?}"),
    }
    assert!(session.client_handle().await.is_none());

    // AND: A retry builds a new client
    let _ = session.connect().await;
    assert_eq!(backend.created(), 2);
}

/// **VALUE**: Verifies `ensure_connected` rebuilds the client once a disconnect released it.
///
/// **WHY THIS MATTERS**: `/state` calls this on every poll. A session started through
/// `/state` that later drops must come back with a fresh QR code on the next poll, the
/// same as a session that was never started.
///
/// **BUG THIS CATCHES**: Would catch lazy connect keyed on "ever connected" instead of
/// "no handle right now", which leaves the relay stuck in `disconnected`.
#[tokio::test]
async fn given_disconnected_session_when_ensure_connected_then_new_client() {
    // GIVEN: A session started lazily, then disconnected
    let (backend, session) = session_with(FakeScript::default());
    session.ensure_connected().await.unwrap();
    assert_eq!(backend.created(), 1);

    backend
        .latest()
        .emit(SessionEvent::Disconnected(String::from("LOGOUT")))
        .await;
    wait_for_status(&session, SessionStatus::Disconnected).await;
    assert!(session.client_handle().await.is_none());

    // WHEN: Ensuring connected again
    session.ensure_connected().await.unwrap();

    // THEN: A second client was built and the session is initializing again
    assert_eq!(backend.created(), 2);
    assert!(session.client_handle().await.is_some());
    assert_eq!(
        session.current_state().await.unwrap().status(),
        SessionStatus::Initializing
    );
}

/// **VALUE**: Verifies `ensure_connected` leaves a live client alone.
///
/// **BUG THIS CATCHES**: Would catch every state poll replacing a client that is still
/// waiting for its QR code to be scanned.
#[tokio::test]
async fn given_client_awaiting_auth_when_ensure_connected_then_no_new_client() {
    // GIVEN: A client showing a QR code
    let (backend, session) = session_with(FakeScript::default());
    session.ensure_connected().await.unwrap();
    backend
        .latest()
        .emit(SessionEvent::QrCodeIssued(String::from("2@qr")))
        .await;
    wait_for_status(&session, SessionStatus::AwaitingAuth).await;

    // WHEN: Polling again
    session.ensure_connected().await.unwrap();
    session.ensure_connected().await.unwrap();

    // THEN: Still one client, still awaiting auth
    assert_eq!(backend.created(), 1);
    assert_eq!(
        session.current_state().await.unwrap().status(),
        SessionStatus::AwaitingAuth
    );
}

/// **VALUE**: Verifies shutdown destroys the live client.
#[tokio::test]
async fn given_connected_session_when_shutdown_then_client_released() {
    let (backend, session) = session_with(FakeScript::default());
    session.connect().await.unwrap();

    session.shutdown().await.unwrap();

    assert!(session.client_handle().await.is_none());
    wait_for_status(&session, SessionStatus::Disconnected).await;
    let client = backend.latest();
    for _ in 0..100 {
        if client.was_destroyed() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert!(client.was_destroyed());
}

use crate::{SessionState, SessionStatus};

/// **VALUE**: Verifies the auth challenge exists only while awaiting authentication.
///
/// **WHY THIS MATTERS**: Clients render whatever `qrCode` they receive. A stale challenge shown
/// after the session is ready would prompt users to scan a dead code.
///
/// **BUG THIS CATCHES**: Would catch a transition constructor that forgets to clear the challenge.
#[test]
fn given_each_transition_when_inspected_then_challenge_only_present_while_awaiting_auth() {
    // GIVEN/WHEN: Every reachable state
    let awaiting = SessionState::awaiting_auth("2@abc,def");
    let others = [
        SessionState::initializing(),
        SessionState::ready(),
        SessionState::disconnected(),
    ];

    // THEN: Only AwaitingAuth carries the challenge
    assert_eq!(awaiting.status(), SessionStatus::AwaitingAuth);
    assert_eq!(awaiting.auth_challenge(), Some("2@abc,def"));
    for state in others {
        assert!(state.auth_challenge().is_none(), "{state:?} leaked a challenge");
    }
}

/// **VALUE**: Verifies the JSON shape of the state snapshot.
///
/// **WHY THIS MATTERS**: `GET /state` returns this verbatim and existing frontends key off the
/// `"QR RECEIVED"` literal and the `qrCode` field.
///
/// **BUG THIS CATCHES**: Would catch a serde rename being dropped or changed.
#[test]
fn given_awaiting_auth_state_when_serialized_then_uses_wire_names() {
    // GIVEN: A state awaiting a QR scan
    let state = SessionState::awaiting_auth("qr-payload");

    // WHEN: Serializing
    let json = serde_json::to_value(&state).expect("serializable");

    // THEN: Wire names match
    assert_eq!(json["status"], "QR RECEIVED");
    assert_eq!(json["qrCode"], "qr-payload");

    let ready = serde_json::to_value(SessionState::ready()).expect("serializable");
    assert_eq!(ready["status"], "ready");
    assert!(ready["qrCode"].is_null());
}

use crate::HttpStatusCode;

/// **VALUE**: Verifies which bridge statuses are treated as transient.
///
/// **WHY THIS MATTERS**: Session start is retried only on these. Retrying a 400 would hammer
/// the bridge with a request it will never accept; not retrying a 503 would fail startup
/// while the browser is still booting.
///
/// **BUG THIS CATCHES**: Would catch if a permanent status slips into the retryable set.
#[test]
fn given_status_codes_when_checking_retryable_then_only_transient_codes_match() {
    // GIVEN/WHEN/THEN: Transient statuses retry
    for code in [429u16, 502, 503, 504] {
        assert!(HttpStatusCode(code).is_retryable(), "{code} should retry");
    }

    // AND: Everything else does not
    for code in [200u16, 400, 401, 404, 500] {
        assert!(!HttpStatusCode(code).is_retryable(), "{code} should not retry");
    }
}

/// **VALUE**: Verifies exactly the 2xx range counts as success.
///
/// **WHY THIS MATTERS**: The bridge client branches on this to decide whether a call went
/// through or its body holds an error.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one at either end of the range.
#[test]
fn given_boundary_codes_when_classified_then_only_2xx_succeeds() {
    assert!(HttpStatusCode::from(200).is_success());
    assert!(HttpStatusCode::from(299).is_success());
    assert!(!HttpStatusCode::from(199).is_success());
    assert!(!HttpStatusCode::from(300).is_success());
    assert!(!HttpStatusCode::from(404).is_success());
}

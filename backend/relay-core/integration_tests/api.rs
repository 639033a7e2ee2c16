use crate::helpers::{
    ScriptedBackend, connect_ready, get_request, json_body, json_request, multipart_request,
    test_app, wait_for_status,
};

use relay_core::backend::SessionEvent;
use relay_core::dispatch::NOT_READY_MESSAGE;

use models::SessionStatus;

use axum::body::Body;
use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, ORIGIN};
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

// ============================================================================
// POST /send
// ============================================================================

/// **VALUE**: Verifies a request missing `message` is rejected before touching the backend.
///
/// **WHY THIS MATTERS**: Validation is the only thing standing between a malformed client
/// request and a browser session being spun up.
///
/// **BUG THIS CATCHES**: Would catch validation running after dispatch, or the 400 body
/// shape drifting from what existing clients parse.
#[tokio::test]
async fn given_missing_message_when_posting_send_then_400_and_backend_untouched() {
    // GIVEN: A fresh relay
    let app = test_app(ScriptedBackend::ready());

    // WHEN: Posting without a message
    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/send",
            &json!({ "phoneNumber": "9876543210" }),
        ))
        .await
        .unwrap();

    // THEN: 400 with the expected body, and no client was ever created
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "message": "Missing phone number or message" })
    );
    assert_eq!(app.backend.created(), 0);
}

/// **VALUE**: Verifies empty strings count as missing, and unparseable bodies are a 400 too.
#[tokio::test]
async fn given_empty_or_garbage_body_when_posting_send_then_400() {
    let app = test_app(ScriptedBackend::ready());

    let empty = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/send",
            &json!({ "phoneNumber": "", "message": "hi" }),
        ))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let garbage = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/send")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);
}

/// **VALUE**: Verifies sending before the client is ready is a 500 with the "not ready" text.
///
/// **BUG THIS CATCHES**: Would catch NotReady being reported as a 200 `success:false`.
#[tokio::test]
async fn given_no_session_when_posting_send_then_500_not_ready() {
    let app = test_app(ScriptedBackend::ready());

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/send",
            &json!({ "phoneNumber": "9876543210", "message": "hi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({
            "success": false,
            "message": "Failed to send message",
            "error": NOT_READY_MESSAGE,
        })
    );
}

/// **VALUE**: Verifies the happy path over both JSON and urlencoded bodies.
#[tokio::test]
async fn given_ready_session_when_posting_send_then_message_delivered() {
    // GIVEN: A ready session
    let app = test_app(ScriptedBackend::ready());
    connect_ready(&app.session).await;

    // WHEN: Sending as JSON
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/send",
            &json!({ "phoneNumber": "+91 98765 43210", "message": "hello" }),
        ))
        .await
        .unwrap();

    // THEN: 200 with the success text
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "message": "Message sent successfully!" })
    );

    // WHEN: Sending as a form
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/send")
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("phoneNumber=1234567890&message=form+body"))
                .unwrap(),
        )
        .await
        .unwrap();

    // THEN: Also delivered
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        app.backend.sent(),
        vec![
            (String::from("919876543210@c.us"), String::from("hello")),
            (String::from("911234567890@c.us"), String::from("form body")),
        ]
    );
}

/// **VALUE**: Verifies a backend rejection is a 200 carrying `success:false` and the backend text.
#[tokio::test]
async fn given_backend_rejects_when_posting_send_then_200_with_failure() {
    let app = test_app(ScriptedBackend {
        failing_recipient: Some(String::from("911111111111@c.us")),
        ..ScriptedBackend::ready()
    });
    connect_ready(&app.session).await;

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/send",
            &json!({ "phoneNumber": "1111111111", "message": "hi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "message": "Recipient not on WhatsApp" })
    );
}

// ============================================================================
// POST /send-messages
// ============================================================================

/// **VALUE**: Verifies the batch endpoint's own 400 shape.
#[tokio::test]
async fn given_missing_phone_numbers_when_posting_send_messages_then_400_error_body() {
    let app = test_app(ScriptedBackend::ready());

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/send-messages",
            &json!({ "message": "hi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Phone numbers and message are required." })
    );
}

/// **VALUE**: Verifies per-recipient results come back in order with failures isolated.
///
/// **BUG THIS CATCHES**: Would catch a failed recipient aborting the batch or the result
/// field names changing.
#[tokio::test]
async fn given_one_bad_recipient_when_posting_send_messages_then_results_in_order() {
    // GIVEN: A ready session where B is rejected
    let app = test_app(ScriptedBackend {
        failing_recipient: Some(String::from("912222222222@c.us")),
        ..ScriptedBackend::ready()
    });
    connect_ready(&app.session).await;

    // WHEN: Sending to A, B, C
    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/send-messages",
            &json!({
                "phoneNumbers": ["1111111111", "2222222222", "3333333333"],
                "message": "news",
            }),
        ))
        .await
        .unwrap();

    // THEN: One entry per recipient, in order
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!([
            { "phoneNumber": "1111111111", "success": true, "message": "Message sent successfully!" },
            { "phoneNumber": "2222222222", "success": false, "message": "Recipient not on WhatsApp" },
            { "phoneNumber": "3333333333", "success": true, "message": "Message sent successfully!" },
        ])
    );
}

// ============================================================================
// POST /send-media
// ============================================================================

/// **VALUE**: Verifies an uploaded file is sent with its caption and then cleaned up.
///
/// **WHY THIS MATTERS**: Uploads are temporary; keeping them would fill the disk.
///
/// **BUG THIS CATCHES**: Would catch the caption being dropped, or the upload left behind.
#[tokio::test]
async fn given_file_and_caption_when_posting_send_media_then_sent_and_upload_removed() {
    // GIVEN: A ready session
    let app = test_app(ScriptedBackend::ready());
    connect_ready(&app.session).await;

    // WHEN: Uploading a small file with a caption
    let response = app
        .router
        .oneshot(multipart_request(
            "/send-media",
            &[
                ("phoneNumber", None, b"9876543210".as_slice()),
                ("caption", None, b"see attached".as_slice()),
                ("filePath", Some("photo.png"), b"\x89PNG fake".as_slice()),
            ],
        ))
        .await
        .unwrap();

    // THEN: Sent as media with caption
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "message": "Media message sent successfully!" })
    );
    assert_eq!(
        app.backend.sent(),
        vec![(String::from("919876543210@c.us"), String::from("see attached"))]
    );

    // AND: The upload directory is empty again
    let leftovers = std::fs::read_dir(app.uploads.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

/// **VALUE**: Verifies a caption without a file goes out as text.
#[tokio::test]
async fn given_caption_only_when_posting_send_media_then_text_sent() {
    let app = test_app(ScriptedBackend::ready());
    connect_ready(&app.session).await;

    let response = app
        .router
        .oneshot(multipart_request(
            "/send-media",
            &[
                ("phoneNumber", None, b"9876543210".as_slice()),
                ("caption", None, b"no file".as_slice()),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "message": "Text message sent successfully!" })
    );
}

/// **VALUE**: Verifies neither file nor caption is a 400, and the empty file part browsers
/// send for an unpicked file doesn't count as a file.
#[tokio::test]
async fn given_no_file_and_no_caption_when_posting_send_media_then_400() {
    let app = test_app(ScriptedBackend::ready());

    let response = app
        .router
        .oneshot(multipart_request(
            "/send-media",
            &[
                ("phoneNumber", None, b"9876543210".as_slice()),
                ("filePath", Some(""), b"".as_slice()),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({
            "success": false,
            "message": "Phone number and either file or caption are required.",
        })
    );
    assert_eq!(app.backend.created(), 0);
}

// ============================================================================
// GET /initialize and GET /state
// ============================================================================

/// **VALUE**: Verifies `/state` lazily connects exactly once.
///
/// **WHY THIS MATTERS**: The dashboard polls `/state` to show the QR code. The first poll
/// has to start the session; later polls must not start more.
///
/// **BUG THIS CATCHES**: Would catch no connect (state never available) or a connect per poll.
#[tokio::test]
async fn given_fresh_relay_when_getting_state_twice_then_one_connect() {
    // GIVEN: A relay that was never initialized
    let app = test_app(ScriptedBackend::default());

    // WHEN: Polling state twice
    let first = app
        .router
        .clone()
        .oneshot(get_request("/state"))
        .await
        .unwrap();
    let second = app.router.oneshot(get_request("/state")).await.unwrap();

    // THEN: Both succeed, one client was created
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(app.backend.created(), 1);

    // AND: The state shape is what clients read
    assert_eq!(
        json_body(first).await,
        json!({ "success": true, "state": { "status": "initializing", "qrCode": null } })
    );
}

/// **VALUE**: Verifies `/state` starts a new client after the previous one disconnected.
///
/// **WHY THIS MATTERS**: A relay started by polling `/state` has nobody calling
/// `/initialize`. If the phone logs out, the next poll has to bring up a fresh QR code.
///
/// **BUG THIS CATCHES**: Would catch lazy connect firing only on the very first poll.
#[tokio::test]
async fn given_disconnected_client_when_getting_state_then_reconnects() {
    // GIVEN: A session started by a state poll that then disconnected
    let app = test_app(ScriptedBackend::default());
    let response = app
        .router
        .clone()
        .oneshot(get_request("/state"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    app.backend
        .emit(SessionEvent::Disconnected(String::from("LOGOUT")))
        .await;
    wait_for_status(&app.session, SessionStatus::Disconnected).await;

    // WHEN: Polling again
    let response = app.router.oneshot(get_request("/state")).await.unwrap();

    // THEN: A second client was built and the state is back to initializing
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.backend.created(), 2);
    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "state": { "status": "initializing", "qrCode": null } })
    );
}

/// **VALUE**: Verifies `/initialize` success and failure bodies.
#[tokio::test]
async fn given_backends_when_getting_initialize_then_success_or_500() {
    // GIVEN/WHEN: A working backend
    let app = test_app(ScriptedBackend::default());
    let response = app.router.oneshot(get_request("/initialize")).await.unwrap();

    // THEN: 200
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "message": "WhatsApp client initialized" })
    );

    // GIVEN/WHEN: A backend that can't start
    let app = test_app(ScriptedBackend {
        fail_init: true,
        ..ScriptedBackend::default()
    });
    let response = app.router.oneshot(get_request("/initialize")).await.unwrap();

    // THEN: 500 with the backend's reason
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({
            "success": false,
            "message": "Initialization failed",
            "error": "Failed to launch the browser process",
        })
    );
}

/// **VALUE**: Verifies cross-origin callers get the CORS header.
///
/// **BUG THIS CATCHES**: Would catch the CORS layer being dropped, which breaks every
/// browser-based client.
#[tokio::test]
async fn given_cross_origin_request_when_getting_state_then_cors_header_present() {
    let app = test_app(ScriptedBackend::default());

    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/state")
                .header(ORIGIN, "http://dashboard.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

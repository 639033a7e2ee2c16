use crate::address::AddressNormalizer;
use crate::dispatch::batch::BatchDispatcher;
use crate::dispatch::{
    Dispatcher, MAX_MEDIA_BYTES, MEDIA_SENT_MESSAGE, MEDIA_TOO_LARGE_MESSAGE, MESSAGE_SENT_MESSAGE,
    MessageBody, NOT_READY_MESSAGE, TEXT_SENT_MESSAGE, load_media,
};
use crate::error::dispatch::DispatchError;
use crate::tests::fake::{
    FakeBackend, FakeScript, REJECTION_TEXT, Sent, session_with, wait_for_status,
};

use models::SessionStatus;

use std::sync::Arc;

use tempfile::{Builder, NamedTempFile};

async fn ready_dispatcher(script: FakeScript) -> (Arc<FakeBackend>, Dispatcher) {
    let (backend, session) = session_with(FakeScript {
        ready_on_init: true,
        ..script
    });
    session.connect().await.unwrap();
    wait_for_status(&session, SessionStatus::Ready).await;

    (backend, Dispatcher::new(session, AddressNormalizer::default()))
}

fn media_file(size: u64) -> NamedTempFile {
    let file = Builder::new().suffix(".png").tempfile().unwrap();
    file.as_file().set_len(size).unwrap();
    file
}

/// **VALUE**: Verifies a text send goes to the normalized address with the body untouched.
#[tokio::test]
async fn given_ready_client_when_sending_text_then_sent_to_normalized_address() {
    // GIVEN: A ready session
    let (backend, dispatcher) = ready_dispatcher(FakeScript::default()).await;

    // WHEN: Sending text to a local number
    let result = dispatcher
        .send_one("98765 43210", &MessageBody::Text(String::from("hello")))
        .await
        .unwrap();

    // THEN: Success, reported against the raw input
    assert!(result.is_success());
    assert_eq!(result.message(), MESSAGE_SENT_MESSAGE);
    assert_eq!(result.recipient(), "98765 43210");
    assert_eq!(
        backend.latest().sent(),
        vec![Sent::Text {
            to: String::from("919876543210@c.us"),
            body: String::from("hello"),
        }]
    );
}

/// **VALUE**: Verifies the single-send path surfaces a missing session as `NotReady`.
///
/// **WHY THIS MATTERS**: `/send` answers 500 with the "not ready" text in that case, distinct
/// from a backend rejection which is a 200 with `success: false`.
///
/// **BUG THIS CATCHES**: Would catch `NotReady` being folded into a result on this path.
#[tokio::test]
async fn given_no_session_when_sending_then_not_ready_error() {
    // GIVEN: A session that never connected
    let (backend, session) = session_with(FakeScript::default());
    let dispatcher = Dispatcher::new(session, AddressNormalizer::default());

    // WHEN: Sending
    let result = dispatcher
        .send_one("9876543210", &MessageBody::Text(String::from("hi")))
        .await;

    // THEN: NotReady with the operator-facing text, and no backend involvement
    match result {
        Err(e @ DispatchError::NotReady { .. }) => assert_eq!(e.reason(), NOT_READY_MESSAGE),
        other => panic!("Expected NotReady, got {other:?}"),
    }
    assert_eq!(backend.created(), 0);
}

/// **VALUE**: Verifies a connected but unauthenticated client is also not ready.
///
/// **BUG THIS CATCHES**: Would catch sends being attempted while the QR code is unscanned.
#[tokio::test]
async fn given_client_awaiting_auth_when_sending_then_not_ready_error() {
    let (_backend, session) = session_with(FakeScript::default());
    session.connect().await.unwrap();
    let dispatcher = Dispatcher::new(session, AddressNormalizer::default());

    let result = dispatcher
        .send_one("9876543210", &MessageBody::Text(String::from("hi")))
        .await;

    assert!(matches!(result, Err(DispatchError::NotReady { .. })));
}

/// **VALUE**: Verifies backend failures become failed results carrying the backend's text.
///
/// **WHY THIS MATTERS**: Callers show this text to users; the dispatcher must never let the
/// backend error escape as a fault.
///
/// **BUG THIS CATCHES**: Would catch the error being propagated, or its text replaced.
#[tokio::test]
async fn given_backend_rejects_recipient_when_sending_then_failed_result_with_backend_text() {
    // GIVEN: A backend that rejects this recipient
    let (_backend, dispatcher) = ready_dispatcher(FakeScript {
        failing_recipients: vec![String::from("911111111111@c.us")],
        ..FakeScript::default()
    })
    .await;

    // WHEN: Sending to it
    let result = dispatcher
        .send_one("1111111111", &MessageBody::Text(String::from("hi")))
        .await
        .unwrap();

    // THEN: Failed with the backend's message
    assert!(!result.is_success());
    assert_eq!(result.message(), REJECTION_TEXT);
}

/// **VALUE**: Verifies the size limit boundary: 16 MiB is accepted, one byte more is not.
///
/// **WHY THIS MATTERS**: WhatsApp Web silently drops larger attachments; the relay must say
/// so up front.
///
/// **BUG THIS CATCHES**: Would catch `>=` vs `>` on the limit.
#[tokio::test]
async fn given_media_at_and_over_limit_when_loading_then_only_over_limit_rejected() {
    // GIVEN: One file at the limit and one byte over
    let at_limit = media_file(MAX_MEDIA_BYTES);
    let over_limit = media_file(MAX_MEDIA_BYTES + 1);

    // WHEN/THEN: At the limit loads with a guessed MIME type
    let payload = load_media(at_limit.path()).await.unwrap();
    assert_eq!(payload.size_bytes(), MAX_MEDIA_BYTES);
    assert_eq!(payload.mime_type(), "image/png");

    // AND: Over the limit is rejected with the exact message
    match load_media(over_limit.path()).await {
        Err(e @ DispatchError::MediaTooLarge { .. }) => {
            assert_eq!(e.reason(), MEDIA_TOO_LARGE_MESSAGE);
        }
        other => panic!("Expected MediaTooLarge, got {other:?}"),
    }
}

/// **VALUE**: Verifies an oversized attachment is reported without calling the backend.
#[tokio::test]
async fn given_oversized_media_when_sending_then_failed_result_and_nothing_sent() {
    let (backend, dispatcher) = ready_dispatcher(FakeScript::default()).await;
    let file = media_file(MAX_MEDIA_BYTES + 1);

    let result = dispatcher
        .send_one(
            "9876543210",
            &MessageBody::Attachment {
                source: Some(file.path().to_path_buf()),
                caption: String::from("big"),
            },
        )
        .await
        .unwrap();

    assert!(!result.is_success());
    assert_eq!(result.message(), MEDIA_TOO_LARGE_MESSAGE);
    assert!(backend.latest().sent().is_empty());
}

/// **VALUE**: Verifies media and caption go out in one backend call.
///
/// **BUG THIS CATCHES**: Would catch the caption being sent as a separate text message.
#[tokio::test]
async fn given_media_with_caption_when_sending_then_single_media_send() {
    let (backend, dispatcher) = ready_dispatcher(FakeScript::default()).await;
    let file = media_file(1024);

    let result = dispatcher
        .send_one(
            "9876543210",
            &MessageBody::Attachment {
                source: Some(file.path().to_path_buf()),
                caption: String::from("look"),
            },
        )
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.message(), MEDIA_SENT_MESSAGE);
    assert_eq!(
        backend.latest().sent(),
        vec![Sent::Media {
            to: String::from("919876543210@c.us"),
            mime_type: String::from("image/png"),
            size_bytes: 1024,
            caption: String::from("look"),
        }]
    );
}

/// **VALUE**: Verifies an attachment without a file sends its caption as text.
#[tokio::test]
async fn given_caption_only_when_sending_then_caption_sent_as_text() {
    let (backend, dispatcher) = ready_dispatcher(FakeScript::default()).await;

    let result = dispatcher
        .send_one(
            "9876543210",
            &MessageBody::Attachment {
                source: None,
                caption: String::from("just words"),
            },
        )
        .await
        .unwrap();

    assert_eq!(result.message(), TEXT_SENT_MESSAGE);
    assert_eq!(
        backend.latest().sent(),
        vec![Sent::Text {
            to: String::from("919876543210@c.us"),
            body: String::from("just words"),
        }]
    );
}

/// **VALUE**: Verifies a missing media file is a failed result, not a fault.
///
/// **BUG THIS CATCHES**: Would catch an unresolvable upload path reaching the backend.
#[tokio::test]
async fn given_missing_media_file_when_sending_then_failed_result() {
    let (backend, dispatcher) = ready_dispatcher(FakeScript::default()).await;
    let dir = tempfile::tempdir().unwrap();

    let result = dispatcher
        .send_one(
            "9876543210",
            &MessageBody::Attachment {
                source: Some(dir.path().join("gone.jpg")),
                caption: String::new(),
            },
        )
        .await
        .unwrap();

    assert!(!result.is_success());
    assert!(result.message().starts_with("Media file not found"));
    assert!(backend.latest().sent().is_empty());
}

/// **VALUE**: Verifies batch order and per-recipient isolation.
///
/// **WHY THIS MATTERS**: Callers match results to inputs by position. One bad number must
/// not cost the rest of the list their message.
///
/// **BUG THIS CATCHES**: Would catch early exit on first failure, or reordered results.
#[tokio::test]
async fn given_middle_recipient_fails_when_sending_many_then_three_results_in_order() {
    // GIVEN: B is rejected by the backend
    let (backend, dispatcher) = ready_dispatcher(FakeScript {
        failing_recipients: vec![String::from("912222222222@c.us")],
        ..FakeScript::default()
    })
    .await;
    let batch = BatchDispatcher::new(dispatcher);

    // WHEN: Sending to A, B, C
    let results = batch
        .send_many(&["1111111111", "2222222222", "3333333333"], "news")
        .await;

    // THEN: A ok, B failed, C ok, in input order
    let summary: Vec<(&str, bool)> = results
        .iter()
        .map(|r| (r.recipient(), r.is_success()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("1111111111", true),
            ("2222222222", false),
            ("3333333333", true)
        ]
    );
    assert_eq!(results[1].message(), REJECTION_TEXT);
    assert_eq!(backend.latest().sent().len(), 2);
}

/// **VALUE**: Verifies an empty batch yields an empty result list.
#[tokio::test]
async fn given_no_recipients_when_sending_many_then_empty_results() {
    let (backend, dispatcher) = ready_dispatcher(FakeScript::default()).await;
    let batch = BatchDispatcher::new(dispatcher);

    let results = batch.send_many::<&str>(&[], "nobody").await;

    assert!(results.is_empty());
    assert!(backend.latest().sent().is_empty());
}

/// **VALUE**: Verifies a batch without a session reports every recipient as not ready.
///
/// **BUG THIS CATCHES**: Would catch the batch aborting instead of producing one result
/// per input.
#[tokio::test]
async fn given_no_session_when_sending_many_then_each_result_not_ready() {
    let (_backend, session) = session_with(FakeScript::default());
    let batch = BatchDispatcher::new(Dispatcher::new(session, AddressNormalizer::default()));

    let results = batch.send_many(&["1", "2"], "hi").await;

    assert_eq!(results.len(), 2);
    assert!(
        results
            .iter()
            .all(|r| !r.is_success() && r.message() == NOT_READY_MESSAGE)
    );
}

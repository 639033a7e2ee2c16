use crate::{MediaPayloadBuilder, ModelError};

/// **VALUE**: Verifies a fully specified builder produces the expected payload.
///
/// **WHY THIS MATTERS**: The dispatcher hands this payload straight to the backend. A field
/// silently dropped here means the bridge gets the wrong MIME type or size.
///
/// **BUG THIS CATCHES**: Would catch if `build()` mixes up or ignores setters.
#[test]
fn given_all_fields_when_building_media_payload_then_values_are_preserved() {
    // GIVEN: A complete builder
    let builder = MediaPayloadBuilder::default()
        .with_source("/tmp/uploads/1700000000000_invoice.pdf")
        .with_mime_type("application/pdf")
        .with_size_bytes(2048)
        .with_file_name("invoice.pdf");

    // WHEN: Building
    let payload = builder.build().expect("valid payload");

    // THEN: Every field round-trips
    assert_eq!(payload.mime_type(), "application/pdf");
    assert_eq!(payload.size_bytes(), 2048);
    assert_eq!(payload.file_name(), "invoice.pdf");
    assert!(payload.source().ends_with("1700000000000_invoice.pdf"));
}

/// **VALUE**: Verifies the file name falls back to the source path's last component.
///
/// **WHY THIS MATTERS**: Uploaded files are stored with a timestamp prefix and the dispatcher
/// doesn't always know the original name.
///
/// **BUG THIS CATCHES**: Would catch if a missing file name became an error or an empty string.
#[test]
fn given_no_file_name_when_building_then_derives_from_source() {
    // GIVEN: A builder without an explicit file name
    let payload = MediaPayloadBuilder::default()
        .with_source("/srv/uploads/photo.jpg")
        .with_mime_type("image/jpeg")
        .with_size_bytes(10)
        .build()
        .expect("valid payload");

    // THEN: Name comes from the path
    assert_eq!(payload.file_name(), "photo.jpg");
}

/// **VALUE**: Verifies a MIME type without a slash is rejected.
///
/// **WHY THIS MATTERS**: The bridge decides between image/video/document rendering by MIME
/// type. A malformed value produces a confusing backend error far from the cause.
///
/// **BUG THIS CATCHES**: Would catch if MIME validation is removed.
#[test]
fn given_malformed_mime_type_when_building_then_returns_validation_error() {
    // GIVEN: A bare word instead of type/subtype
    let result = MediaPayloadBuilder::default()
        .with_source("/srv/uploads/file.bin")
        .with_mime_type("binary")
        .with_size_bytes(1)
        .build();

    // THEN: Validation error names the bad value
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Invalid MIME type: binary");
        }
        Ok(_) => panic!("Malformed MIME type should be rejected"),
    }
}

/// **VALUE**: Verifies that a payload without a source is rejected.
///
/// **WHY THIS MATTERS**: A media payload with nowhere to read bytes from cannot be sent.
///
/// **BUG THIS CATCHES**: Would catch if the required-field check on `source` is dropped.
#[test]
fn given_missing_source_when_building_then_returns_validation_error() {
    // GIVEN: Builder with everything but the source
    let result = MediaPayloadBuilder::default()
        .with_mime_type("image/png")
        .with_size_bytes(1)
        .build();

    // THEN: Should fail
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Media source is required");
        }
        Ok(_) => panic!("Missing source should be rejected"),
    }
}

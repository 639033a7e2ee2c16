use crate::api::ApiState;
use crate::api::extract::{BodyRejection, JsonOrForm};
use crate::dispatch::MessageBody;
use crate::error::api::ApiError;
use crate::error::dispatch::DispatchError;

use common::ErrorLocation;

use models::{DispatchResult, SessionState};

use std::panic::Location;
use std::path::PathBuf;

use axum::Json;
use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, State};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

const INITIALIZED_MESSAGE: &str = "WhatsApp client initialized";
const INITIALIZATION_FAILED_MESSAGE: &str = "Initialization failed";
const SEND_VALIDATION_MESSAGE: &str = "Missing phone number or message";
const SEND_FAILED_MESSAGE: &str = "Failed to send message";
const BATCH_VALIDATION_MESSAGE: &str = "Phone numbers and message are required.";
const MEDIA_VALIDATION_MESSAGE: &str = "Phone number and either file or caption are required.";
const MEDIA_FAILED_MESSAGE: &str = "Failed to send media message";
const STATE_FAILED_MESSAGE: &str = "Failed to get state";

const FILE_FIELD: &str = "filePath";
const PHONE_NUMBER_FIELD: &str = "phoneNumber";
const CAPTION_FIELD: &str = "caption";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendRequest {
    phone_number: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendManyRequest {
    phone_numbers: Option<Vec<String>>,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusResponse {
    success: bool,
    message: String,
}

impl From<DispatchResult> for StatusResponse {
    fn from(result: DispatchResult) -> Self {
        Self {
            success: result.is_success(),
            message: result.message().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StateResponse {
    success: bool,
    state: SessionState,
}

/// `GET /initialize`
pub(crate) async fn initialize(
    State(state): State<ApiState>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.session.connect().await.map_err(|e| {
        error!("Error initializing WhatsApp client: {e}");
        failed(INITIALIZATION_FAILED_MESSAGE, e.reason())
    })?;

    Ok(Json(StatusResponse {
        success: true,
        message: INITIALIZED_MESSAGE.to_string(),
    }))
}

/// `POST /send`
///
/// A backend rejection is still a 200 with `success: false`; only a missing
/// session is a 500.
pub(crate) async fn send(
    State(state): State<ApiState>,
    payload: Result<JsonOrForm<SendRequest>, BodyRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let request = match payload {
        Ok(JsonOrForm(request)) => request,
        Err(e) => {
            debug!("Unparseable /send body: {}", e.reason);
            SendRequest::default()
        }
    };

    let (Some(phone_number), Some(message)) = (
        present(request.phone_number),
        present(request.message),
    ) else {
        return Err(validation(SEND_VALIDATION_MESSAGE));
    };

    let result = state
        .dispatcher
        .send_one(&phone_number, &MessageBody::Text(message))
        .await
        .map_err(|e| send_failed(SEND_FAILED_MESSAGE, &e))?;

    Ok(Json(result.into()))
}

/// `POST /send-messages`
pub(crate) async fn send_messages(
    State(state): State<ApiState>,
    payload: Result<JsonOrForm<SendManyRequest>, BodyRejection>,
) -> Result<Json<Vec<DispatchResult>>, ApiError> {
    let request = match payload {
        Ok(JsonOrForm(request)) => request,
        Err(e) => {
            debug!("Unparseable /send-messages body: {}", e.reason);
            SendManyRequest::default()
        }
    };

    let (Some(phone_numbers), Some(message)) = (request.phone_numbers, present(request.message))
    else {
        return Err(ApiError::BatchValidation {
            message: BATCH_VALIDATION_MESSAGE.to_string(),
            location: ErrorLocation::from(Location::caller()),
        });
    };

    info!("Sending message to {} recipients", phone_numbers.len());
    Ok(Json(state.batch.send_many(&phone_numbers, &message).await))
}

/// Fields collected from a `/send-media` multipart body.
#[derive(Debug, Default)]
struct MediaForm {
    phone_number: Option<String>,
    caption: Option<String>,
    upload: Option<PathBuf>,
}

/// `POST /send-media`
///
/// The stored upload is discarded after the attempt, whatever the outcome,
/// subject to the store's retention policy.
pub(crate) async fn send_media(
    State(state): State<ApiState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        debug!("Rejected /send-media body: {e}");
        validation(MEDIA_VALIDATION_MESSAGE)
    })?;

    let mut form = MediaForm::default();
    let collected = collect_media_form(&state, &mut multipart, &mut form).await;

    let outcome = match collected {
        Ok(()) => dispatch_media(&state, &mut form).await,
        Err(e) => Err(e),
    };

    if let Some(path) = form.upload.take() {
        state.uploads.discard(&path).await;
    }

    outcome
}

async fn collect_media_form(
    state: &ApiState,
    multipart: &mut Multipart,
    form: &mut MediaForm,
) -> Result<(), ApiError> {
    loop {
        let field = multipart.next_field().await.map_err(|e| {
            debug!("Multipart error: {e}");
            validation(MEDIA_VALIDATION_MESSAGE)
        })?;

        let Some(field) = field else {
            return Ok(());
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                if let Some(path) = store_upload(state, field).await? {
                    // A repeated file field replaces the earlier one.
                    if let Some(previous) = form.upload.replace(path) {
                        state.uploads.discard(&previous).await;
                    }
                }
            }
            PHONE_NUMBER_FIELD => form.phone_number = Some(field_text(field).await?),
            CAPTION_FIELD => form.caption = Some(field_text(field).await?),
            other => debug!("Ignoring multipart field '{other}'"),
        }
    }
}

/// Persist a file part. Browsers send an empty, unnamed part when no file was picked.
async fn store_upload(state: &ApiState, field: Field<'_>) -> Result<Option<PathBuf>, ApiError> {
    let file_name = field.file_name().unwrap_or_default().to_string();

    let data = field.bytes().await.map_err(|e| {
        error!("Failed to read upload data: {e}");
        validation(MEDIA_VALIDATION_MESSAGE)
    })?;

    if file_name.is_empty() && data.is_empty() {
        return Ok(None);
    }

    let path = state.uploads.save(&file_name, &data).await.map_err(|e| {
        error!("Failed to store upload: {e}");
        failed(MEDIA_FAILED_MESSAGE, &e.to_string())
    })?;

    Ok(Some(path))
}

async fn field_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(|e| {
        debug!("Unreadable multipart text field: {e}");
        validation(MEDIA_VALIDATION_MESSAGE)
    })
}

async fn dispatch_media(
    state: &ApiState,
    form: &mut MediaForm,
) -> Result<Json<StatusResponse>, ApiError> {
    let caption = present(form.caption.take());

    let Some(phone_number) = present(form.phone_number.take()) else {
        return Err(validation(MEDIA_VALIDATION_MESSAGE));
    };
    if form.upload.is_none() && caption.is_none() {
        return Err(validation(MEDIA_VALIDATION_MESSAGE));
    }

    debug!("File path: {:?}", form.upload);

    let body = MessageBody::Attachment {
        source: form.upload.clone(),
        caption: caption.unwrap_or_default(),
    };

    let result = state
        .dispatcher
        .send_one(&phone_number, &body)
        .await
        .map_err(|e| send_failed(MEDIA_FAILED_MESSAGE, &e))?;

    Ok(Json(result.into()))
}

/// `GET /state`
///
/// Starts a session first whenever no client exists, including after a disconnect.
pub(crate) async fn state(State(state): State<ApiState>) -> Result<Json<StateResponse>, ApiError> {
    let snapshot = match state.session.ensure_connected().await {
        Ok(()) => state.session.current_state().await,
        Err(e) => Err(e),
    }
    .map_err(|e| {
        error!("Error getting client state: {e}");
        failed(STATE_FAILED_MESSAGE, e.reason())
    })?;

    Ok(Json(StateResponse {
        success: true,
        state: snapshot,
    }))
}

/// Missing and empty are the same thing to these endpoints.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[track_caller]
fn validation(message: impl Into<String>) -> ApiError {
    ApiError::Validation {
        message: message.into(),
        location: ErrorLocation::from(Location::caller()),
    }
}

#[track_caller]
fn failed(message: &str, error: &str) -> ApiError {
    ApiError::Failed {
        message: message.to_string(),
        error: error.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}

#[track_caller]
fn send_failed(message: &str, error: &DispatchError) -> ApiError {
    error!("{message}: {error}");
    failed(message, error.reason())
}

//! HTTP surface of the relay.
//!
//! Thin mapping from requests onto the session manager and dispatchers. Body
//! shapes and messages match what existing clients of this API expect, see
//! [`ApiError`](crate::error::api::ApiError) for the failure side.

mod extract;
mod handle;
mod handlers;
pub mod upload;

pub use handle::RelayServerHandle;
pub use upload::UploadStore;

use crate::dispatch::Dispatcher;
use crate::dispatch::batch::BatchDispatcher;
use crate::error::server::ServerError;
use crate::session::SessionManager;

use common::ErrorLocation;

use std::net::SocketAddr;
use std::panic::Location;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use axum::routing::{get, post};
use log::{error, info};
use tokio::net::TcpListener;
use tokio::spawn as TokioSpawn;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};

pub const INITIALIZE_ROUTE: &str = "/initialize";
pub const SEND_ROUTE: &str = "/send";
pub const SEND_MESSAGES_ROUTE: &str = "/send-messages";
pub const SEND_MEDIA_ROUTE: &str = "/send-media";
pub const STATE_ROUTE: &str = "/state";

/// Everything the handlers need, cloned per request.
#[derive(Clone)]
pub struct ApiState {
    pub(crate) session: SessionManager,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) batch: BatchDispatcher,
    pub(crate) uploads: UploadStore,
}

impl ApiState {
    pub fn new(session: SessionManager, dispatcher: Dispatcher, uploads: UploadStore) -> Self {
        Self {
            session,
            batch: BatchDispatcher::new(dispatcher.clone()),
            dispatcher,
            uploads,
        }
    }
}

/// Build the relay router.
///
/// `max_upload_bytes` caps whole request bodies. Keep it above the media
/// send limit so oversized attachments reach the dispatcher and get its
/// size message instead of a bare 413.
pub fn router(state: ApiState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(INITIALIZE_ROUTE, get(handlers::initialize))
        .route(SEND_ROUTE, post(handlers::send))
        .route(SEND_MESSAGES_ROUTE, post(handlers::send_messages))
        .route(SEND_MEDIA_ROUTE, post(handlers::send_media))
        .route(STATE_ROUTE, get(handlers::state))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
}

/// Bind `addr` and serve the relay API in a background task.
///
/// The upload directory is created before the listener starts accepting.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is unavailable, or
/// [`ServerError::Io`] if the upload directory cannot be created.
pub async fn start_http_server(
    addr: SocketAddr,
    state: ApiState,
    max_upload_bytes: usize,
) -> Result<RelayServerHandle, ServerError> {
    state.uploads.prepare().await?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind {
            message: format!("Failed to bind {addr}: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
    let local_addr = listener.local_addr()?;

    info!("Server is running on http://{local_addr}");

    let app = router(state, max_upload_bytes);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = TokioSpawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("HTTP server stopped with error: {e}");
        }
    });

    Ok(RelayServerHandle::new(local_addr, shutdown_tx, task))
}

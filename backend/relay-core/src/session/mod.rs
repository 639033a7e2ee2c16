//! Ownership and lifecycle of the single backend session.
//!
//! # Architecture
//!
//! Same actor layout as the rest of the core:
//! - Mutations (attach, detach, backend events) go through one mpsc inbox
//! - A dedicated task applies them in order
//! - Request handlers read snapshots through `Arc<RwLock<T>>`
//!
//! Backend events arrive on the bridge's own task at arbitrary times. Routing
//! them through the inbox means handlers never observe a half-applied
//! transition, and events from a replaced client are dropped by instance id.

mod events;
mod handle;

pub use events::EventSink;
pub use handle::ClientHandle;

use crate::backend::{AuthStore, MessagingBackend, SessionEvent};
use crate::error::session::SessionError;

use common::ErrorLocation;

use models::SessionState;

use std::panic::Location;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use uuid::Uuid;

const SESSION_INBOX_CAPACITY: usize = 100;

/// Messages processed by the session actor.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    /// Install a freshly created handle and reset state to `Initializing`.
    Attach {
        handle: ClientHandle,
        ack: oneshot::Sender<()>,
    },

    /// Drop the handle with this instance id (failed start or shutdown).
    Detach {
        instance: Uuid,
        ack: oneshot::Sender<()>,
    },

    /// Lifecycle event from the backend client `instance`.
    Event { instance: Uuid, event: SessionEvent },
}

/// Owns the backend client handle and the session state.
///
/// `Clone` and cheap to share; all clones drive the same session.
#[derive(Clone)]
pub struct SessionManager {
    backend: Arc<dyn MessagingBackend>,
    store: AuthStore,

    /// Channel to the actor, created on first use
    command_tx: Arc<Mutex<Option<mpsc::Sender<SessionCommand>>>>,
    actor_init: Arc<Mutex<bool>>,

    handle: Arc<RwLock<Option<ClientHandle>>>,

    /// `None` until the first connect attempt
    state: Arc<RwLock<Option<SessionState>>>,

    /// Serializes connect attempts so two requests can't both build a client
    connect_lock: Arc<Mutex<()>>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn MessagingBackend>, store: AuthStore) -> Self {
        Self {
            backend,
            store,
            command_tx: Arc::new(Mutex::new(None)),
            actor_init: Arc::new(Mutex::new(false)),
            handle: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(None)),
            connect_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create the backend client and start connecting.
    ///
    /// No-op while a handle exists. Returns once the backend has accepted the
    /// start request; `Ready` arrives later as an event.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Backend`] if the client cannot be built or
    /// refuses to start. The half-built handle is discarded so a later call
    /// starts clean.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let _connect_guard = self.connect_lock.lock().await;

        if let Some(existing) = self.handle.read().await.as_ref() {
            debug!(
                "WhatsApp client {} already exists, skipping connect",
                existing.instance()
            );
            return Ok(());
        }

        let client = self.backend.create_client(&self.store)?;
        let handle = ClientHandle::new(client);
        let instance = handle.instance();

        info!(
            "Initializing WhatsApp client {instance} (client id '{}', data path {})",
            self.store.client_id,
            self.store.data_path.display()
        );

        self.request(|ack| SessionCommand::Attach {
            handle: handle.clone(),
            ack,
        })
        .await?;

        let sink = EventSink::new(instance, self.sender().await?);

        if let Err(e) = handle.client().initialize(sink).await {
            error!("WhatsApp client {instance} failed to initialize: {e}");
            self.request(|ack| SessionCommand::Detach { instance, ack })
                .await?;
            return Err(e.into());
        }

        info!("WhatsApp client {instance} initialization started");
        Ok(())
    }

    /// Start the session lazily when no client handle exists.
    ///
    /// Covers both the first query and the state after a disconnect released
    /// the handle. While a client is initializing, awaiting auth or ready this
    /// does nothing.
    pub async fn ensure_connected(&self) -> Result<(), SessionError> {
        if self.handle.read().await.is_some() {
            return Ok(());
        }

        debug!("No WhatsApp client, connecting lazily");
        self.connect().await
    }

    /// Snapshot of the session state.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotInitialized`] if no client was ever created.
    pub async fn current_state(&self) -> Result<SessionState, SessionError> {
        self.state
            .read()
            .await
            .clone()
            .ok_or_else(|| SessionError::NotInitialized {
                message: String::from("Client not initialized"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// The live handle, if any.
    pub async fn client_handle(&self) -> Option<ClientHandle> {
        self.handle.read().await.clone()
    }

    /// The live handle, only if the backend reports it authenticated.
    pub async fn ready_client(&self) -> Option<ClientHandle> {
        self.handle
            .read()
            .await
            .as_ref()
            .filter(|handle| handle.client().is_ready())
            .cloned()
    }

    /// Tear the current client down, e.g. on process shutdown.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let Some(instance) = self.handle.read().await.as_ref().map(ClientHandle::instance) else {
            return Ok(());
        };

        info!("Shutting down WhatsApp client {instance}");
        self.request(|ack| SessionCommand::Detach { instance, ack })
            .await
    }

    /// Send a command and wait for the actor to apply it.
    async fn request<F>(&self, build: F) -> Result<(), SessionError>
    where
        F: FnOnce(oneshot::Sender<()>) -> SessionCommand,
    {
        let (ack_tx, ack_rx) = oneshot::channel();
        let tx = self.sender().await?;

        tx.send(build(ack_tx))
            .await
            .map_err(|e| SessionError::ActorGone {
                message: format!("Session actor died: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        ack_rx.await.map_err(|e| SessionError::ActorGone {
            message: format!("Session actor dropped acknowledgement: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    async fn sender(&self) -> Result<mpsc::Sender<SessionCommand>, SessionError> {
        self.ensure_actor().await;

        self.command_tx
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or_else(|| SessionError::ActorGone {
                message: String::from("Session actor not initialized"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Spawn the actor on first use, from inside the runtime.
    async fn ensure_actor(&self) {
        let mut init_guard = self.actor_init.lock().await;
        if !*init_guard {
            let (tx, rx) = mpsc::channel(SESSION_INBOX_CAPACITY);

            // Store tx BEFORE spawning to avoid race
            let mut tx_guard = self.command_tx.lock().await;
            *tx_guard = Some(tx);
            drop(tx_guard);

            tokio::spawn(session_actor(
                rx,
                Arc::clone(&self.handle),
                Arc::clone(&self.state),
            ));
            *init_guard = true;
            info!("Session actor spawned");
        }
    }
}

/// The session actor task.
///
/// Sole writer of `handle` and `state`. Runs until every sender is dropped.
async fn session_actor(
    mut command_rx: mpsc::Receiver<SessionCommand>,
    handle: Arc<RwLock<Option<ClientHandle>>>,
    state: Arc<RwLock<Option<SessionState>>>,
) {
    info!("Session actor started");

    while let Some(cmd) = command_rx.recv().await {
        match cmd {
            SessionCommand::Attach { handle: new_handle, ack } => {
                let mut handle_write = handle.write().await;

                if let Some(ref existing) = *handle_write {
                    warn!(
                        "Replacing WhatsApp client {} with {}",
                        existing.instance(),
                        new_handle.instance()
                    );
                }

                *handle_write = Some(new_handle);
                *state.write().await = Some(SessionState::initializing());
                let _ = ack.send(());
            }
            SessionCommand::Detach { instance, ack } => {
                let released = take_if_current(&handle, instance).await;

                if let Some(old) = released {
                    *state.write().await = Some(SessionState::disconnected());
                    release(old);
                } else {
                    warn!("Detach requested for unknown WhatsApp client {instance}");
                }

                let _ = ack.send(());
            }
            SessionCommand::Event { instance, event } => {
                let is_current = handle
                    .read()
                    .await
                    .as_ref()
                    .is_some_and(|h| h.instance() == instance);

                if !is_current {
                    debug!("Ignoring {event:?} from stale WhatsApp client {instance}");
                    continue;
                }

                match event {
                    SessionEvent::QrCodeIssued(challenge) => {
                        info!("QR RECEIVED for WhatsApp client {instance}");
                        *state.write().await = Some(SessionState::awaiting_auth(challenge));
                    }
                    SessionEvent::Ready => {
                        info!("WhatsApp client {instance} is ready");
                        *state.write().await = Some(SessionState::ready());
                    }
                    SessionEvent::Disconnected(reason) => {
                        warn!("WhatsApp client {instance} disconnected: {reason}");

                        // Handle goes first: anyone who sees `disconnected` may reconnect.
                        let released = take_if_current(&handle, instance).await;
                        *state.write().await = Some(SessionState::disconnected());

                        if let Some(old) = released {
                            release(old);
                        }
                    }
                }
            }
        }
    }

    warn!("Session actor stopped - this should not happen during normal operation");
}

async fn take_if_current(
    handle: &RwLock<Option<ClientHandle>>,
    instance: Uuid,
) -> Option<ClientHandle> {
    let mut handle_write = handle.write().await;
    if handle_write.as_ref().is_some_and(|h| h.instance() == instance) {
        handle_write.take()
    } else {
        None
    }
}

/// Destroy a detached client off the actor task so a slow backend can't stall the inbox.
fn release(old: ClientHandle) {
    tokio::spawn(async move {
        let instance = old.instance();
        match old.client().destroy().await {
            Ok(()) => info!("WhatsApp client {instance} destroyed"),
            Err(e) => warn!("Failed to destroy WhatsApp client {instance}: {e}"),
        }
    });
}

use crate::backend::SessionEvent;
use crate::session::SessionCommand;

use log::warn;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Delivers backend lifecycle events to the session manager's inbox.
///
/// Handed to [`BackendClient::initialize`](crate::backend::BackendClient::initialize);
/// every event is stamped with the instance id of the handle it belongs to.
#[derive(Debug, Clone)]
pub struct EventSink {
    instance: Uuid,
    command_tx: mpsc::Sender<SessionCommand>,
}

impl EventSink {
    pub(crate) fn new(instance: Uuid, command_tx: mpsc::Sender<SessionCommand>) -> Self {
        Self {
            instance,
            command_tx,
        }
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    /// Returns false once the session manager is gone.
    pub async fn emit(&self, event: SessionEvent) -> bool {
        let command = SessionCommand::Event {
            instance: self.instance,
            event,
        };

        match self.command_tx.send(command).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping backend event, session actor stopped: {e}");
                false
            }
        }
    }
}

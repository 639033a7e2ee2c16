use crate::backend::BackendClient;

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// The session manager's reference to the one live backend client.
///
/// Each handle gets a fresh instance id, so events from a client that has
/// already been replaced can be told apart and dropped.
#[derive(Clone)]
pub struct ClientHandle {
    instance: Uuid,
    client: Arc<dyn BackendClient>,
}

impl ClientHandle {
    pub(crate) fn new(client: Arc<dyn BackendClient>) -> Self {
        Self {
            instance: Uuid::new_v4(),
            client,
        }
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn client(&self) -> &Arc<dyn BackendClient> {
        &self.client
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("instance", &self.instance)
            .field("ready", &self.client.is_ready())
            .finish()
    }
}

use crate::dispatch::{Dispatcher, MessageBody};

use models::DispatchResult;

use log::info;

/// Fans one text message out to many recipients.
///
/// Sends strictly in input order, one at a time. A failure for one
/// recipient is recorded and the loop moves on; there is no early exit and
/// no retry.
#[derive(Clone)]
pub struct BatchDispatcher {
    dispatcher: Dispatcher,
}

impl BatchDispatcher {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// One result per input, in input order.
    pub async fn send_many<S: AsRef<str>>(&self, raws: &[S], text: &str) -> Vec<DispatchResult> {
        let body = MessageBody::Text(text.to_string());
        let mut results = Vec::with_capacity(raws.len());

        for raw in raws {
            results.push(self.dispatcher.attempt(raw.as_ref(), &body).await);
        }

        let sent = results.iter().filter(|r| r.is_success()).count();
        info!("Batch send finished: {sent}/{} delivered", results.len());

        results
    }
}

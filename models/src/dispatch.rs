use serde::{Deserialize, Serialize};

/// Outcome of one attempted send.
///
/// `recipient` is the raw input exactly as the caller supplied it, not the
/// normalized address. Serializes as `{phoneNumber, success, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    #[serde(rename = "phoneNumber")]
    recipient: String,
    success: bool,
    message: String,
}

impl DispatchResult {
    pub fn sent(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(recipient: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            success: false,
            message: message.into(),
        }
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

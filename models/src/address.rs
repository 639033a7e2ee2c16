use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::Serialize;

/// Canonical chat identifier the backend expects, e.g. `919876543210@c.us`.
///
/// Only the address normalizer in `relay-core` builds these, so every value
/// carries the configured country code and domain suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecipientAddress(String);

impl RecipientAddress {
    pub fn new(digits: &str, domain: &str) -> Self {
        Self(format!("{digits}@{domain}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecipientAddress {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(&self.0)
    }
}

impl AsRef<str> for RecipientAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

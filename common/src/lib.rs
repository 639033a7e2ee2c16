//! Shared plumbing for the WhatsApp relay workspace.
//!
//! Nothing in here knows about sessions or messages. It carries the pieces
//! every other crate leans on:
//!
//! - [`ErrorLocation`]: file/line/column captured at the error site
//! - [`HttpStatusCode`]: status classification for bridge retry decisions
//! - [`RedactedToken`]: bridge credential that never reaches logs

pub mod error;
pub mod http_status;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_token::RedactedToken;

#[cfg(test)]
mod tests;

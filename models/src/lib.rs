//! Domain models for the WhatsApp relay.
//!
//! Pure data structures shared between the relay core and the server binary.
//! Nothing in here performs I/O; invariants are enforced by constructors so
//! an ill-formed value cannot be built in the first place.
//!
//! ## Architecture
//!
//! - **models** (this crate): session state, recipient addresses, dispatch results, media views
//! - **relay-core**: normalizer, session manager, dispatchers, bridge backend, HTTP API
//! - **relay-server**: binary wiring config, logging and the HTTP listener together

pub mod address;
pub mod dispatch;
pub mod error;
pub mod media;
pub mod session;

pub use address::RecipientAddress;
pub use common::ErrorLocation;
pub use dispatch::DispatchResult;
pub use error::model_error::ModelError;
pub use media::MediaPayload;
pub use media::builder::MediaPayloadBuilder;
pub use session::{SessionState, SessionStatus};

#[cfg(test)]
mod tests;

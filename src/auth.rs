//! Credential models: redacted secrets, credential pairs, and refresh wire payloads.

pub mod credential;
pub mod secret;

pub use credential::*;
pub use secret::*;

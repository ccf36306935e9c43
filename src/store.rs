//! Credential store contract and the built-in in-memory implementation.
//!
//! The store is the system of record for the credential pair. The gateway reads the
//! current tokens through it on every request, the refresh coordinator writes rotated
//! tokens back, and the session terminator clears it.

pub mod memory;

pub use memory::MemoryCredentialStore;

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the access/refresh token pair.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Returns the current access token, if one is stored.
	fn token(&self) -> StoreFuture<'_, Option<TokenSecret>>;

	/// Returns the current refresh token, if one is stored.
	fn refresh_token(&self) -> StoreFuture<'_, Option<TokenSecret>>;

	/// Persists or replaces the credential pair.
	fn save(&self, pair: CredentialPair) -> StoreFuture<'_, ()>;

	/// Erases both tokens.
	fn logout(&self) -> StoreFuture<'_, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

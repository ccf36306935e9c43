//! Thread-safe in-memory [`CredentialStore`] implementation for tests and embedded clients.

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	store::{CredentialStore, StoreError, StoreFuture},
};

type Slot = Arc<RwLock<Option<CredentialPair>>>;

/// Keeps the credential pair in process memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore(Slot);
impl MemoryCredentialStore {
	/// Creates a store seeded with `pair`.
	pub fn with_pair(pair: CredentialPair) -> Self {
		Self(Arc::new(RwLock::new(Some(pair))))
	}

	/// Returns a copy of the stored pair.
	pub fn snapshot(&self) -> Option<CredentialPair> {
		self.0.read().clone()
	}

	/// Whether the store currently holds no credentials.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_none()
	}

	fn read_now<F>(slot: &Slot, pick: F) -> Result<Option<TokenSecret>, StoreError>
	where
		F: FnOnce(&CredentialPair) -> Option<TokenSecret>,
	{
		Ok(slot.read().as_ref().and_then(pick))
	}
}
impl CredentialStore for MemoryCredentialStore {
	fn token(&self) -> StoreFuture<'_, Option<TokenSecret>> {
		let slot = self.0.clone();

		Box::pin(async move { Self::read_now(&slot, |pair| Some(pair.access_token.clone())) })
	}

	fn refresh_token(&self) -> StoreFuture<'_, Option<TokenSecret>> {
		let slot = self.0.clone();

		Box::pin(async move { Self::read_now(&slot, |pair| pair.refresh_token.clone()) })
	}

	fn save(&self, pair: CredentialPair) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = Some(pair);

			Ok(())
		})
	}

	fn logout(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.write().take();

			Ok(())
		})
	}
}

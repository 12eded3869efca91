//! In-process credential store for tests and embedding.

// self
use crate::{
	_prelude::*,
	auth::{AuthId, AuthRecord},
	config::PasskeySource,
	store::{self, CredentialStore, Hydration, SealedRecords, SealedToken, StoreFuture},
};

/// Keeps sealed records in memory, applying the same sealing rules as the file store.
#[derive(Clone, Debug, Default)]
pub struct MemoryCredentialStore {
	records: Arc<RwLock<SealedRecords>>,
	passkeys: PasskeySource,
}
impl MemoryCredentialStore {
	/// Empty store reading passkeys from `passkeys`.
	pub fn new(passkeys: PasskeySource) -> Self {
		Self { records: Default::default(), passkeys }
	}

	/// Handle over the same records that reads passkeys from `passkeys` instead.
	pub fn with_passkeys(&self, passkeys: PasskeySource) -> Self {
		Self { records: Arc::clone(&self.records), passkeys }
	}

	/// Sealed form of a record, as it would be written to disk.
	pub fn sealed(&self, auth_id: &AuthId) -> Option<AuthRecord<SealedToken>> {
		self.records.read().get(auth_id.as_ref()).cloned()
	}
}
impl CredentialStore for MemoryCredentialStore {
	fn list(&self) -> StoreFuture<'_, BTreeMap<AuthId, AuthRecord>> {
		Box::pin(async move { Ok(store::public_records(self.records.read().clone())) })
	}

	fn get<'a>(&'a self, auth_id: &'a AuthId) -> StoreFuture<'a, Option<AuthRecord>> {
		Box::pin(async move {
			Ok(self.sealed(auth_id).map(|record| record.map_token(SealedToken::public)))
		})
	}

	fn hydrate<'a>(&'a self, auth_id: &'a AuthId) -> StoreFuture<'a, Option<Hydration>> {
		Box::pin(async move {
			self.sealed(auth_id).map(|record| store::open_record(&self.passkeys, record)).transpose()
		})
	}

	fn upsert<'a>(&'a self, auth_id: &'a AuthId, record: AuthRecord) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let sealed = store::seal_record(&self.passkeys, record)?;

			self.records.write().insert(auth_id.to_string(), sealed);

			Ok(())
		})
	}

	fn remove<'a>(&'a self, auth_id: &'a AuthId) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.records.write().remove(auth_id.as_ref()).is_some()) })
	}

	fn rename<'a>(&'a self, from: &'a AuthId, to: &'a AuthId) -> StoreFuture<'a, ()> {
		Box::pin(async move { store::rename_record(&mut self.records.write(), from, to) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{AuthKind, Token, TokenSecret},
		error::SecretError,
		store::StoreError,
	};

	fn record() -> AuthRecord {
		AuthRecord {
			kind: AuthKind::Pkce,
			account_info: None,
			host_info: None,
			domains: None,
			auth_config: None,
			token: Token::builder().access_token("access").refresh_token("refresh").build(),
			created_at: None,
			updated_at: None,
		}
	}

	#[tokio::test]
	async fn passkey_changes_between_calls_are_honored() {
		let auth_id = AuthId::new("dev").expect("Fixture id should be valid.");
		let sealed_store = MemoryCredentialStore::new(PasskeySource::fixed("pk"));

		sealed_store.upsert(&auth_id, record()).await.expect("Upsert should succeed.");

		let locked = sealed_store.with_passkeys(PasskeySource::none());
		let store: &dyn CredentialStore = &locked;

		assert_eq!(
			store.get_with_secrets(&auth_id).await,
			Err(StoreError::Secret(SecretError::PasskeyRequired))
		);

		let store: &dyn CredentialStore = &sealed_store;
		let hydrated = store
			.get_with_secrets(&auth_id)
			.await
			.expect("Hydration should succeed.")
			.expect("Stored record should exist.");

		assert_eq!(hydrated.token.access_token.as_ref().map(TokenSecret::expose), Some("access"));
		assert_eq!(hydrated.token.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh"));
		assert!(store.remove(&auth_id).await.expect("Remove should succeed."));
		assert!(!store.remove(&auth_id).await.expect("Second remove should succeed."));
	}
}

//! Credential storage contract, at-rest sealing, and the built-in backends.
//!
//! Records are persisted with their secrets sealed: with a passkey, the access and refresh
//! tokens are written as `accessTokenEnc`/`refreshTokenEnc` envelopes; without one, the access
//! token is dropped and the refresh token is kept in plaintext. The passkey is looked up on
//! every call through a [`PasskeySource`].

pub mod cipher;
pub mod file;
pub mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

// self
use crate::{
	_prelude::*,
	auth::{AuthId, AuthRecord, Scope, Token, TokenSecret},
	config::PasskeySource,
	error::SecretError,
	store::cipher::EnvelopeKey,
};

/// Boxed future returned by [`CredentialStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// In-memory form of every record, keyed by the raw credential name.
pub(crate) type SealedRecords = BTreeMap<String, AuthRecord<SealedToken>>;

/// Per-identity credential storage.
///
/// Implementations read and write whole snapshots; there is no cross-process locking and the
/// last writer wins.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Every record, in public form (no access or refresh secrets).
	fn list(&self) -> StoreFuture<'_, BTreeMap<AuthId, AuthRecord>>;

	/// One record in public form.
	fn get<'a>(&'a self, auth_id: &'a AuthId) -> StoreFuture<'a, Option<AuthRecord>>;

	/// One record with its secrets opened, or a note that a passkey is needed to open them.
	fn hydrate<'a>(&'a self, auth_id: &'a AuthId) -> StoreFuture<'a, Option<Hydration>>;

	/// Inserts or replaces a record, sealing its secrets on the way in.
	fn upsert<'a>(&'a self, auth_id: &'a AuthId, record: AuthRecord) -> StoreFuture<'a, ()>;

	/// Deletes a record; returns `false` when it did not exist.
	fn remove<'a>(&'a self, auth_id: &'a AuthId) -> StoreFuture<'a, bool>;

	/// Moves a record to a new name. Fails when `from` is absent or `to` is taken.
	fn rename<'a>(&'a self, from: &'a AuthId, to: &'a AuthId) -> StoreFuture<'a, ()>;
}
impl dyn CredentialStore {
	/// Record with secrets, failing with [`SecretError::PasskeyRequired`] when sealed secrets
	/// cannot be opened.
	pub async fn get_with_secrets(&self, auth_id: &AuthId) -> Result<Option<AuthRecord>, StoreError> {
		match self.hydrate(auth_id).await? {
			Some(Hydration::Hydrated(record)) => Ok(Some(record)),
			Some(Hydration::RequiresPasskey(_)) => Err(SecretError::PasskeyRequired.into()),
			None => Ok(None),
		}
	}
}

/// Outcome of opening a stored record's secrets.
#[derive(Clone, Debug, PartialEq)]
pub enum Hydration {
	/// Every secret is available in plaintext.
	Hydrated(AuthRecord),
	/// Some secrets are sealed and no passkey is configured. The record carries whatever was
	/// readable (plaintext secrets and every non-secret field).
	RequiresPasskey(AuthRecord),
}
impl Hydration {
	/// The record, whether or not its secrets were opened.
	pub fn record(&self) -> &AuthRecord {
		match self {
			Self::Hydrated(record) | Self::RequiresPasskey(record) => record,
		}
	}

	/// Consumes the outcome and returns the record.
	pub fn into_record(self) -> AuthRecord {
		match self {
			Self::Hydrated(record) | Self::RequiresPasskey(record) => record,
		}
	}
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// The store content cannot be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// The storage medium failed.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// No record exists under the name.
	#[error("Authentication ID \"{auth_id}\" not found.")]
	NotFound {
		/// Credential name.
		auth_id: String,
	},
	/// A record already exists under the name.
	#[error("Authentication ID \"{auth_id}\" already exists.")]
	AlreadyExists {
		/// Credential name.
		auth_id: String,
	},
	/// Secrets could not be sealed or opened.
	#[error(transparent)]
	Secret(#[from] SecretError),
}

/// On-disk token: each secret is either a sealed envelope or plaintext, never both.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SealedToken {
	/// Plaintext access token (only in records written without a passkey by older tools).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub access_token: Option<TokenSecret>,
	/// Sealed access token.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub access_token_enc: Option<String>,
	/// Plaintext refresh token.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Sealed refresh token.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refresh_token_enc: Option<String>,
	/// Absolute expiry instant.
	#[serde(with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
	/// Token type label.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub token_type: Option<String>,
	/// Granted scope.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub scope: Option<Scope>,
}
impl SealedToken {
	/// Seals `token` under `key`, or drops the access token when there is no key.
	pub fn seal(token: Token, key: Option<&EnvelopeKey>) -> Result<Self, SecretError> {
		let mut sealed = Self {
			expires_at: token.expires_at,
			token_type: Some(token.token_type),
			scope: token.scope,
			..Default::default()
		};

		match key {
			Some(key) => {
				sealed.access_token_enc = token.access_token.map(|t| key.seal(&t)).transpose()?;
				sealed.refresh_token_enc = token.refresh_token.map(|t| key.seal(&t)).transpose()?;
			},
			None => sealed.refresh_token = token.refresh_token,
		}

		Ok(sealed)
	}

	/// Opens every secret it can. Returns the token and whether a sealed secret was skipped
	/// for lack of a key.
	pub fn open(self, key: Option<&EnvelopeKey>) -> Result<(Token, bool), SecretError> {
		let mut locked = false;
		let mut reveal = |plain: Option<TokenSecret>, sealed: Option<String>| match (sealed, key) {
			(Some(sealed), Some(key)) => key.open(&sealed).map(Some),
			(Some(_), None) => {
				locked = true;

				Ok(plain)
			},
			(None, _) => Ok(plain),
		};
		let access_token = reveal(self.access_token, self.access_token_enc)?;
		let refresh_token = reveal(self.refresh_token, self.refresh_token_enc)?;
		let token = Token {
			access_token,
			refresh_token,
			expires_at: self.expires_at,
			token_type: self.token_type.unwrap_or_else(|| crate::auth::DEFAULT_TOKEN_TYPE.into()),
			scope: self.scope,
		};

		Ok((token, locked))
	}

	/// Token without any secret.
	pub fn public(self) -> Token {
		Token {
			access_token: None,
			refresh_token: None,
			expires_at: self.expires_at,
			token_type: self.token_type.unwrap_or_else(|| crate::auth::DEFAULT_TOKEN_TYPE.into()),
			scope: self.scope,
		}
	}
}

fn envelope_key(passkeys: &PasskeySource) -> Result<Option<EnvelopeKey>, StoreError> {
	Ok(passkeys.passkey().as_ref().map(EnvelopeKey::derive).transpose()?)
}

pub(crate) fn seal_record(
	passkeys: &PasskeySource,
	record: AuthRecord,
) -> Result<AuthRecord<SealedToken>, StoreError> {
	let key = envelope_key(passkeys)?;

	if key.is_none() && record.token.access_token.is_some() {
		tracing::debug!("No passkey configured; the access token is not persisted.");
	}

	Ok(record.try_map_token(|token| SealedToken::seal(token, key.as_ref()))?)
}

pub(crate) fn open_record(
	passkeys: &PasskeySource,
	record: AuthRecord<SealedToken>,
) -> Result<Hydration, StoreError> {
	let key = envelope_key(passkeys)?;
	let mut locked = false;
	let record = record.try_map_token(|token| {
		let (token, skipped) = token.open(key.as_ref())?;

		locked = skipped;

		Ok::<_, SecretError>(token)
	})?;

	Ok(if locked { Hydration::RequiresPasskey(record) } else { Hydration::Hydrated(record) })
}

pub(crate) fn public_records(records: SealedRecords) -> BTreeMap<AuthId, AuthRecord> {
	records
		.into_iter()
		.filter_map(|(name, record)| match AuthId::new(&name) {
			Ok(auth_id) => Some((auth_id, record.map_token(SealedToken::public))),
			Err(e) => {
				tracing::warn!(auth_id = %name, error = %e, "Skipping record with an invalid name.");

				None
			},
		})
		.collect()
}

pub(crate) fn rename_record(
	records: &mut SealedRecords,
	from: &AuthId,
	to: &AuthId,
) -> Result<(), StoreError> {
	if !records.contains_key(from.as_ref()) {
		return Err(StoreError::NotFound { auth_id: from.to_string() });
	}
	if records.contains_key(to.as_ref()) {
		return Err(StoreError::AlreadyExists { auth_id: to.to_string() });
	}
	if let Some(record) = records.remove(from.as_ref()) {
		records.insert(to.to_string(), record);
	}

	Ok(())
}

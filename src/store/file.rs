//! JSON file backend: `{version, updatedAt, authIds}` under the SDK home.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
};
// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{AuthId, AuthRecord},
	config::{PasskeySource, Settings},
	error::ConfigError,
	store::{
		self, CredentialStore, Hydration, SealedRecords, SealedToken, StoreError, StoreFuture,
	},
};

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
	#[serde(default = "default_version")]
	version: u32,
	#[serde(default, with = "time::serde::rfc3339::option")]
	updated_at: Option<OffsetDateTime>,
	#[serde(default)]
	auth_ids: BTreeMap<String, Value>,
}

/// Decoded file content. Entries this crate cannot read are carried verbatim so a rewrite
/// never loses them.
#[derive(Debug, Default)]
struct Snapshot {
	records: SealedRecords,
	unreadable: BTreeMap<String, Value>,
}
impl Snapshot {
	fn decode(path: &Path, auth_ids: BTreeMap<String, Value>) -> Self {
		let mut snapshot = Self::default();

		for (name, raw) in auth_ids {
			match serde_json::from_value::<AuthRecord<SealedToken>>(raw.clone()) {
				Ok(record) => {
					snapshot.records.insert(name, record);
				},
				Err(e) => {
					tracing::warn!(
						auth_id = %name,
						path = %path.display(),
						error = %e,
						"Skipping unreadable credential record."
					);
					snapshot.unreadable.insert(name, raw);
				},
			}
		}

		snapshot
	}

	fn encode(self) -> Result<BTreeMap<String, Value>, StoreError> {
		let mut auth_ids = self.unreadable;

		for (name, record) in self.records {
			let value = serde_json::to_value(record).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize record {name}: {e}"),
			})?;

			auth_ids.insert(name, value);
		}

		Ok(auth_ids)
	}

	fn contains(&self, name: &str) -> bool {
		self.records.contains_key(name) || self.unreadable.contains_key(name)
	}

	fn remove(&mut self, name: &str) -> bool {
		let record = self.records.remove(name).is_some();
		let raw = self.unreadable.remove(name).is_some();

		record || raw
	}

	fn rename(&mut self, from: &AuthId, to: &AuthId) -> Result<(), StoreError> {
		if !self.contains(from) {
			return Err(StoreError::NotFound { auth_id: from.to_string() });
		}
		if self.contains(to) {
			return Err(StoreError::AlreadyExists { auth_id: to.to_string() });
		}
		if let Some(raw) = self.unreadable.remove(from.as_ref()) {
			self.unreadable.insert(to.to_string(), raw);

			return Ok(());
		}

		store::rename_record(&mut self.records, from, to)
	}
}

fn default_version() -> u32 {
	STORE_VERSION
}

/// Credential store persisted as one pretty-printed JSON file.
///
/// Every call reads the whole file (a missing or empty file is an empty store) and every
/// mutation rewrites it through a sibling temporary file.
#[derive(Clone, Debug)]
pub struct FileCredentialStore {
	path: PathBuf,
	passkeys: PasskeySource,
}
impl FileCredentialStore {
	/// Store at `path`; nothing touches the disk until the first call.
	pub fn new(path: impl Into<PathBuf>, passkeys: PasskeySource) -> Self {
		Self { path: path.into(), passkeys }
	}

	/// Store at `{sdk_home}/auth/auth-store.json` with passkeys from the environment.
	pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
		Ok(Self::new(settings.credential_store_path()?, PasskeySource::Environment))
	}

	/// File backing this store.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load(&self) -> Result<Snapshot, StoreError> {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Snapshot::default()),
			Err(e) =>
				return Err(StoreError::Backend {
					message: format!("Failed to read {}: {e}", self.path.display()),
				}),
		};

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(Snapshot::default());
		}

		let file: StoreFile = serde_json::from_slice(&bytes).map_err(|e| {
			StoreError::Serialization {
				message: format!("Invalid auth store format at {}: {e}", self.path.display()),
			}
		})?;

		Ok(Snapshot::decode(&self.path, file.auth_ids))
	}

	fn persist(&self, snapshot: Snapshot) -> Result<(), StoreError> {
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		let file = StoreFile {
			version: STORE_VERSION,
			updated_at: Some(OffsetDateTime::now_utc()),
			auth_ids: snapshot.encode()?,
		};
		let serialized = serde_json::to_vec_pretty(&file).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize auth store: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("json.tmp");

		{
			let mut tmp = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			tmp.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			tmp.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn take_sealed(&self, auth_id: &AuthId) -> Result<Option<AuthRecord<SealedToken>>, StoreError> {
		Ok(self.load()?.records.remove(auth_id.as_ref()))
	}
}
impl CredentialStore for FileCredentialStore {
	fn list(&self) -> StoreFuture<'_, BTreeMap<AuthId, AuthRecord>> {
		Box::pin(async move { Ok(store::public_records(self.load()?.records)) })
	}

	fn get<'a>(&'a self, auth_id: &'a AuthId) -> StoreFuture<'a, Option<AuthRecord>> {
		Box::pin(async move {
			Ok(self.take_sealed(auth_id)?.map(|record| record.map_token(SealedToken::public)))
		})
	}

	fn hydrate<'a>(&'a self, auth_id: &'a AuthId) -> StoreFuture<'a, Option<Hydration>> {
		Box::pin(async move {
			self.take_sealed(auth_id)?
				.map(|record| store::open_record(&self.passkeys, record))
				.transpose()
		})
	}

	fn upsert<'a>(&'a self, auth_id: &'a AuthId, record: AuthRecord) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let sealed = store::seal_record(&self.passkeys, record)?;
			let mut snapshot = self.load()?;

			snapshot.unreadable.remove(auth_id.as_ref());
			snapshot.records.insert(auth_id.to_string(), sealed);

			self.persist(snapshot)
		})
	}

	fn remove<'a>(&'a self, auth_id: &'a AuthId) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut snapshot = self.load()?;

			if !snapshot.remove(auth_id.as_ref()) {
				return Ok(false);
			}

			self.persist(snapshot)?;

			Ok(true)
		})
	}

	fn rename<'a>(&'a self, from: &'a AuthId, to: &'a AuthId) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut snapshot = self.load()?;

			snapshot.rename(from, to)?;

			self.persist(snapshot)
		})
	}
}

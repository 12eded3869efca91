//! Token lifecycle over stored credentials: reuse, renew, or fail.
//!
//! [`TokenLifecycleManager`] is the entry point callers use to obtain a bearer token for a
//! named credential. It loads the record from a [`CredentialStore`], decides whether the stored
//! access token is still usable, renews it through a [`CredentialIssuer`] when it is not, and
//! writes the merged record back. Calls for the same credential are serialized within one
//! process; nothing coordinates separate processes sharing a store.

// self
use crate::{
	_prelude::*,
	auth::{
		AccountId, AccountInfo, AuthId, AuthKind, AuthRecord, HostInfo, TokenSecret, TokenStatus,
	},
	domains::ResolvedDomains,
	error::{ConfigError, SecretError},
	flows::{ClientCredentialsParams, CredentialIssuer, PkceParams, RefreshParams},
	obs::{self, FlowKind, LifecycleMetrics, LifecycleSnapshot},
	store::{CredentialStore, Hydration, StoreError},
};

/// Tokens expiring within this window are renewed before use.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::seconds(60);

/// What a caller needs to call REST endpoints of an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessContext {
	/// REST domain of the account.
	pub rest_domain: String,
	/// System (UI) domain of the account.
	pub system_domain: String,
	/// Bearer token valid for at least the expiry margin.
	pub access_token: TokenSecret,
}

/// Freshness report produced by [`TokenLifecycleManager::inspect_authorization`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationStatus {
	/// Stored expiry, if any.
	pub expires_at: Option<OffsetDateTime>,
	/// `true` when the expiry is missing or not after now.
	pub needs_reauthorization: bool,
}

/// Descriptive metadata of a stored credential.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialInfo {
	/// Account metadata captured at the last authentication.
	pub account_info: Option<AccountInfo>,
	/// Host of the system domain.
	pub host_info: Option<HostInfo>,
}

/// Keeps stored credentials usable.
pub struct TokenLifecycleManager {
	store: Arc<dyn CredentialStore>,
	issuer: Arc<dyn CredentialIssuer>,
	metrics: Arc<LifecycleMetrics>,
	margin: Duration,
	clock: fn() -> OffsetDateTime,
	flow_guards: Arc<Mutex<HashMap<AuthId, Arc<AsyncMutex<()>>>>>,
}
impl TokenLifecycleManager {
	/// Creates a manager over `store` that renews through `issuer`.
	pub fn new(store: Arc<dyn CredentialStore>, issuer: Arc<dyn CredentialIssuer>) -> Self {
		Self {
			store,
			issuer,
			metrics: Default::default(),
			margin: DEFAULT_EXPIRY_MARGIN,
			clock: OffsetDateTime::now_utc,
			flow_guards: Default::default(),
		}
	}

	/// Overrides the renewal margin. Negative values are treated as zero.
	pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
		self.margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Replaces the clock used for expiry decisions and record timestamps.
	pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
		self.clock = clock;

		self
	}

	/// Store backing this manager.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Counter snapshot.
	pub fn metrics(&self) -> LifecycleSnapshot {
		self.metrics.snapshot()
	}

	/// Returns REST and system domains plus an access token that outlives the expiry margin,
	/// renewing and persisting the credential first when needed.
	///
	/// Client-credentials records whose secrets cannot be opened are renewed from their stored
	/// configuration; PKCE records fail with the secret error instead, since renewing them
	/// needs the sealed refresh token.
	pub async fn ensure_valid_access_token(&self, auth_id: &AuthId) -> Result<AccessContext> {
		obs::observe(FlowKind::Lifecycle, "ensure_valid_access_token", async move {
			self.metrics.record_check();

			let result = self.guarded(auth_id, self.ensure_locked(auth_id)).await;

			if result.is_err() {
				self.metrics.record_failure();
			}

			result
		})
		.await
	}

	/// Runs the PKCE login and stores the result as a new record under `auth_id`.
	///
	/// Returns the public view of the stored record.
	pub async fn authenticate_pkce(
		&self,
		auth_id: &AuthId,
		params: PkceParams,
	) -> Result<AuthRecord> {
		let result = self.issuer.authenticate_pkce(params).await?;

		self.store_new(auth_id, AuthRecord::from_result(AuthKind::Pkce, result, (self.clock)()))
			.await
	}

	/// Runs the client-credentials grant and stores the result as a new record under `auth_id`.
	///
	/// Returns the public view of the stored record.
	pub async fn authenticate_ci(
		&self,
		auth_id: &AuthId,
		params: ClientCredentialsParams,
	) -> Result<AuthRecord> {
		let result = self.issuer.authenticate_ci(params).await?;
		let record = AuthRecord::from_result(AuthKind::ClientCredentials, result, (self.clock)());

		self.store_new(auth_id, record).await
	}

	/// Renews the credential regardless of its expiry and returns the public view.
	pub async fn refresh_authorization(&self, auth_id: &AuthId) -> Result<AuthRecord> {
		obs::observe(FlowKind::Lifecycle, "refresh_authorization", async move {
			let renewed = self
				.guarded(auth_id, async {
					let record =
						<dyn CredentialStore>::get_with_secrets(self.store.as_ref(), auth_id)
							.await?
							.ok_or_else(|| not_found(auth_id))?;

					self.renew(auth_id, record).await
				})
				.await;

			match renewed {
				Ok(record) => {
					self.metrics.record_renewal();

					Ok(record.public_view())
				},
				Err(e) => {
					self.metrics.record_failure();

					Err(e)
				},
			}
		})
		.await
	}

	/// Reports whether the stored token has expired. Needs no passkey.
	pub async fn inspect_authorization(&self, auth_id: &AuthId) -> Result<AuthorizationStatus> {
		let record = self.store.get(auth_id).await?.ok_or_else(|| not_found(auth_id))?;
		let expires_at = record.token.expires_at;

		Ok(AuthorizationStatus {
			expires_at,
			needs_reauthorization: record.token.is_expired_at((self.clock)(), Duration::ZERO),
		})
	}

	/// Every stored credential in public form.
	pub async fn list(&self) -> Result<BTreeMap<AuthId, AuthRecord>> {
		Ok(self.store.list().await?)
	}

	/// Account and host metadata of one credential.
	pub async fn info(&self, auth_id: &AuthId) -> Result<CredentialInfo> {
		let record = self.store.get(auth_id).await?.ok_or_else(|| not_found(auth_id))?;

		Ok(CredentialInfo { account_info: record.account_info, host_info: record.host_info })
	}

	/// Moves a credential to a new name.
	pub async fn rename(&self, from: &AuthId, to: &AuthId) -> Result<()> {
		self.guarded(from, self.store.rename(from, to)).await?;
		self.prune_guard(to);

		Ok(())
	}

	/// Deletes a credential; returns `false` when it did not exist.
	pub async fn remove(&self, auth_id: &AuthId) -> Result<bool> {
		Ok(self.guarded(auth_id, self.store.remove(auth_id)).await?)
	}

	/// Resolves the domains of `account_id` without touching the store.
	pub async fn resolve_domains(
		&self,
		account_id: &AccountId,
		domain: Option<&str>,
	) -> Result<ResolvedDomains> {
		self.issuer.resolve_domains(account_id, domain).await
	}

	async fn ensure_locked(&self, auth_id: &AuthId) -> Result<AccessContext> {
		let record = self.load(auth_id).await?;

		if !matches!(record.kind, AuthKind::ClientCredentials | AuthKind::Pkce) {
			return Err(unsupported(auth_id, &record.kind));
		}
		if record.auth_config.is_none() {
			return Err(ConfigError::IncompleteAuthConfig { auth_id: auth_id.to_string() }.into());
		}

		let record = match record.token.status_at((self.clock)(), self.margin) {
			TokenStatus::Fresh => {
				self.metrics.record_reuse();

				record
			},
			status => {
				tracing::debug!(auth_id = %auth_id, ?status, "Renewing stored credential.");

				let record = self.renew(auth_id, record).await?;

				self.metrics.record_renewal();

				record
			},
		};

		access_context(auth_id, record)
	}

	/// Loads a record with its secrets, degrading client-credentials records to their public
	/// form when the secrets cannot be opened.
	async fn load(&self, auth_id: &AuthId) -> Result<AuthRecord> {
		let (record, secret_error) = match self.store.hydrate(auth_id).await {
			Ok(Some(Hydration::Hydrated(record))) => (record, None),
			Ok(Some(Hydration::RequiresPasskey(record))) =>
				(record, Some(SecretError::PasskeyRequired)),
			Ok(None) => return Err(not_found(auth_id)),
			Err(StoreError::Secret(e)) => {
				let record = self.store.get(auth_id).await?.ok_or_else(|| not_found(auth_id))?;

				(record, Some(e))
			},
			Err(e) => return Err(e.into()),
		};

		match secret_error {
			Some(e) if record.kind == AuthKind::Pkce => Err(e.into()),
			Some(e) => {
				tracing::debug!(
					auth_id = %auth_id,
					error = %e,
					"Stored secrets are unavailable; the credential will be reissued."
				);

				Ok(AuthRecord { token: record.token.redacted(), ..record })
			},
			None => Ok(record),
		}
	}

	async fn renew(&self, auth_id: &AuthId, mut record: AuthRecord) -> Result<AuthRecord> {
		let config = record
			.auth_config
			.as_ref()
			.ok_or_else(|| ConfigError::IncompleteAuthConfig { auth_id: auth_id.to_string() })?;
		let result = match &record.kind {
			AuthKind::ClientCredentials => {
				let params = ClientCredentialsParams::from_auth_config(auth_id, config)?;

				self.issuer.authenticate_ci(params).await?
			},
			AuthKind::Pkce => {
				if record.token.refresh_token.as_ref().is_none_or(TokenSecret::is_blank) {
					return Err(ConfigError::MissingRefreshToken.into());
				}

				self.issuer.refresh_with_refresh_token(RefreshParams::from_record(&record)).await?
			},
			kind => return Err(unsupported(auth_id, kind)),
		};

		record.apply(result, (self.clock)());
		self.store.upsert(auth_id, record.clone()).await?;

		Ok(record)
	}

	async fn store_new(&self, auth_id: &AuthId, record: AuthRecord) -> Result<AuthRecord> {
		let public = record.public_view();

		self.guarded(auth_id, self.store.upsert(auth_id, record)).await?;

		tracing::info!(auth_id = %auth_id, kind = %public.kind, "Credential stored.");

		Ok(public)
	}

	/// Runs `fut` while holding the per-credential mutex, then drops the mutex from the map
	/// when no other flow is queued on it.
	async fn guarded<T>(&self, auth_id: &AuthId, fut: impl Future<Output = T>) -> T {
		let guard = self.flow_guard(auth_id);
		let output = {
			let _singleflight = guard.lock().await;

			fut.await
		};

		drop(guard);
		self.prune_guard(auth_id);

		output
	}

	fn flow_guard(&self, auth_id: &AuthId) -> Arc<AsyncMutex<()>> {
		let mut guards = self.flow_guards.lock();

		guards.entry(auth_id.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	// Clones are only handed out under the map lock, so a count of one means no waiter.
	fn prune_guard(&self, auth_id: &AuthId) {
		let mut guards = self.flow_guards.lock();

		if guards.get(auth_id).is_some_and(|guard| Arc::strong_count(guard) == 1) {
			guards.remove(auth_id);
		}
	}
}
impl Debug for TokenLifecycleManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenLifecycleManager")
			.field("margin", &self.margin)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}

fn access_context(auth_id: &AuthId, record: AuthRecord) -> Result<AccessContext> {
	let incomplete =
		|missing| Error::IncompleteRecord { auth_id: auth_id.to_string(), missing };
	let domains = record
		.domains
		.filter(|domains| !domains.rest_domain.is_empty())
		.ok_or_else(|| incomplete("is missing REST domain information"))?;
	let access_token = record
		.token
		.access_token
		.filter(|token| !token.is_blank())
		.ok_or_else(|| incomplete("has no access token available"))?;

	Ok(AccessContext {
		rest_domain: domains.rest_domain,
		system_domain: domains.system_domain,
		access_token,
	})
}

fn not_found(auth_id: &AuthId) -> Error {
	StoreError::NotFound { auth_id: auth_id.to_string() }.into()
}

fn unsupported(auth_id: &AuthId, kind: &AuthKind) -> Error {
	ConfigError::UnsupportedAuthType { auth_id: auth_id.to_string(), kind: kind.to_string() }
		.into()
}

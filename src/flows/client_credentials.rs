//! Client-credentials grant authenticated with a signed JWT assertion.
//!
//! The private key never leaves the machine: the flow signs a short-lived assertion whose
//! audience is the account's token URL and posts it as `client_assertion`. Renewal of these
//! credentials is simply running the flow again from the stored [`AuthConfig`].

// std
use std::{fs, io::ErrorKind};
// self
use crate::{
	_prelude::*,
	assertion::ClientAssertion,
	auth::{AccountId, AuthConfig, AuthId, AuthResult, Scope},
	config,
	error::ConfigError,
	flows::{Authenticator, common},
	http::TokenHttpClient,
	oauth::{BasicFacade, OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind},
	provider,
};

/// Inputs of [`Authenticator::authenticate_ci`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCredentialsParams {
	/// Account to authenticate against.
	pub account_id: AccountId,
	/// Integration client id; falls back to the environment override.
	pub client_id: Option<String>,
	/// Certificate id registered with the integration, sent as the JWT `kid`.
	pub certificate_id: String,
	/// PEM private key; relative paths resolve against the working directory.
	pub private_key_path: PathBuf,
	/// Domain used to seed discovery.
	pub domain: Option<String>,
	/// Requested scope; falls back to the environment override, then the default.
	pub scope: Option<Scope>,
}
impl ClientCredentialsParams {
	/// Creates parameters with the three required inputs.
	pub fn new(
		account_id: AccountId,
		certificate_id: impl Into<String>,
		private_key_path: impl Into<PathBuf>,
	) -> Self {
		Self {
			account_id,
			client_id: None,
			certificate_id: certificate_id.into(),
			private_key_path: private_key_path.into(),
			domain: None,
			scope: None,
		}
	}

	/// Sets the integration client id.
	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Seeds discovery with `domain`.
	pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());

		self
	}

	/// Sets the requested scope.
	pub fn with_scope(mut self, scope: Scope) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Rebuilds the parameters a stored record was created with.
	pub fn from_auth_config(auth_id: &AuthId, config: &AuthConfig) -> Result<Self, ConfigError> {
		let incomplete = || ConfigError::IncompleteAuthConfig { auth_id: auth_id.to_string() };
		let (Some(account_id), Some(certificate_id), Some(private_key_path)) =
			(&config.account_id, &config.certificate_id, &config.private_key_path)
		else {
			return Err(incomplete());
		};

		Ok(Self {
			account_id: account_id.clone(),
			client_id: config.client_id.clone(),
			certificate_id: certificate_id.clone(),
			private_key_path: private_key_path.clone(),
			domain: config.domain.clone(),
			scope: config.scope.clone(),
		})
	}
}

impl<C, M> Authenticator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Performs the `client_credentials` grant with a PS256 client assertion.
	///
	/// Configuration problems (client id, certificate id, key file) are reported before any
	/// network call. The tokeninfo lookup afterwards is best effort.
	pub async fn authenticate_ci(&self, params: ClientCredentialsParams) -> Result<AuthResult> {
		obs::observe(FlowKind::ClientCredentials, "authenticate_ci", async move {
			let client_id = config::non_blank(params.client_id.clone())
				.or_else(|| self.settings.ci_client_id.clone())
				.ok_or(ConfigError::MissingClientId)?;
			let certificate_id = config::non_blank(Some(params.certificate_id.clone()))
				.ok_or(ConfigError::MissingCertificateId)?;
			let private_key_path = std::path::absolute(&params.private_key_path).map_err(|source| {
				ConfigError::PrivateKeyRead { path: params.private_key_path.clone(), source }
			})?;
			let private_key = read_private_key(&private_key_path)?;
			let scope = params
				.scope
				.clone()
				.unwrap_or_else(|| Scope::resolve([self.settings.scope.as_deref()]));
			let resolved = self.resolver.resolve(&params.account_id, params.domain.as_deref()).await?;
			let token_url = provider::endpoint(&resolved.domains.rest_domain, provider::TOKEN_PATH)?;
			let assertion = ClientAssertion::new(token_url.as_str(), &client_id, &certificate_id)
				.scope(scope.normalized());
			let jwt = self.signer.sign(&assertion, &private_key)?;
			let facade: BasicFacade<C, M> = BasicFacade::new(
				&token_url,
				&client_id,
				Arc::clone(&self.http_client),
				Arc::clone(&self.transport_mapper),
			)?;
			let grant = facade.exchange_client_credentials(self.strategy.as_ref(), &jwt).await?;
			let token = common::token_from_grant(grant, OffsetDateTime::now_utc(), None);
			let info = match &token.access_token {
				Some(access_token) =>
					common::fetch_token_info(
						self.http_client.as_ref(),
						self.transport_mapper.as_ref(),
						&resolved.domains.rest_domain,
						access_token,
					)
					.await,
				None => None,
			};
			let account_info =
				common::account_info(&params.account_id, info.as_ref(), common::CI_ROLE_FALLBACK);

			tracing::debug!(host = %resolved.host_info.host_name, "Client credentials issued.");

			Ok(AuthResult {
				account_info,
				host_info: resolved.host_info,
				domains: resolved.domains,
				token,
				auth_config: AuthConfig {
					account_id: Some(params.account_id),
					client_id: Some(client_id),
					certificate_id: Some(certificate_id),
					private_key_path: Some(private_key_path),
					domain: params.domain,
					scope: Some(scope),
				},
			})
		})
		.await
	}
}

fn read_private_key(path: &Path) -> Result<Vec<u8>, ConfigError> {
	fs::read(path).map_err(|source| match source.kind() {
		ErrorKind::NotFound => ConfigError::PrivateKeyNotFound { path: path.to_owned() },
		_ => ConfigError::PrivateKeyRead { path: path.to_owned(), source },
	})
}

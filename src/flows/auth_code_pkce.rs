//! Interactive authorization-code login with PKCE over a loopback redirect.

pub mod browser;
pub mod callback;
pub mod session;

pub use browser::*;
pub use callback::*;
pub use session::*;

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::{AuthConfig, AuthResult, Scope},
	config::{self, SdkSettings},
	flows::{Authenticator, common},
	http::TokenHttpClient,
	oauth::{BasicFacade, OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind},
	provider,
};

/// Inputs of [`Authenticator::authenticate_pkce`]. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PkceParams {
	/// Login domain; defaults to the generic production host.
	pub domain: Option<String>,
	/// Integration client id; see [`Authenticator::authenticate_pkce`] for the fallbacks.
	pub client_id: Option<String>,
	/// Project directory holding `suitecloud-sdk-settings.json`.
	pub sdk_path: Option<PathBuf>,
	/// Requested scope; defaults to `rest_webservices`.
	pub scope: Option<Scope>,
	/// How long to wait for the browser redirect.
	pub timeout: Option<StdDuration>,
}
impl PkceParams {
	/// Sets the login domain.
	pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());

		self
	}

	/// Sets the integration client id.
	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the project directory consulted for the SDK settings file.
	pub fn with_sdk_path(mut self, sdk_path: impl Into<PathBuf>) -> Self {
		self.sdk_path = Some(sdk_path.into());

		self
	}

	/// Sets the requested scope.
	pub fn with_scope(mut self, scope: Scope) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Sets the redirect wait.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}
}

impl<C, M> Authenticator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Runs the browser login end to end.
	///
	/// The client id comes from the parameters, then the environment override, then the SDK
	/// settings file under `sdk_path`, then the built-in client for the login domain. The
	/// loopback listener is closed on every exit path.
	pub async fn authenticate_pkce(&self, params: PkceParams) -> Result<AuthResult> {
		obs::observe(FlowKind::AuthorizationCode, "authenticate_pkce", async move {
			let base_domain = provider::base_domain(params.domain.as_deref())?;
			let client_id = self.integration_client_id(&params, &base_domain)?;
			let session = PkceSession::generate();
			let mut server =
				LoopbackCallbackServer::start(self.callback_ports.clone(), session.state()).await?;
			let result =
				self.complete_pkce(&params, &base_domain, client_id, &session, &mut server).await;

			server.close().await;

			result
		})
		.await
	}

	async fn complete_pkce(
		&self,
		params: &PkceParams,
		base_domain: &str,
		client_id: String,
		session: &PkceSession,
		server: &mut LoopbackCallbackServer,
	) -> Result<AuthResult> {
		let scope = params.scope.clone().unwrap_or_default();
		let timeout = params.timeout.filter(|t| !t.is_zero()).unwrap_or(self.default_timeout);
		let redirect_uri = server.redirect_uri().clone();
		let authorize_url = session.authorize_url(base_domain, &client_id, &redirect_uri, &scope)?;

		self.browser.open(&authorize_url)?;

		tracing::info!(port = server.port(), "Waiting for the browser authorization.");

		let callback = server.wait_for_callback(timeout).await?;
		let authorized = session.validate_callback(&callback)?;
		let resolved = self.resolver.resolve(&authorized.account_id, params.domain.as_deref()).await?;
		let token_url = provider::endpoint(&resolved.domains.rest_domain, provider::TOKEN_PATH)?;
		let facade: BasicFacade<C, M> = BasicFacade::new(
			&token_url,
			&client_id,
			Arc::clone(&self.http_client),
			Arc::clone(&self.transport_mapper),
		)?;
		let grant = facade
			.exchange_authorization_code(
				self.strategy.as_ref(),
				&authorized.code,
				session.verifier(),
				&redirect_uri,
			)
			.await?;
		let token = common::token_from_grant(grant, OffsetDateTime::now_utc(), Some(scope.clone()));
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

		Ok(AuthResult {
			account_info: common::account_info(
				&authorized.account_id,
				info.as_ref(),
				common::PKCE_ROLE_FALLBACK,
			),
			host_info: resolved.host_info,
			domains: resolved.domains,
			token,
			auth_config: AuthConfig {
				account_id: Some(authorized.account_id),
				client_id: Some(client_id),
				domain: params.domain.clone(),
				scope: Some(scope),
				..Default::default()
			},
		})
	}

	fn integration_client_id(&self, params: &PkceParams, base_domain: &str) -> Result<String> {
		if let Some(client_id) = config::non_blank(params.client_id.clone()) {
			return Ok(client_id);
		}
		if let Some(client_id) = self.settings.integration_client_id.clone() {
			return Ok(client_id);
		}
		if let Some(client_id) = match &params.sdk_path {
			Some(sdk_path) => SdkSettings::load(sdk_path)?.integration_client_id(),
			None => None,
		} {
			return Ok(client_id);
		}

		Ok(provider::default_integration_client_id(base_domain).to_owned())
	}
}

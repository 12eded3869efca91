//! Refresh-token renewal for credentials created by the PKCE login.
//!
//! Cached domains are reused when both the REST and system domains are known, so a renewal
//! normally costs one token call plus the best-effort tokeninfo lookup.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, AuthConfig, AuthRecord, AuthResult, Domains, Scope, TokenSecret},
	config,
	domains::ResolvedDomains,
	error::ConfigError,
	flows::{Authenticator, common},
	http::TokenHttpClient,
	oauth::{BasicFacade, OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind},
	provider,
};

/// Inputs of [`Authenticator::refresh_with_refresh_token`].
///
/// Every field is optional at construction so validation can name exactly what is missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RefreshParams {
	/// Account the credential belongs to.
	pub account_id: Option<AccountId>,
	/// Integration client id the refresh token was issued to.
	pub client_id: Option<String>,
	/// Refresh token to redeem.
	pub refresh_token: Option<TokenSecret>,
	/// Scope recorded on the renewed token when the response omits one.
	pub scope: Option<Scope>,
	/// Cached domains; discovery runs when they are incomplete.
	pub domains: Option<Domains>,
	/// Domain used to seed discovery.
	pub domain: Option<String>,
}
impl RefreshParams {
	/// Creates parameters with the three required inputs.
	pub fn new(
		account_id: AccountId,
		client_id: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Self {
		Self {
			account_id: Some(account_id),
			client_id: Some(client_id.into()),
			refresh_token: Some(TokenSecret::new(refresh_token)),
			..Default::default()
		}
	}

	/// Sets the scope fallback.
	pub fn with_scope(mut self, scope: Scope) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Supplies cached domains.
	pub fn with_domains(mut self, domains: Domains) -> Self {
		self.domains = Some(domains);

		self
	}

	/// Seeds discovery with `domain`.
	pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
		self.domain = Some(domain.into());

		self
	}

	/// Parameters for renewing a hydrated record.
	pub(crate) fn from_record(record: &AuthRecord) -> Self {
		let config = record.auth_config.clone().unwrap_or_default();

		Self {
			account_id: config.account_id,
			client_id: config.client_id,
			refresh_token: record.token.refresh_token.clone(),
			scope: config.scope,
			domains: record.domains.clone(),
			domain: config.domain,
		}
	}
}

impl<C, M> Authenticator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Redeems a refresh token for a new access token.
	///
	/// When the response carries no refresh token the one that was redeemed is kept.
	pub async fn refresh_with_refresh_token(&self, params: RefreshParams) -> Result<AuthResult> {
		obs::observe(FlowKind::Refresh, "refresh_with_refresh_token", async move {
			let account_id = params.account_id.ok_or(ConfigError::MissingAccountId)?;
			let client_id =
				config::non_blank(params.client_id).ok_or(ConfigError::MissingRefreshClientId)?;
			let refresh_token = params
				.refresh_token
				.map(|secret| secret.expose().trim().to_owned())
				.filter(|secret| !secret.is_empty())
				.map(TokenSecret::new)
				.ok_or(ConfigError::MissingRefreshToken)?;
			let resolved = match params.domains.filter(Domains::is_complete) {
				Some(domains) => ResolvedDomains::from_domains(normalize_domains(domains)?),
				None => self.resolver.resolve(&account_id, params.domain.as_deref()).await?,
			};
			let token_url = provider::endpoint(&resolved.domains.rest_domain, provider::TOKEN_PATH)?;
			let facade: BasicFacade<C, M> = BasicFacade::new(
				&token_url,
				&client_id,
				Arc::clone(&self.http_client),
				Arc::clone(&self.transport_mapper),
			)?;
			let mut grant = facade.refresh_token(self.strategy.as_ref(), &refresh_token).await?;

			if grant.refresh_token.is_none() {
				grant.refresh_token = Some(refresh_token);
			}

			let scope = params.scope.unwrap_or_default();
			let token =
				common::token_from_grant(grant, OffsetDateTime::now_utc(), Some(scope.clone()));
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

			tracing::debug!(account = %account_id, "Refresh token redeemed.");

			Ok(AuthResult {
				account_info: common::account_info(
					&account_id,
					info.as_ref(),
					common::PKCE_ROLE_FALLBACK,
				),
				host_info: resolved.host_info,
				domains: resolved.domains,
				token,
				auth_config: AuthConfig {
					account_id: Some(account_id),
					client_id: Some(client_id),
					domain: params.domain,
					scope: Some(scope),
					..Default::default()
				},
			})
		})
		.await
	}
}

fn normalize_domains(domains: Domains) -> Result<Domains, ConfigError> {
	let normalize = |value: String| -> Result<String, ConfigError> {
		Ok(provider::normalize_domain(&value)?.unwrap_or(value))
	};

	Ok(Domains {
		rest_domain: normalize(domains.rest_domain)?,
		system_domain: normalize(domains.system_domain)?,
		webservices_domain: domains.webservices_domain.map(normalize).transpose()?,
	})
}

//! Credential issuance against NetSuite: client credentials, browser PKCE logins, and
//! refresh-token renewal.

pub mod auth_code_pkce;
pub mod refresh;

mod client_credentials;
mod common;

pub use auth_code_pkce::*;
pub use client_credentials::*;
pub use refresh::*;

// std
use std::{ops::RangeInclusive, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	assertion::JwtAssertionSigner,
	auth::{AccountId, AuthResult},
	config::Settings,
	domains::{DomainResolver, ResolvedDomains},
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{ReqwestTransportErrorMapper, TransportErrorMapper},
	provider::{NetSuiteStrategy, ProviderStrategy},
};

/// Interactive login wait used when the caller does not pass one.
pub const DEFAULT_PKCE_TIMEOUT: StdDuration = StdDuration::from_secs(300);

/// Boxed future returned by [`CredentialIssuer`] methods.
pub type IssuerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Everything the lifecycle manager needs from an issuer.
///
/// [`Authenticator`] is the production implementation; tests substitute counting fakes.
pub trait CredentialIssuer
where
	Self: Send + Sync,
{
	/// Runs the client-credentials grant.
	fn authenticate_ci(&self, params: ClientCredentialsParams) -> IssuerFuture<'_, AuthResult>;

	/// Runs the interactive authorization-code + PKCE login.
	fn authenticate_pkce(&self, params: PkceParams) -> IssuerFuture<'_, AuthResult>;

	/// Renews a PKCE credential with its refresh token.
	fn refresh_with_refresh_token(&self, params: RefreshParams) -> IssuerFuture<'_, AuthResult>;

	/// Resolves the domains of `account_id`, optionally seeding discovery with `domain`.
	fn resolve_domains<'a>(
		&'a self,
		account_id: &'a AccountId,
		domain: Option<&'a str>,
	) -> IssuerFuture<'a, ResolvedDomains>;
}

/// Issues NetSuite credentials over a shared HTTP transport.
///
/// The authenticator owns the transport, the error mapper, the provider strategy, and the
/// environment snapshot so each grant implementation only handles its own request shape.
pub struct Authenticator<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Strategy classifying token endpoint failures.
	pub strategy: Arc<dyn ProviderStrategy>,
	/// Environment snapshot (client id, scope, SDK home overrides).
	pub settings: Arc<Settings>,
	resolver: DomainResolver<C, M>,
	browser: Arc<dyn BrowserLauncher>,
	signer: JwtAssertionSigner,
	callback_ports: RangeInclusive<u16>,
	default_timeout: StdDuration,
}
impl<C, M> Authenticator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an authenticator that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		settings: Settings,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let http_client = http_client.into();
		let transport_mapper = mapper.into();

		Self {
			resolver: DomainResolver::new(Arc::clone(&http_client), Arc::clone(&transport_mapper)),
			http_client,
			transport_mapper,
			strategy: Arc::new(NetSuiteStrategy),
			settings: Arc::new(settings),
			browser: Arc::new(SystemBrowser),
			signer: JwtAssertionSigner,
			callback_ports: DEFAULT_CALLBACK_PORTS,
			default_timeout: DEFAULT_PKCE_TIMEOUT,
		}
	}

	/// Replaces the browser side effect of the PKCE login.
	pub fn with_browser_launcher(mut self, browser: impl 'static + BrowserLauncher) -> Self {
		self.browser = Arc::new(browser);

		self
	}

	/// Overrides the loopback ports tried by the PKCE login.
	pub fn with_callback_ports(mut self, ports: RangeInclusive<u16>) -> Self {
		self.callback_ports = ports;

		self
	}

	/// Overrides the PKCE wait used when [`PkceParams::timeout`] is unset.
	pub fn with_default_timeout(mut self, timeout: StdDuration) -> Self {
		self.default_timeout = timeout;

		self
	}

	/// Replaces the token error classification strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Domain resolver sharing this authenticator's transport.
	pub fn resolver(&self) -> &DomainResolver<C, M> {
		&self.resolver
	}
}
impl Authenticator<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an authenticator with the shared reqwest client described by `settings`
	/// (timeout, redirects, proxy, HTTP tracing).
	pub fn new(settings: Settings) -> Result<Self> {
		let http_client = ReqwestHttpClient::from_settings(&settings)?;

		Ok(Self::with_http_client(settings, http_client, ReqwestTransportErrorMapper))
	}
}
impl<C, M> CredentialIssuer for Authenticator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn authenticate_ci(&self, params: ClientCredentialsParams) -> IssuerFuture<'_, AuthResult> {
		Box::pin(Authenticator::authenticate_ci(self, params))
	}

	fn authenticate_pkce(&self, params: PkceParams) -> IssuerFuture<'_, AuthResult> {
		Box::pin(Authenticator::authenticate_pkce(self, params))
	}

	fn refresh_with_refresh_token(&self, params: RefreshParams) -> IssuerFuture<'_, AuthResult> {
		Box::pin(Authenticator::refresh_with_refresh_token(self, params))
	}

	fn resolve_domains<'a>(
		&'a self,
		account_id: &'a AccountId,
		domain: Option<&'a str>,
	) -> IssuerFuture<'a, ResolvedDomains> {
		Box::pin(self.resolver.resolve(account_id, domain))
	}
}
impl<C, M> Debug for Authenticator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Authenticator")
			.field("settings", &self.settings)
			.field("callback_ports", &self.callback_ports)
			.field("default_timeout", &self.default_timeout)
			.finish_non_exhaustive()
	}
}

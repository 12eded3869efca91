//! Token endpoint facade over the `oauth2` crate.
//!
//! Every grant in this crate is a form POST to `{restDomain}/services/rest/auth/oauth2/v1/token`
//! with the client id in the body. The facade owns one configured client per token URL and maps
//! `oauth2` failures into [`Error`] through a [`ProviderStrategy`] and a [`TransportErrorMapper`].

pub use oauth2;

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AccessToken, AsyncHttpClient, AuthType, AuthorizationCode, Client, ClientId, EndpointNotSet,
	EndpointSet, HttpClientError, HttpRequest, HttpResponse, PkceCodeVerifier, RedirectUrl,
	RefreshToken, RequestTokenError, StandardRevocableToken, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
	},
	http::StatusCode,
};
use serde::{Deserializer, de};
// self
use crate::{
	_prelude::*,
	auth::{Scope, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	provider::{
		GrantType, JWT_BEARER_ASSERTION_TYPE, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
};

const TOKEN_ENDPOINT: &str = "Token endpoint";

type PlatformClient = Client<
	BasicErrorResponse,
	PlatformTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;
type PlatformRequestError<E> = RequestTokenError<HttpClientError<E>, BasicErrorResponse>;

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] raised while calling `endpoint`.
	fn map_transport_error(
		&self,
		endpoint: &'static str,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: &'static str,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() => ConfigError::from(*inner).into(),
			HttpClientError::Reqwest(inner) if inner.is_timeout() => TransientError::Upstream {
				endpoint,
				message: "request timed out.".into(),
				status: meta_status(meta).or_else(|| inner.status().map(|code| code.as_u16())),
				retry_after: meta_retry_after(meta),
			}
			.into(),
			HttpClientError::Reqwest(inner) => TransportError::network(endpoint, *inner).into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransientError::Upstream {
				endpoint,
				message: format!("HTTP client error: {message}."),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
			_ => TransientError::Upstream {
				endpoint,
				message: "unknown HTTP client error.".into(),
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
		}
	}
}

/// Successful token endpoint answer, normalized for the flows.
#[derive(Clone, Debug)]
pub(crate) struct TokenGrant {
	pub(crate) access_token: TokenSecret,
	pub(crate) refresh_token: Option<TokenSecret>,
	pub(crate) expires_in: Option<Duration>,
	pub(crate) token_type: Option<String>,
	pub(crate) scope: Option<Scope>,
}

pub(crate) trait OAuth2Facade {
	fn exchange_client_credentials<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		assertion: &'a str,
	) -> FacadeFuture<'a, TokenGrant>;

	fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		code: &'a str,
		pkce_verifier: &'a str,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, TokenGrant>;

	fn refresh_token<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		refresh_token: &'a TokenSecret,
	) -> FacadeFuture<'a, TokenGrant>;
}

/// [`OAuth2Facade`] bound to one token URL and client id.
pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: PlatformClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		token_url: &Url,
		client_id: &str,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(token_url.to_string())
			.map_err(|e| ConfigError::invalid_url(token_url.as_str(), e))?;
		let oauth_client = Client::new(ClientId::new(client_id.to_owned()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self { oauth_client, http_client, error_mapper })
	}

	fn map_error(
		&self,
		strategy: &dyn ProviderStrategy,
		grant: GrantType,
		meta: Option<ResponseMetadata>,
		err: PlatformRequestError<C::TransportError>,
	) -> Error {
		let meta = meta.as_ref();

		match err {
			RequestTokenError::ServerResponse(response) =>
				map_server_response(strategy, grant, response, meta),
			RequestTokenError::Request(error) =>
				self.error_mapper.map_transport_error(TOKEN_ENDPOINT, meta, error),
			RequestTokenError::Parse(error, body) =>
				map_parse_error(strategy, grant, meta, error, &body),
			RequestTokenError::Other(message) => match meta_status(meta) {
				// `oauth2` only raises these on a success status for an empty or non-JSON body.
				Some(status) if (200..300).contains(&status) => {
					tracing::debug!(status, %message, "Token endpoint sent no usable body.");

					Error::MissingAccessToken { grant: grant.as_str() }
				},
				Some(status) => classified(
					strategy.classify_token_error(
						&ProviderErrorContext::new(grant).with_http_status(status),
					),
					format!("{TOKEN_ENDPOINT} returned HTTP {status}: {message}."),
					meta,
				),
				status => TransientError::Upstream {
					endpoint: TOKEN_ENDPOINT,
					message: message.to_string(),
					status,
					retry_after: meta_retry_after(meta),
				}
				.into(),
			},
		}
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_client_credentials<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		assertion: &'a str,
	) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = AnySuccess(self.http_client.with_metadata(meta.clone()));
			let response = self
				.oauth_client
				.exchange_client_credentials()
				.add_extra_param("client_assertion_type", JWT_BEARER_ASSERTION_TYPE)
				.add_extra_param("client_assertion", assertion)
				.request_async(&instrumented)
				.await
				.map_err(|e| self.map_error(strategy, GrantType::ClientCredentials, meta.take(), e))?;

			into_grant(GrantType::ClientCredentials, response)
		})
	}

	fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		code: &'a str,
		pkce_verifier: &'a str,
		redirect_uri: &'a Url,
	) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = AnySuccess(self.http_client.with_metadata(meta.clone()));
			let redirect_url = RedirectUrl::new(redirect_uri.to_string())
				.map_err(|e| ConfigError::invalid_url(redirect_uri.as_str(), e))?;
			let response = self
				.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_owned()))
				.set_redirect_uri(Cow::Owned(redirect_url))
				.request_async(&instrumented)
				.await
				.map_err(|e| self.map_error(strategy, GrantType::AuthorizationCode, meta.take(), e))?;

			into_grant(GrantType::AuthorizationCode, response)
		})
	}

	fn refresh_token<'a>(
		&'a self,
		strategy: &'a dyn ProviderStrategy,
		refresh_token: &'a TokenSecret,
	) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = AnySuccess(self.http_client.with_metadata(meta.clone()));
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let response = self
				.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&instrumented)
				.await
				.map_err(|e| self.map_error(strategy, GrantType::RefreshToken, meta.take(), e))?;

			into_grant(GrantType::RefreshToken, response)
		})
	}
}

/// Handle that reports every 2xx token response as `200 OK`.
///
/// `oauth2` only parses a token body out of a `200`; the platform contract is any 2xx. The
/// metadata slot still records the real status.
struct AnySuccess<H>(H);
impl<'c, H> AsyncHttpClient<'c> for AnySuccess<H>
where
	H: AsyncHttpClient<'c>,
	H::Future: Send + 'c,
{
	type Error = H::Error;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let pending: Self::Future = Box::pin(self.0.call(request));

		Box::pin(async move {
			let mut response = pending.await?;

			if response.status().is_success() {
				*response.status_mut() = StatusCode::OK;
			}

			Ok(response)
		})
	}
}

/// Token type label exactly as the endpoint sent it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct PlatformTokenType(String);
impl oauth2::TokenType for PlatformTokenType {}

/// Token endpoint body.
///
/// NetSuite sends `expires_in` as a number or a numeric string and the scope as a
/// space-separated string.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct PlatformTokenResponse {
	access_token: AccessToken,
	#[serde(default)]
	token_type: PlatformTokenType,
	#[serde(default, deserialize_with = "deserialize_expires_in")]
	expires_in: Option<u64>,
	#[serde(default)]
	refresh_token: Option<RefreshToken>,
	#[serde(rename = "scope", default, deserialize_with = "deserialize_scopes")]
	scopes: Option<Vec<oauth2::Scope>>,
}
impl TokenResponse for PlatformTokenResponse {
	type TokenType = PlatformTokenType;

	fn access_token(&self) -> &AccessToken {
		&self.access_token
	}

	fn token_type(&self) -> &Self::TokenType {
		&self.token_type
	}

	fn expires_in(&self) -> Option<std::time::Duration> {
		self.expires_in.map(std::time::Duration::from_secs)
	}

	fn refresh_token(&self) -> Option<&RefreshToken> {
		self.refresh_token.as_ref()
	}

	fn scopes(&self) -> Option<&Vec<oauth2::Scope>> {
		self.scopes.as_ref()
	}
}

fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Number(f64),
		Text(String),
	}

	Ok(match Option::<Raw>::deserialize(deserializer)? {
		Some(Raw::Number(value)) if value.is_finite() && value > 0.0 => Some(value as u64),
		Some(Raw::Text(text)) => match text.trim() {
			"" => None,
			trimmed => Some(
				trimmed
					.parse::<u64>()
					.map_err(|_| de::Error::custom(format!("invalid expires_in `{trimmed}`")))?,
			),
		},
		_ => None,
	})
}

fn deserialize_scopes<'de, D>(deserializer: D) -> Result<Option<Vec<oauth2::Scope>>, D::Error>
where
	D: Deserializer<'de>,
{
	let scopes = Option::<String>::deserialize(deserializer)?
		.map(|raw| raw.split_whitespace().map(|scope| oauth2::Scope::new(scope.to_owned())).collect())
		.filter(|scopes: &Vec<oauth2::Scope>| !scopes.is_empty());

	Ok(scopes)
}

fn into_grant(grant: GrantType, response: PlatformTokenResponse) -> Result<TokenGrant> {
	let access_token = TokenSecret::new(response.access_token().secret().to_owned());

	if access_token.is_blank() {
		return Err(Error::MissingAccessToken { grant: grant.as_str() });
	}

	let expires_in = response
		.expires_in
		.filter(|secs| *secs > 0)
		.map(|secs| Duration::seconds(secs.min(u64::from(u32::MAX)) as i64));
	let token_type =
		Some(response.token_type().0.trim().to_owned()).filter(|value| !value.is_empty());
	let scope = response.scopes().and_then(|scopes| {
		let joined = scopes.iter().map(|scope| scope.as_str()).collect::<Vec<_>>().join(" ");

		Scope::parse(&joined).ok()
	});
	let refresh_token = response
		.refresh_token()
		.map(|token| TokenSecret::new(token.secret().to_owned()))
		.filter(|token| !token.is_blank());

	Ok(TokenGrant { access_token, refresh_token, expires_in, token_type, scope })
}

fn map_server_response(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let code = response.error().as_ref().to_owned();
	let description = response.error_description().cloned().unwrap_or_else(|| code.clone());
	let mut ctx = ProviderErrorContext::new(grant)
		.with_oauth_error(code.clone())
		.with_error_description(description.clone());

	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	classified(
		strategy.classify_token_error(&ctx),
		format!("{TOKEN_ENDPOINT} returned an OAuth error ({code}): {description}."),
		meta,
	)
}

fn map_parse_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<&ResponseMetadata>,
	error: serde_path_to_error::Error<serde_json::Error>,
	body: &[u8],
) -> Error {
	let status = meta_status(meta);
	let succeeded = status.is_none_or(|code| (200..300).contains(&code));

	if succeeded && lacks_access_token(body) {
		return Error::MissingAccessToken { grant: grant.as_str() };
	}
	if !succeeded {
		let preview = String::from_utf8_lossy(body);
		let ctx = ProviderErrorContext::new(grant)
			.with_body_preview(preview.trim())
			.with_http_status(status.unwrap_or_default());

		return classified(
			strategy.classify_token_error(&ctx),
			format!(
				"{TOKEN_ENDPOINT} returned HTTP {}: {}",
				status.unwrap_or_default(),
				ctx.body_preview.as_deref().unwrap_or_default()
			),
			meta,
		);
	}

	TransientError::TokenResponseParse { source: error, status }.into()
}

fn lacks_access_token(body: &[u8]) -> bool {
	match serde_json::from_slice::<serde_json::Value>(body) {
		Ok(serde_json::Value::Object(map)) => !matches!(
			map.get("access_token"),
			Some(serde_json::Value::String(token)) if !token.trim().is_empty()
		),
		_ => false,
	}
}

fn classified(kind: ProviderErrorKind, message: String, meta: Option<&ResponseMetadata>) -> Error {
	match kind {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		ProviderErrorKind::InvalidClient => Error::InvalidClient { reason: message },
		ProviderErrorKind::InsufficientScope => Error::InsufficientScope { reason: message },
		ProviderErrorKind::Transient => TransientError::Upstream {
			endpoint: TOKEN_ENDPOINT,
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

//! Crate-level error types shared across flows, stores, and the lifecycle manager.

// self
use crate::{_prelude::*, store::StoreError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(#[source] StoreError),
	/// Local configuration problem; fix the environment or arguments and retry.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Stored secrets cannot be read or written with the configured passkey.
	#[error(transparent)]
	Secret(#[from] SecretError),
	/// Datacenter discovery failed.
	#[error(transparent)]
	Discovery(#[from] DiscoveryError),
	/// Local callback server failure.
	#[error(transparent)]
	Callback(#[from] CallbackError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Client assertion could not be signed.
	#[error("Unable to sign the client assertion with the configured private key.")]
	Signing {
		/// Underlying JWT encoder failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// The interactive authorization did not complete in time.
	#[error(
		"OAuth authorization timed out after {seconds}s. Retry \"suitecloud account:setup\"."
	)]
	Timeout {
		/// Elapsed wait, rounded up to whole seconds.
		seconds: u64,
	},
	/// The authorization server redirected back with an `error` parameter.
	#[error("OAuth authorization failed ({code}): {description}")]
	Authorization {
		/// OAuth error code.
		code: String,
		/// Human readable description, or the code when none was sent.
		description: String,
	},
	/// The callback `state` does not match the one sent with the authorize request.
	#[error("OAuth authorization callback state mismatch. Retry \"suitecloud account:setup\".")]
	StateMismatch,
	/// The callback omitted a required parameter.
	#[error("OAuth authorization callback did not provide {description}.")]
	MissingCallbackParameter {
		/// Description of the missing parameter.
		description: &'static str,
	},
	/// The token endpoint answered successfully without an access token.
	#[error("OAuth {grant} response is missing access_token.")]
	MissingAccessToken {
		/// Grant label.
		grant: &'static str,
	},
	/// Requested scopes exceed what was granted.
	#[error("Token lacks the required scopes: {reason}")]
	InsufficientScope {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// The token endpoint rejected the grant (bad code, expired refresh token).
	#[error("Provider rejected the grant: {reason}")]
	InvalidGrant {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// A stored record is missing data required to use it.
	#[error("Authentication ID \"{auth_id}\" {missing}.")]
	IncompleteRecord {
		/// Credential name.
		auth_id: String,
		/// What is missing, phrased as a predicate.
		missing: &'static str,
	},
}
impl From<StoreError> for Error {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::Secret(inner) => Self::Secret(inner),
			other => Self::Storage(other),
		}
	}
}

/// Configuration and validation failures; none of them are retried.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured or discovered URL cannot be parsed.
	#[error("Invalid URL `{value}`.")]
	InvalidUrl {
		/// Offending input.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Scope validation failed.
	#[error(transparent)]
	InvalidScope(#[from] crate::auth::ScopeError),

	/// No client id was supplied for the client-credentials flow.
	#[error(
		"Missing OAuth2 client ID for client_credentials. Provide --clientid or set SUITECLOUD_CLIENT_ID."
	)]
	MissingClientId,
	/// No certificate id was supplied for the client-credentials flow.
	#[error("Missing certificate ID for client_credentials. Provide --certificateid.")]
	MissingCertificateId,
	/// The configured private key file does not exist.
	#[error("Private key file not found: {}", path.display())]
	PrivateKeyNotFound {
		/// Absolute path that was checked.
		path: PathBuf,
	},
	/// The private key file exists but cannot be read.
	#[error("Unable to read private key file {}.", path.display())]
	PrivateKeyRead {
		/// Absolute path that was read.
		path: PathBuf,
		/// Underlying I/O failure.
		#[source]
		source: std::io::Error,
	},
	/// A refresh was requested without an account id.
	#[error("Missing accountId for PKCE token refresh.")]
	MissingAccountId,
	/// A refresh was requested without a client id.
	#[error("Missing clientId for PKCE token refresh.")]
	MissingRefreshClientId,
	/// A refresh was requested without a refresh token.
	#[error(
		"Missing refresh token for PKCE reauthorization. Re-run \"suitecloud account:setup\"."
	)]
	MissingRefreshToken,
	/// The stored record type cannot be renewed.
	#[error("Authentication ID \"{auth_id}\" has unsupported auth type \"{kind}\".")]
	UnsupportedAuthType {
		/// Credential name.
		auth_id: String,
		/// Stored type label.
		kind: String,
	},
	/// The stored record has no auth configuration to repeat the flow with.
	#[error("Authentication ID \"{auth_id}\" has incomplete authentication configuration.")]
	IncompleteAuthConfig {
		/// Credential name.
		auth_id: String,
	},
	/// The SDK settings file exists but is not valid JSON.
	#[error("Invalid SDK settings file \"{}\": {message}", path.display())]
	InvalidSdkSettings {
		/// Settings file path.
		path: PathBuf,
		/// Parser message.
		message: String,
	},
	/// The SDK home directory cannot be determined.
	#[error("Unable to determine the SuiteCloud SDK home directory. Set SUITECLOUD_SDK_HOME.")]
	SdkHomeUnavailable,
	/// The browser could not be launched.
	#[error("Unable to launch browser for OAuth authorization ({command}): {source}")]
	BrowserLaunch {
		/// Launcher program.
		command: &'static str,
		/// Spawn failure.
		#[source]
		source: std::io::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a URL parsing failure together with its input.
	pub fn invalid_url(value: impl Into<String>, source: url::ParseError) -> Self {
		Self::InvalidUrl { value: value.into(), source }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures while sealing or opening stored secrets.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SecretError {
	/// An encrypted secret was found but no passkey is configured.
	#[error(
		"Credentials for authId require a passkey. Set SUITECLOUD_CI_PASSKEY or SUITECLOUD_FALLBACK_PASSKEY."
	)]
	PasskeyRequired,
	/// Ciphertext is malformed or the passkey is wrong.
	#[error("Unable to decrypt stored credentials; the passkey may be wrong.")]
	Decrypt,
	/// The cipher refused to seal the secret.
	#[error("Unable to encrypt credentials for storage.")]
	Encrypt,
}

/// Datacenter discovery failures.
#[derive(Debug, ThisError)]
pub enum DiscoveryError {
	/// The discovery endpoint answered with a non-success status.
	#[error("Failed to resolve datacenter domains (status={status}){}.", body_suffix(.body))]
	Status {
		/// HTTP status code.
		status: u16,
		/// Truncated response body, empty when none was sent.
		body: String,
	},
	/// The discovery body did not name the REST and system domains.
	#[error("Unexpected datacenterurls response.")]
	UnexpectedResponse,
}

fn body_suffix(body: &str) -> String {
	if body.is_empty() {
		return String::new();
	}

	format!(": {body}")
}

/// Local loopback callback server failures.
#[derive(Debug, ThisError)]
pub enum CallbackError {
	/// Binding failed for a reason other than the port being taken.
	#[error("Unable to start local OAuth callback server on port {port}.")]
	Bind {
		/// Port that failed.
		port: u16,
		/// Underlying socket failure.
		#[source]
		source: std::io::Error,
	},
	/// Every candidate port is in use.
	#[error("Unable to start local OAuth callback server on ports {first}-{last} (all in use).")]
	PortsExhausted {
		/// First candidate port.
		first: u16,
		/// Last candidate port.
		last: u16,
	},
	/// The server stopped before delivering a callback.
	#[error("Local OAuth callback server closed before receiving a callback.")]
	Closed,
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Upstream returned an unexpected but non-fatal response.
	#[error("{endpoint} returned an unexpected response: {message}")]
	Upstream {
		/// Endpoint label.
		endpoint: &'static str,
		/// Message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during an HTTP exchange.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(endpoint: &'static str, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

//! NetSuite platform facts (endpoints, built-in clients) and the error classification strategy.
//!
//! Endpoint paths are fixed strings appended to a resolved base domain. Domains are carried as
//! normalized `scheme://host[:port]` strings without a trailing slash, which is also the form
//! persisted in credential records.

pub mod strategy;

pub use strategy::*;

// std
use std::sync::LazyLock;
// crates.io
use regex::Regex;
// self
use crate::{_prelude::*, error::ConfigError};

/// Production login host used when no domain override is supplied.
pub const GENERIC_DOMAIN: &str = "https://system.netsuite.com";
/// Datacenter discovery path, relative to the base domain.
pub const DATACENTER_URLS_PATH: &str = "/rest/datacenterurls";
/// OAuth 2.0 token endpoint path, relative to the REST domain.
pub const TOKEN_PATH: &str = "/services/rest/auth/oauth2/v1/token";
/// Token introspection path, relative to the REST domain.
pub const TOKEN_INFO_PATH: &str = "/rest/tokeninfo";
/// Browser authorization path, relative to the login domain.
pub const AUTHORIZE_PATH: &str = "/app/login/oauth2/authorize.nl";
/// Assertion type sent with the client-credentials grant.
pub const JWT_BEARER_ASSERTION_TYPE: &str =
	"urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
/// Integration record used for browser logins against production hosts.
pub const PRODUCTION_INTEGRATION_CLIENT_ID: &str =
	"6da57bf05a6247fc876c6d228184ff487760a382a43ac7e93eaff743803d22ac";
/// Integration record used for browser logins against development (`.f.`) hosts.
pub const DEVELOPMENT_INTEGRATION_CLIENT_ID: &str =
	"a3f34eae0e4ab97240fb221ea91623e790b7cb577421e0185bf5d108837c7bd1";

static DEVELOPMENT_HOSTS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
	[
		r"(?i)^\w+\.app\.f\.netsuite\.com$",
		r"(?i)^system\.f\.netsuite\.com$",
		r"(?i)^\w+\.suitetalk\.api\.f\.netsuite\.com$",
	]
	.map(|pattern| Regex::new(pattern).expect("Development host pattern is valid."))
});

/// OAuth 2.0 grant types used against the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant with PKCE.
	AuthorizationCode,
	/// Refresh Token grant.
	RefreshToken,
	/// Client Credentials grant with a JWT assertion.
	ClientCredentials,
}
impl GrantType {
	/// Returns the RFC 6749 identifier for the grant type.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
			GrantType::ClientCredentials => "client_credentials",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Normalizes a domain or URL: adds `https://` when no scheme is given and strips trailing
/// slashes. Blank input yields `None`.
pub fn normalize_domain(value: &str) -> Result<Option<String>, ConfigError> {
	let value = value.trim();

	if value.is_empty() {
		return Ok(None);
	}

	let with_scheme = if value.starts_with("http://") || value.starts_with("https://") {
		value.to_owned()
	} else {
		format!("https://{value}")
	};
	let normalized = with_scheme.trim_end_matches('/').to_owned();

	Url::parse(&normalized).map_err(|e| ConfigError::invalid_url(&normalized, e))?;

	Ok(Some(normalized))
}

/// Base domain for discovery and browser logins, defaulting to [`GENERIC_DOMAIN`].
pub fn base_domain(domain: Option<&str>) -> Result<String, ConfigError> {
	Ok(match domain {
		Some(domain) => normalize_domain(domain)?,
		None => None,
	}
	.unwrap_or_else(|| GENERIC_DOMAIN.to_owned()))
}

/// Joins a normalized domain with an absolute endpoint path.
pub fn endpoint(domain: &str, path: &str) -> Result<Url, ConfigError> {
	let raw = format!("{}{path}", domain.trim_end_matches('/'));

	Url::parse(&raw).map_err(|e| ConfigError::invalid_url(raw, e))
}

/// Hostname of a domain, or the input itself when it cannot be parsed.
pub fn host_name(domain: &str) -> String {
	normalize_domain(domain)
		.ok()
		.flatten()
		.and_then(|url| Url::parse(&url).ok())
		.and_then(|url| url.host_str().map(str::to_owned))
		.unwrap_or_else(|| domain.to_owned())
}

/// Returns `true` for NetSuite development hosts, which use a different built-in client.
pub fn is_development_host(domain: &str) -> bool {
	let host = host_name(domain);

	DEVELOPMENT_HOSTS.iter().any(|pattern| pattern.is_match(&host))
}

/// Built-in integration client id for browser logins against `domain`.
pub fn default_integration_client_id(domain: &str) -> &'static str {
	if is_development_host(domain) {
		DEVELOPMENT_INTEGRATION_CLIENT_ID
	} else {
		PRODUCTION_INTEGRATION_CLIENT_ID
	}
}

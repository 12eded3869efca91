//! Credential records and the results flows hand back before they are stored.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{AccountId, Scope, Token},
};

/// Grant family a record was created with. The kind never changes for a given name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthKind {
	/// Machine-to-machine client credentials with a signed JWT assertion.
	ClientCredentials,
	/// Interactive authorization code with PKCE.
	Pkce,
	/// A label this crate cannot renew; preserved so the record survives rewrites.
	Other(String),
}
impl AuthKind {
	/// Stable label written to the credential file.
	pub fn as_str(&self) -> &str {
		match self {
			Self::ClientCredentials => "CLIENT_CREDENTIALS",
			Self::Pkce => "PKCE",
			Self::Other(label) => label,
		}
	}
}
impl From<String> for AuthKind {
	fn from(value: String) -> Self {
		match value.as_str() {
			"CLIENT_CREDENTIALS" => Self::ClientCredentials,
			"PKCE" => Self::Pkce,
			_ => Self::Other(value),
		}
	}
}
impl From<AuthKind> for String {
	fn from(value: AuthKind) -> Self {
		value.as_str().to_owned()
	}
}
impl Display for AuthKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Descriptive account metadata fetched after authentication.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountInfo {
	/// Company display name.
	#[serde(deserialize_with = "lenient_text")]
	pub company_name: String,
	/// Company (account) identifier.
	#[serde(deserialize_with = "lenient_text")]
	pub company_id: String,
	/// Role the token acts as.
	#[serde(deserialize_with = "lenient_text")]
	pub role_name: String,
}

// Tokeninfo values are stored as received, so older files may hold numbers or nulls here.
fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: serde::Deserializer<'de>,
{
	Ok(match Value::deserialize(deserializer)? {
		Value::String(text) => text,
		Value::Null => String::new(),
		other => other.to_string(),
	})
}

/// Host the account's system domain lives on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostInfo {
	/// Hostname of the system domain.
	pub host_name: String,
}

/// Service base URLs of one account, normalized to `scheme://host`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Domains {
	/// REST and token endpoint base.
	pub rest_domain: String,
	/// UI and login base.
	pub system_domain: String,
	/// SOAP web services base, when published.
	pub webservices_domain: Option<String>,
}
impl Domains {
	/// Returns `true` when both the REST and system domains are known.
	pub fn is_complete(&self) -> bool {
		!self.rest_domain.is_empty() && !self.system_domain.is_empty()
	}
}

/// Inputs needed to repeat the flow that created a record.
///
/// Client-credentials records fill every field; PKCE records leave the certificate and key
/// path unset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthConfig {
	/// Account the credential belongs to.
	pub account_id: Option<AccountId>,
	/// OAuth client id (integration record).
	pub client_id: Option<String>,
	/// Certificate id used as the JWT `kid`.
	pub certificate_id: Option<String>,
	/// Absolute path of the PEM private key.
	pub private_key_path: Option<PathBuf>,
	/// Optional domain override used to seed discovery.
	pub domain: Option<String>,
	/// Requested scope.
	pub scope: Option<Scope>,
}
impl AuthConfig {
	/// Shallow merge: fields present in `update` win.
	pub fn merge(self, update: AuthConfig) -> Self {
		Self {
			account_id: update.account_id.or(self.account_id),
			client_id: update.client_id.or(self.client_id),
			certificate_id: update.certificate_id.or(self.certificate_id),
			private_key_path: update.private_key_path.or(self.private_key_path),
			domain: update.domain.or(self.domain),
			scope: update.scope.or(self.scope),
		}
	}
}

/// Everything a successful authentication or refresh produces.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthResult {
	/// Descriptive account metadata (best effort).
	pub account_info: AccountInfo,
	/// Host of the system domain.
	pub host_info: HostInfo,
	/// Resolved service domains.
	pub domains: Domains,
	/// Issued token.
	pub token: Token,
	/// Inputs needed to repeat the flow.
	pub auth_config: AuthConfig,
}

/// One named credential.
///
/// The token representation is generic so the store can reuse the record shape for its sealed
/// on-disk form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
	rename_all = "camelCase",
	bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de> + Default")
)]
pub struct AuthRecord<T = Token> {
	/// Grant family.
	#[serde(rename = "type")]
	pub kind: AuthKind,
	/// Descriptive account metadata.
	#[serde(default)]
	pub account_info: Option<AccountInfo>,
	/// Host of the system domain.
	#[serde(default)]
	pub host_info: Option<HostInfo>,
	/// Cached service domains.
	#[serde(default)]
	pub domains: Option<Domains>,
	/// Inputs needed to repeat the flow.
	#[serde(default)]
	pub auth_config: Option<AuthConfig>,
	/// Token material.
	#[serde(default)]
	pub token: T,
	/// Creation instant.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub created_at: Option<OffsetDateTime>,
	/// Last mutation instant.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub updated_at: Option<OffsetDateTime>,
}
impl<T> AuthRecord<T> {
	/// Converts the token representation, keeping every other field.
	pub fn map_token<U>(self, f: impl FnOnce(T) -> U) -> AuthRecord<U> {
		self.try_map_token(|token| Ok::<_, std::convert::Infallible>(f(token)))
			.unwrap_or_else(|never| match never {})
	}

	/// Fallible variant of [`map_token`](Self::map_token).
	pub fn try_map_token<U, E>(
		self,
		f: impl FnOnce(T) -> Result<U, E>,
	) -> Result<AuthRecord<U>, E> {
		Ok(AuthRecord {
			kind: self.kind,
			account_info: self.account_info,
			host_info: self.host_info,
			domains: self.domains,
			auth_config: self.auth_config,
			token: f(self.token)?,
			created_at: self.created_at,
			updated_at: self.updated_at,
		})
	}
}
impl AuthRecord {
	/// Builds a new record from a flow result, stamping both timestamps with `now`.
	pub fn from_result(kind: AuthKind, result: AuthResult, now: OffsetDateTime) -> Self {
		Self {
			kind,
			account_info: Some(result.account_info),
			host_info: Some(result.host_info),
			domains: Some(result.domains),
			auth_config: Some(result.auth_config),
			token: result.token,
			created_at: Some(now),
			updated_at: Some(now),
		}
	}

	/// Applies a renewal result in place.
	///
	/// Account info, host info, and domains are replaced; auth config and token are merged
	/// field by field; `updated_at` moves to `now`. The kind and creation time never change.
	pub fn apply(&mut self, result: AuthResult, now: OffsetDateTime) {
		self.account_info = Some(result.account_info);
		self.host_info = Some(result.host_info);
		self.domains = Some(result.domains);
		self.auth_config =
			Some(self.auth_config.take().unwrap_or_default().merge(result.auth_config));
		self.token = std::mem::take(&mut self.token).merge(result.token);
		self.updated_at = Some(now);
	}

	/// Copy that is safe to print: no access or refresh secret.
	pub fn public_view(&self) -> Self {
		Self { token: self.token.redacted(), ..self.clone() }
	}
}

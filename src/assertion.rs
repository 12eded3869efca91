//! Signed client assertions for the client-credentials grant.
//!
//! Assertions are compact JWTs signed with RSA-PSS over SHA-256 (`PS256`). The certificate id
//! travels in the `kid` header so the platform can pick the matching public key, and no `sub`
//! claim is emitted.

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
// self
use crate::_prelude::*;

/// Default assertion lifetime.
pub const DEFAULT_ASSERTION_TTL: Duration = Duration::seconds(300);

/// Inputs for one assertion.
#[derive(Clone, Debug)]
pub struct ClientAssertion {
	audience: String,
	issuer: String,
	kid: String,
	scope: Option<String>,
	issued_at: Option<i64>,
	expires_in: Duration,
}
impl ClientAssertion {
	/// Starts an assertion for `audience` (the token URL), `issuer` (the client id), and `kid`
	/// (the certificate id).
	pub fn new(
		audience: impl Into<String>,
		issuer: impl Into<String>,
		kid: impl Into<String>,
	) -> Self {
		Self {
			audience: audience.into(),
			issuer: issuer.into(),
			kid: kid.into(),
			scope: None,
			issued_at: None,
			expires_in: DEFAULT_ASSERTION_TTL,
		}
	}

	/// Adds the `scope` claim.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Pins `iat` to `seconds` since the epoch instead of the wall clock.
	pub fn issued_at(mut self, seconds: i64) -> Self {
		self.issued_at = Some(seconds);

		self
	}

	/// Overrides the lifetime.
	pub fn expires_in(mut self, ttl: Duration) -> Self {
		self.expires_in = ttl;

		self
	}
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
	iss: &'a str,
	aud: &'a str,
	iat: i64,
	exp: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	scope: Option<&'a str>,
}

/// Signs [`ClientAssertion`]s with an RSA private key.
#[derive(Clone, Copy, Debug, Default)]
pub struct JwtAssertionSigner;
impl JwtAssertionSigner {
	/// Signs `assertion` with the PEM-encoded RSA key (PKCS#1 or PKCS#8).
	///
	/// Malformed or non-RSA keys fail with [`Error::Signing`].
	pub fn sign(&self, assertion: &ClientAssertion, private_key_pem: &[u8]) -> Result<String> {
		let key = EncodingKey::from_rsa_pem(private_key_pem)
			.map_err(|source| Error::Signing { source })?;
		let mut header = Header::new(Algorithm::PS256);

		header.kid = Some(assertion.kid.clone());

		let iat = assertion.issued_at.unwrap_or_else(|| OffsetDateTime::now_utc().unix_timestamp());
		let claims = Claims {
			iss: &assertion.issuer,
			aud: &assertion.audience,
			iat,
			exp: iat + assertion.expires_in.whole_seconds(),
			scope: assertion.scope.as_deref(),
		};

		jsonwebtoken::encode(&header, &claims, &key).map_err(|source| Error::Signing { source })
	}
}

//! Per-login PKCE material and callback validation.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{AccountId, Scope},
	error::ConfigError,
	flows::CallbackParams,
	provider,
};

const STATE_BYTES: usize = 32;
const PKCE_VERIFIER_BYTES: usize = 64;

/// Supported PKCE challenge methods surfaced via [`PkceSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Single-use secrets of one browser login: code verifier, derived challenge, and `state`.
///
/// None of these values are persisted; a new session is generated for every login.
#[derive(Clone)]
pub struct PkceSession {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
	state: String,
}
impl PkceSession {
	/// Draws a fresh verifier (64 random bytes) and state (32 random bytes), both base64url.
	pub fn generate() -> Self {
		let verifier = random_token(PKCE_VERIFIER_BYTES);
		let challenge = compute_pkce_challenge(&verifier);
		let state = random_token(STATE_BYTES);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256, state }
	}

	/// Opaque value that must come back unchanged on the callback.
	pub fn state(&self) -> &str {
		&self.state
	}

	/// PKCE code challenge derived from the secret verifier.
	pub fn code_challenge(&self) -> &str {
		&self.challenge
	}

	/// PKCE challenge method (currently always `S256`).
	pub fn code_challenge_method(&self) -> PkceCodeChallengeMethod {
		self.method
	}

	pub(crate) fn verifier(&self) -> &str {
		&self.verifier
	}

	/// Builds `{base_domain}/app/login/oauth2/authorize.nl` with the PKCE query.
	pub fn authorize_url(
		&self,
		base_domain: &str,
		client_id: &str,
		redirect_uri: &Url,
		scope: &Scope,
	) -> Result<Url, ConfigError> {
		let mut url = provider::endpoint(base_domain, provider::AUTHORIZE_PATH)?;
		let mut pairs = url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", client_id);
		pairs.append_pair("redirect_uri", redirect_uri.as_str());
		pairs.append_pair("scope", &scope.normalized());
		pairs.append_pair("state", &self.state);
		pairs.append_pair("code_challenge", &self.challenge);
		pairs.append_pair("code_challenge_method", self.method.as_str());

		drop(pairs);

		Ok(url)
	}

	/// Checks the redirect parameters in order: `error`, `state`, `code`, then `company`.
	pub fn validate_callback(&self, params: &CallbackParams) -> Result<AuthorizedCallback> {
		let param = |name: &str| params.get(name).map(|value| value.trim()).filter(|v| !v.is_empty());

		if let Some(code) = param("error") {
			return Err(Error::Authorization {
				code: code.to_owned(),
				description: param("error_description").unwrap_or(code).to_owned(),
			});
		}
		if param("state") != Some(self.state.as_str()) {
			return Err(Error::StateMismatch);
		}

		let code = param("code")
			.ok_or(Error::MissingCallbackParameter { description: "an authorization code" })?;
		let company = param("company").ok_or(Error::MissingCallbackParameter {
			description: "account information (\"company\")",
		})?;
		let account_id = AccountId::new(company).map_err(ConfigError::from)?;

		Ok(AuthorizedCallback { code: code.to_owned(), account_id })
	}
}
impl Debug for PkceSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkceSession")
			.field("state", &self.state)
			.field("code_challenge", &self.challenge)
			.field("code_challenge_method", &self.method)
			.finish_non_exhaustive()
	}
}

/// Authorization code and account id extracted from a valid callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizedCallback {
	/// Single-use authorization code.
	pub code: String,
	/// Account the user signed in to (`company`).
	pub account_id: AccountId,
}

fn random_token(len: usize) -> String {
	let mut bytes = vec![0_u8; len];

	rand::rng().fill_bytes(&mut bytes);

	URL_SAFE_NO_PAD.encode(bytes)
}

fn compute_pkce_challenge(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

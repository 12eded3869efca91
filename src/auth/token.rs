//! Token model carried by credential records and flow results.

pub mod secret;

// self
use crate::{
	_prelude::*,
	auth::{Scope, token::secret::TokenSecret},
};

/// Token type assumed when the endpoint does not name one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Freshness of a stored token relative to an instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
	/// An access token is present and outlives the safety margin.
	Fresh,
	/// The token expires within the safety margin, already expired, or has no expiry.
	Expired,
	/// No access token is available (never issued or dropped at rest).
	Missing,
}

/// Access and refresh material plus expiry metadata.
///
/// `expires_at == None` means the token is treated as always expired.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Token {
	/// Bearer token presented to REST endpoints.
	pub access_token: Option<TokenSecret>,
	/// Refresh token, issued only by the authorization-code flow.
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry instant.
	pub expires_at: Option<OffsetDateTime>,
	/// Informational token type.
	pub token_type: String,
	/// Scope granted with the token, when known.
	pub scope: Option<Scope>,
}
impl Token {
	/// Returns a builder for tokens issued by a flow.
	pub fn builder() -> TokenBuilder {
		TokenBuilder::default()
	}

	/// Classifies the token at `instant`, treating anything expiring within `margin` as expired.
	pub fn status_at(&self, instant: OffsetDateTime, margin: Duration) -> TokenStatus {
		if self.access_token.is_none() {
			return TokenStatus::Missing;
		}
		if self.is_expired_at(instant, margin) {
			return TokenStatus::Expired;
		}

		TokenStatus::Fresh
	}

	/// Returns `true` when the expiry is unknown or not after `instant + margin`.
	pub fn is_expired_at(&self, instant: OffsetDateTime, margin: Duration) -> bool {
		match self.expires_at {
			Some(expires_at) => expires_at <= instant + margin,
			None => true,
		}
	}

	/// Returns a copy with both secrets removed.
	pub fn redacted(&self) -> Self {
		Self { access_token: None, refresh_token: None, ..self.clone() }
	}

	/// Applies a freshly issued token on top of this one.
	///
	/// Access token, expiry, and type always come from `update`; the refresh token and scope
	/// are carried forward when `update` omits them.
	pub fn merge(self, update: Token) -> Self {
		Self {
			access_token: update.access_token,
			refresh_token: update.refresh_token.or(self.refresh_token),
			expires_at: update.expires_at,
			token_type: update.token_type,
			scope: update.scope.or(self.scope),
		}
	}
}

/// Builder for [`Token`].
#[derive(Clone, Debug, Default)]
pub struct TokenBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	token_type: Option<String>,
	scope: Option<Scope>,
}
impl TokenBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides an optional refresh token value.
	pub fn maybe_refresh_token(mut self, token: Option<TokenSecret>) -> Self {
		self.refresh_token = token;

		self
	}

	/// Sets the instant `expires_in` is measured from; defaults to the build time.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative lifetime; zero or negative lifetimes leave the expiry unset.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration).filter(|delta| delta.is_positive());

		self
	}

	/// Sets the token type label.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the granted scope.
	pub fn scope(mut self, scope: Scope) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Consumes the builder and produces a [`Token`].
	pub fn build(self) -> Token {
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => Some(instant),
			(None, Some(delta)) =>
				Some(self.issued_at.unwrap_or_else(OffsetDateTime::now_utc) + delta),
			(None, None) => None,
		};

		Token {
			access_token: self.access_token,
			refresh_token: self.refresh_token,
			expires_at,
			token_type: self.token_type.unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_owned()),
			scope: self.scope,
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const MARGIN: Duration = Duration::seconds(60);

	#[test]
	fn status_honors_safety_margin() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let token = Token::builder()
			.access_token("access")
			.issued_at(now)
			.expires_in(Duration::seconds(61))
			.build();

		assert_eq!(token.status_at(now, MARGIN), TokenStatus::Fresh);
		assert_eq!(token.status_at(now + Duration::seconds(1), MARGIN), TokenStatus::Expired);
		assert_eq!(token.redacted().status_at(now, MARGIN), TokenStatus::Missing);
	}

	#[test]
	fn missing_or_zero_expiry_counts_as_expired() {
		let now = OffsetDateTime::now_utc();
		let token = Token::builder().access_token("access").expires_in(Duration::ZERO).build();

		assert_eq!(token.expires_at, None);
		assert!(token.is_expired_at(now, Duration::ZERO));
		assert_eq!(token.token_type, DEFAULT_TOKEN_TYPE);
	}

	#[test]
	fn merge_carries_refresh_token_forward() {
		let stored = Token::builder()
			.access_token("old-access")
			.refresh_token("old-refresh")
			.scope(Scope::default())
			.expires_at(macros::datetime!(2025-01-01 00:00 UTC))
			.build();
		let renewed = Token::builder().access_token("new-access").build();
		let merged = stored.clone().merge(renewed);

		assert_eq!(merged.access_token.as_ref().map(TokenSecret::expose), Some("new-access"));
		assert_eq!(merged.refresh_token.as_ref().map(TokenSecret::expose), Some("old-refresh"));
		assert_eq!(merged.expires_at, None);
		assert_eq!(merged.scope, Some(Scope::default()));

		let rotated = stored.merge(Token::builder().access_token("a").refresh_token("r2").build());

		assert_eq!(rotated.refresh_token.as_ref().map(TokenSecret::expose), Some("r2"));
	}
}

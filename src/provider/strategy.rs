//! Classification of token endpoint failures into the crate's error taxonomy.

// self
use crate::{_prelude::*, provider::GrantType};

const BODY_PREVIEW_LIMIT: usize = 256;
const OAUTH_CODES: [(&str, ProviderErrorKind); 8] = [
	("invalid_grant", ProviderErrorKind::InvalidGrant),
	("access_denied", ProviderErrorKind::InvalidGrant),
	("invalid_client", ProviderErrorKind::InvalidClient),
	("unauthorized_client", ProviderErrorKind::InvalidClient),
	("invalid_scope", ProviderErrorKind::InsufficientScope),
	("insufficient_scope", ProviderErrorKind::InsufficientScope),
	("temporarily_unavailable", ProviderErrorKind::Transient),
	("server_error", ProviderErrorKind::Transient),
];

/// Decides how a failed token request is reported.
///
/// The context carries plain data only, so strategies never see the HTTP client.
pub trait ProviderStrategy
where
	Self: Send + Sync,
{
	/// Maps a failed token request to an error category.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;
}

/// Error categories a token failure can fall into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// The grant (authorization code, refresh token, assertion) was rejected.
	InvalidGrant,
	/// The client is unknown or not allowed to use the grant.
	InvalidClient,
	/// The requested scope was refused.
	InsufficientScope,
	/// The failure is temporary.
	Transient,
}

/// Facts about a failed token request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// Grant that was being exchanged.
	pub grant_type: GrantType,
	/// HTTP status code, when a response arrived.
	pub http_status: Option<u16>,
	/// OAuth `error` field.
	pub oauth_error: Option<String>,
	/// OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Truncated body of a non-OAuth error response.
	pub body_preview: Option<String>,
	/// Whether no response arrived at all.
	pub network_error: bool,
}
impl ProviderErrorContext {
	/// Empty context for `grant_type`.
	pub fn new(grant_type: GrantType) -> Self {
		Self {
			grant_type,
			http_status: None,
			oauth_error: None,
			error_description: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Context for a request that never produced a response.
	pub fn network_failure(grant_type: GrantType) -> Self {
		Self { network_error: true, ..Self::new(grant_type) }
	}

	/// Sets the HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Sets the OAuth `error` field.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Sets the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Sets a body preview, truncated to 256 characters.
	pub fn with_body_preview(mut self, body: impl AsRef<str>) -> Self {
		self.body_preview = Some(body_preview(body.as_ref()));

		self
	}
}

/// First 256 characters of `body`, with an ellipsis when truncated.
pub(crate) fn body_preview(body: &str) -> String {
	let mut preview = body.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	if body.chars().nth(BODY_PREVIEW_LIMIT).is_some() {
		preview.push('…');
	}

	preview
}

/// Strategy tuned for the NetSuite token endpoint.
///
/// Known OAuth codes win, then hints in the description or body, then the HTTP status.
#[derive(Clone, Copy, Debug, Default)]
pub struct NetSuiteStrategy;
impl Display for NetSuiteStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("netsuite")
	}
}
impl ProviderStrategy for NetSuiteStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error {
			return ProviderErrorKind::Transient;
		}

		ctx.oauth_error
			.as_deref()
			.and_then(match_code)
			.or_else(|| ctx.error_description.as_deref().and_then(match_hint))
			.or_else(|| ctx.body_preview.as_deref().and_then(match_hint))
			.unwrap_or_else(|| classify_status(ctx.http_status))
	}
}

fn match_code(code: &str) -> Option<ProviderErrorKind> {
	let code = code.trim();

	OAUTH_CODES.iter().find(|(known, _)| known.eq_ignore_ascii_case(code)).map(|(_, kind)| *kind)
}

fn match_hint(text: &str) -> Option<ProviderErrorKind> {
	let lowered = text.to_ascii_lowercase();

	OAUTH_CODES
		.iter()
		.find(|(known, _)| lowered.contains(known))
		.map(|(_, kind)| *kind)
		.or_else(|| lowered.contains("retry").then_some(ProviderErrorKind::Transient))
}

fn classify_status(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::InsufficientScope,
		_ => ProviderErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn classify(ctx: ProviderErrorContext) -> ProviderErrorKind {
		NetSuiteStrategy.classify_token_error(&ctx)
	}

	#[test]
	fn oauth_codes_take_precedence() {
		let ctx = ProviderErrorContext::new(GrantType::RefreshToken)
			.with_oauth_error("INVALID_GRANT")
			.with_http_status(503);

		assert_eq!(classify(ctx), ProviderErrorKind::InvalidGrant);
		assert_eq!(
			classify(
				ProviderErrorContext::new(GrantType::ClientCredentials)
					.with_oauth_error("unauthorized_client")
			),
			ProviderErrorKind::InvalidClient
		);
	}

	#[test]
	fn hints_and_status_fill_gaps() {
		let ctx = ProviderErrorContext::new(GrantType::AuthorizationCode)
			.with_oauth_error("custom")
			.with_error_description("Requested invalid_scope for this role");

		assert_eq!(classify(ctx), ProviderErrorKind::InsufficientScope);
		assert_eq!(
			classify(ProviderErrorContext::new(GrantType::RefreshToken).with_http_status(401)),
			ProviderErrorKind::InvalidClient
		);
		assert_eq!(
			classify(ProviderErrorContext::new(GrantType::RefreshToken).with_http_status(502)),
			ProviderErrorKind::Transient
		);
		assert_eq!(
			classify(ProviderErrorContext::network_failure(GrantType::RefreshToken)),
			ProviderErrorKind::Transient
		);
	}

	#[test]
	fn body_previews_are_truncated() {
		let ctx =
			ProviderErrorContext::new(GrantType::RefreshToken).with_body_preview("x".repeat(300));
		let preview = ctx.body_preview.expect("Preview should be recorded.");

		assert_eq!(preview.chars().count(), BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
	}
}

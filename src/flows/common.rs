//! Shared helpers for flow implementations (tokeninfo lookup, account metadata, token assembly).

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{AccountId, AccountInfo, Scope, Token, TokenSecret},
	http::{self, TokenHttpClient},
	oauth::{TokenGrant, TransportErrorMapper},
	provider,
};

pub(crate) const CI_ROLE_FALLBACK: &str = "OAuth2 (CI)";
pub(crate) const PKCE_ROLE_FALLBACK: &str = "OAuth2 (PKCE)";

const TOKEN_INFO_ENDPOINT: &str = "Token info";
const COMPANY_NAME_KEYS: [&str; 4] = ["companyName", "company", "companyname", "accountName"];
const COMPANY_ID_KEYS: [&str; 4] = ["companyId", "companyid", "account", "accountId"];
const ROLE_NAME_KEYS: [&str; 3] = ["roleName", "rolename", "role"];

/// Loose `GET {rest}/rest/tokeninfo` body; key spellings vary between releases.
pub(crate) type TokenInfo = Map<String, Value>;

/// Fetches tokeninfo with the new bearer token. Every failure is logged and swallowed.
pub(crate) async fn fetch_token_info<C, M>(
	http_client: &C,
	mapper: &M,
	rest_domain: &str,
	access_token: &TokenSecret,
) -> Option<TokenInfo>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let url = match provider::endpoint(rest_domain, provider::TOKEN_INFO_PATH) {
		Ok(url) => url,
		Err(e) => {
			tracing::debug!(error = %e, "Skipping tokeninfo lookup.");

			return None;
		},
	};

	match http::get_json(http_client, mapper, TOKEN_INFO_ENDPOINT, &url, Some(access_token)).await
	{
		Ok(response) if response.status().is_success() =>
			match serde_json::from_slice::<TokenInfo>(response.body()) {
				Ok(info) => Some(info),
				Err(e) => {
					tracing::debug!(error = %e, "Ignoring unparsable tokeninfo body.");

					None
				},
			},
		Ok(response) => {
			tracing::debug!(status = response.status().as_u16(), "Tokeninfo lookup was rejected.");

			None
		},
		Err(e) => {
			tracing::debug!(error = %e, "Tokeninfo lookup failed.");

			None
		},
	}
}

/// Maps tokeninfo onto [`AccountInfo`], falling back to the account id and `role_fallback`.
pub(crate) fn account_info(
	account_id: &AccountId,
	info: Option<&TokenInfo>,
	role_fallback: &str,
) -> AccountInfo {
	AccountInfo {
		company_name: pick(info, &COMPANY_NAME_KEYS).unwrap_or_else(|| account_id.to_string()),
		company_id: pick(info, &COMPANY_ID_KEYS).unwrap_or_else(|| account_id.to_string()),
		role_name: pick(info, &ROLE_NAME_KEYS).unwrap_or_else(|| role_fallback.to_owned()),
	}
}

/// Builds a [`Token`] from a grant issued at `issued_at`; `fallback_scope` fills a missing scope.
pub(crate) fn token_from_grant(
	grant: TokenGrant,
	issued_at: OffsetDateTime,
	fallback_scope: Option<Scope>,
) -> Token {
	let mut builder = Token::builder()
		.access_token(grant.access_token.expose())
		.maybe_refresh_token(grant.refresh_token)
		.issued_at(issued_at);

	if let Some(expires_in) = grant.expires_in {
		builder = builder.expires_in(expires_in);
	}
	if let Some(token_type) = grant.token_type {
		builder = builder.token_type(token_type);
	}
	if let Some(scope) = grant.scope.or(fallback_scope) {
		builder = builder.scope(scope);
	}

	builder.build()
}

fn pick(info: Option<&TokenInfo>, keys: &[&str]) -> Option<String> {
	let info = info?;

	keys.iter().find_map(|key| match info.get(*key)? {
		Value::String(value) if !value.trim().is_empty() => Some(value.clone()),
		Value::Number(value) => Some(value.to_string()),
		_ => None,
	})
}

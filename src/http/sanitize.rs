//! Redaction helpers applied before URLs and headers reach the logs.

// std
use std::sync::LazyLock;
// crates.io
use oauth2::http::HeaderMap;
use regex::Regex;
// self
use crate::_prelude::*;

const URL_PLACEHOLDER: &str = "redacted";
const HEADER_PLACEHOLDER: &str = "<redacted>";

static EMAIL_LIKE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("Email pattern is valid.")
});
// Account ids are numeric and often carry a sandbox suffix (`1234567-sb1`, `1234567_SB1`).
static ACCOUNT_LIKE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\b\d{6,}(?:[-_](?:sb|rp)\d+)?\b").expect("Account pattern is valid.")
});
static SENSITIVE_PARAM: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)token|pass|secret|key|authorization").expect("Parameter pattern is valid.")
});

/// Returns `raw` with credentials, account ids, and email addresses replaced by `redacted`.
///
/// Query parameters are redacted by name (anything token/secret/key-like, plus `account`,
/// `company`, `companyid`, and `c`) or by value (email or account id shaped). Account ids are
/// also scrubbed from the host and path. Unparsable input is scrubbed as plain text.
pub fn sanitize_url(raw: &str) -> String {
	let Ok(mut url) = Url::parse(raw) else {
		return scrub(raw);
	};
	let pairs = url
		.query_pairs()
		.map(|(name, value)| {
			let value = if should_redact_param(&name)
				|| EMAIL_LIKE.is_match(&value)
				|| ACCOUNT_LIKE.is_match(&value)
			{
				URL_PLACEHOLDER.to_owned()
			} else {
				value.into_owned()
			};

			(name.into_owned(), value)
		})
		.collect::<Vec<_>>();

	if !pairs.is_empty() {
		url.query_pairs_mut().clear().extend_pairs(pairs);
	}
	if let Some(host) = url.host_str().map(str::to_owned) {
		let clean = ACCOUNT_LIKE.replace_all(&host, URL_PLACEHOLDER);

		if clean != host {
			// Failure leaves the original host for the final scrub below.
			let _ = url.set_host(Some(&clean));
		}
	}

	let path = ACCOUNT_LIKE.replace_all(url.path(), URL_PLACEHOLDER).into_owned();

	url.set_path(&path);

	scrub(url.as_str())
}

/// Returns header pairs with credentials and cookies masked and URL-valued headers sanitized.
pub fn sanitize_headers(headers: &HeaderMap) -> Vec<(String, String)> {
	headers
		.iter()
		.map(|(name, value)| {
			let name = name.as_str().to_owned();
			let value = String::from_utf8_lossy(value.as_bytes());
			let value = match name.as_str() {
				"authorization" | "cookie" | "set-cookie" => HEADER_PLACEHOLDER.to_owned(),
				"host" => ACCOUNT_LIKE.replace_all(&value, URL_PLACEHOLDER).into_owned(),
				_ if value.starts_with("http://") || value.starts_with("https://") =>
					sanitize_url(&value),
				_ => value.into_owned(),
			};

			(name, value)
		})
		.collect()
}

fn should_redact_param(name: &str) -> bool {
	let name = name.trim().to_ascii_lowercase();

	if name.is_empty() {
		return false;
	}

	SENSITIVE_PARAM.is_match(&name) || matches!(name.as_str(), "account" | "company" | "companyid" | "c")
}

fn scrub(value: &str) -> String {
	let value = ACCOUNT_LIKE.replace_all(value, URL_PLACEHOLDER);

	EMAIL_LIKE.replace_all(&value, URL_PLACEHOLDER).into_owned()
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{HeaderValue, header};
	// self
	use super::*;

	#[test]
	fn discovery_urls_hide_account() {
		let clean =
			sanitize_url("https://system.netsuite.com/rest/datacenterurls?account=1234567_SB1");

		assert_eq!(clean, "https://system.netsuite.com/rest/datacenterurls?account=redacted");
	}

	#[test]
	fn hosts_paths_and_values_are_scrubbed() {
		let clean = sanitize_url(
			"https://1234567-sb1.suitetalk.api.netsuite.com/record/7654321?email=a.b@example.com&page=2&access_token=abc",
		);

		assert!(!clean.contains("1234567"));
		assert!(!clean.contains("7654321"));
		assert!(!clean.contains("example.com"));
		assert!(!clean.contains("abc"));
		assert!(clean.contains("page=2"));
		assert!(clean.starts_with("https://redacted.suitetalk.api.netsuite.com/record/redacted"));
	}

	#[test]
	fn unparsable_values_are_scrubbed_as_text() {
		assert_eq!(sanitize_url("not a url 1234567"), "not a url redacted");
	}

	#[test]
	fn credential_headers_are_masked() {
		let mut headers = HeaderMap::new();

		headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
		headers.insert(header::SET_COOKIE, HeaderValue::from_static("session=1"));
		headers.insert(header::HOST, HeaderValue::from_static("1234567.app.netsuite.com"));
		headers
			.insert(header::LOCATION, HeaderValue::from_static("https://x.test/?state=1&c=1234567"));
		headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

		let sanitized = sanitize_headers(&headers).into_iter().collect::<BTreeMap<_, _>>();

		assert_eq!(sanitized["authorization"], "<redacted>");
		assert_eq!(sanitized["set-cookie"], "<redacted>");
		assert_eq!(sanitized["host"], "redacted.app.netsuite.com");
		assert_eq!(sanitized["location"], "https://x.test/?state=1&c=redacted");
		assert_eq!(sanitized["accept"], "application/json");
	}
}

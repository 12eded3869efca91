//! Shared fixtures for the integration tests.

#![allow(dead_code)]

// std
use std::path::PathBuf;
// crates.io
use httpmock::{Mock, prelude::*};
use serde_json::json;
// self
use suitecloud_auth::{
	auth::AccountId, config::Settings, flows::Authenticator, http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper, provider,
};

pub const ACCOUNT: &str = "TEST";

pub fn account() -> AccountId {
	AccountId::new(ACCOUNT).expect("Account fixture should be valid.")
}

/// Reqwest client that accepts the self-signed certificates `httpmock` serves.
pub fn test_reqwest_http_client() -> ReqwestHttpClient {
	let client = suitecloud_auth::reqwest::Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

/// Authenticator over a plain reqwest client with no environment overrides.
pub fn authenticator(settings: Settings) -> Authenticator {
	Authenticator::with_http_client(
		settings,
		test_reqwest_http_client(),
		ReqwestTransportErrorMapper,
	)
}

pub fn private_key_path() -> PathBuf {
	PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/client_key.pem")
}

/// Discovery answering with the mock server itself for every domain.
pub async fn mock_discovery<'a>(server: &'a MockServer, account: &str) -> Mock<'a> {
	let base = server.base_url();

	server
		.mock_async(|when, then| {
			when.method(GET).path(provider::DATACENTER_URLS_PATH).query_param("account", account);
			then.status(200).header("content-type", "application/json").json_body(json!({
				"restDomain": format!("{base}/"),
				"systemDomain": base,
				"webservicesDomain": base,
			}));
		})
		.await
}

pub async fn mock_token_info<'a>(server: &'a MockServer, access_token: &str) -> Mock<'a> {
	server
		.mock_async(|when, then| {
			when.method(GET)
				.path(provider::TOKEN_INFO_PATH)
				.header("authorization", format!("Bearer {access_token}"));
			then.status(200).header("content-type", "application/json").json_body(json!({
				"companyName": "Acme Wholesale",
				"companyId": ACCOUNT,
				"roleName": "Administrator",
			}));
		})
		.await
}

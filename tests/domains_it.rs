mod common;

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use suitecloud_auth::{
	auth::AccountId,
	config::Settings,
	error::{DiscoveryError, Error},
	flows::CredentialIssuer,
	provider,
};

#[tokio::test]
async fn sandbox_accounts_are_sent_in_datacenter_form() {
	let server = MockServer::start_async().await;
	let discovery = server
		.mock_async(|when, then| {
			when.method(GET)
				.path(provider::DATACENTER_URLS_PATH)
				.query_param("account", "1234567_SB1");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"restDomain": "https://1234567-sb1.suitetalk.api.netsuite.com/",
				"systemDomain": "1234567-sb1.app.netsuite.com",
				"webservicesDomain": "https://1234567-sb1.suitetalk.api.netsuite.com",
			}));
		})
		.await;
	let account = AccountId::new("1234567-sb1").expect("Sandbox account id should be valid.");
	let authenticator = common::authenticator(Settings::default());
	let base_url = server.base_url();
	let resolved = authenticator
		.resolve_domains(&account, Some(base_url.as_str()))
		.await
		.expect("Discovery should succeed.");

	discovery.assert_async().await;

	assert_eq!(resolved.domains.rest_domain, "https://1234567-sb1.suitetalk.api.netsuite.com");
	assert_eq!(resolved.domains.system_domain, "https://1234567-sb1.app.netsuite.com");
	assert_eq!(
		resolved.domains.webservices_domain.as_deref(),
		Some("https://1234567-sb1.suitetalk.api.netsuite.com")
	);
	assert_eq!(resolved.host_info.host_name, "1234567-sb1.app.netsuite.com");
}

#[tokio::test]
async fn failed_lookups_name_the_status() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(provider::DATACENTER_URLS_PATH);
			then.status(503).body("maintenance");
		})
		.await;

	let authenticator = common::authenticator(Settings::default());
	let err = authenticator
		.resolver()
		.resolve(&common::account(), Some(server.base_url().as_str()))
		.await
		.expect_err("Unavailable discovery should fail.");

	assert!(matches!(err, Error::Discovery(DiscoveryError::Status { status: 503, .. })));
	assert_eq!(err.to_string(), "Failed to resolve datacenter domains (status=503): maintenance.");
}

#[tokio::test]
async fn failed_lookups_truncate_long_bodies() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path(provider::DATACENTER_URLS_PATH);
			then.status(404).body("x".repeat(400));
		})
		.await;

	let authenticator = common::authenticator(Settings::default());
	let err = authenticator
		.resolver()
		.resolve(&common::account(), Some(server.base_url().as_str()))
		.await
		.expect_err("Unknown accounts should fail.");
	let Error::Discovery(DiscoveryError::Status { status, body }) = &err else {
		panic!("Expected a discovery status error, got {err:?}.");
	};

	assert_eq!(*status, 404);
	assert_eq!(*body, format!("{}…", "x".repeat(256)));
}

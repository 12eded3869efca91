mod common;

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
// self
use suitecloud_auth::{
	auth::{AuthConfig, AuthId, AuthKind, AuthRecord, Domains, Token},
	config::{PasskeySource, Settings},
	lifecycle::TokenLifecycleManager,
	provider,
	store::{CredentialStore, MemoryCredentialStore},
};

fn expired_ci_record(server: &MockServer) -> AuthRecord {
	let yesterday = OffsetDateTime::now_utc() - Duration::days(1);

	AuthRecord {
		kind: AuthKind::ClientCredentials,
		account_info: None,
		host_info: None,
		domains: Some(Domains {
			rest_domain: server.base_url(),
			system_domain: server.base_url(),
			webservices_domain: None,
		}),
		auth_config: Some(AuthConfig {
			account_id: Some(common::account()),
			client_id: Some("ci-client".into()),
			certificate_id: Some("cert-1".into()),
			private_key_path: Some(common::private_key_path()),
			domain: Some(server.base_url()),
			scope: None,
		}),
		token: Token::builder().access_token("stale").expires_at(yesterday).build(),
		created_at: Some(yesterday),
		updated_at: Some(yesterday),
	}
}

#[tokio::test]
async fn expired_credentials_are_renewed_exactly_once() {
	let server = MockServer::start_async().await;
	let discovery = common::mock_discovery(&server, common::ACCOUNT).await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path(provider::TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"fresh\",\"expires_in\":3600}");
		})
		.await;

	common::mock_token_info(&server, "fresh").await;

	let store = Arc::new(MemoryCredentialStore::new(PasskeySource::fixed("pk")));
	let id = AuthId::new("ci").expect("Auth id fixture should be valid.");

	store.upsert(&id, expired_ci_record(&server)).await.expect("Seed record should be stored.");

	let manager = TokenLifecycleManager::new(
		store.clone(),
		Arc::new(common::authenticator(Settings::default())),
	);
	let first = manager.ensure_valid_access_token(&id).await.expect("Renewal should succeed.");
	let second = manager.ensure_valid_access_token(&id).await.expect("Reuse should succeed.");

	discovery.assert_async().await;
	token.assert_async().await;

	assert_eq!(first.access_token.expose(), "fresh");
	assert_eq!(second, first);
	assert_eq!(first.rest_domain, server.base_url());

	let snapshot = manager.metrics();

	assert_eq!((snapshot.checks, snapshot.renewals, snapshot.reuses), (2, 1, 1));

	let stored = store.get(&id).await.expect("Get should succeed.").expect("Record should exist.");

	assert_eq!(stored.kind, AuthKind::ClientCredentials);
	assert_eq!(
		stored.account_info.map(|info| info.role_name).as_deref(),
		Some("Administrator")
	);
	assert!(stored.updated_at > stored.created_at);

	let status =
		manager.inspect_authorization(&id).await.expect("Inspection should succeed.");

	assert!(!status.needs_reauthorization);
}

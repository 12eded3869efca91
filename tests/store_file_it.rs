// std
use std::fs;
// crates.io
use time::macros;
// self
use suitecloud_auth::{
	auth::{AuthConfig, AuthId, AuthKind, AuthRecord, Domains, Token, TokenSecret},
	config::PasskeySource,
	error::SecretError,
	store::{CredentialStore, FileCredentialStore, Hydration, StoreError, cipher::EnvelopeKey},
};

fn auth_id(name: &str) -> AuthId {
	AuthId::new(name).expect("Auth id fixture should be valid.")
}

fn record() -> AuthRecord {
	AuthRecord {
		kind: AuthKind::Pkce,
		account_info: None,
		host_info: None,
		domains: Some(Domains {
			rest_domain: "https://test.suitetalk.api.netsuite.com".into(),
			system_domain: "https://test.app.netsuite.com".into(),
			webservices_domain: None,
		}),
		auth_config: Some(AuthConfig { client_id: Some("pkce-client".into()), ..Default::default() }),
		token: Token::builder()
			.access_token("secret-access")
			.refresh_token("secret-refresh")
			.expires_at(macros::datetime!(2030-01-01 00:00 UTC))
			.build(),
		created_at: Some(macros::datetime!(2025-01-01 00:00 UTC)),
		updated_at: Some(macros::datetime!(2025-01-01 00:00 UTC)),
	}
}

fn expose(secret: &Option<TokenSecret>) -> Option<&str> {
	secret.as_ref().map(TokenSecret::expose)
}

fn write_store(path: &std::path::Path, auth_ids: serde_json::Value) {
	let file = serde_json::json!({
		"version": 1,
		"updatedAt": "2025-01-01T00:00:00Z",
		"authIds": auth_ids,
	});

	fs::write(path, serde_json::to_vec_pretty(&file).expect("Store fixture should serialize."))
		.expect("Store fixture should be written.");
}

fn read_store(path: &std::path::Path) -> serde_json::Value {
	serde_json::from_str(&fs::read_to_string(path).expect("Store file should exist."))
		.expect("Store file should be JSON.")
}

#[tokio::test]
async fn passkey_sealed_records_never_hit_disk_in_plaintext() {
	let dir = tempfile::tempdir().expect("Temporary directory should be created.");
	let path = dir.path().join("auth").join("auth-store.json");
	let store = FileCredentialStore::new(&path, PasskeySource::fixed("correct horse"));
	let id = auth_id("dev");

	assert!(store.list().await.expect("Missing files should read as empty.").is_empty());

	store.upsert(&id, record()).await.expect("Upsert should succeed.");

	let raw = fs::read_to_string(&path).expect("Store file should exist.");
	let json: serde_json::Value = serde_json::from_str(&raw).expect("Store file should be JSON.");

	assert!(!raw.contains("secret-access"));
	assert!(!raw.contains("secret-refresh"));
	assert_eq!(json["version"], 1);
	assert!(json["updatedAt"].is_string());
	assert_eq!(json["authIds"]["dev"]["type"], "PKCE");
	assert!(json["authIds"]["dev"]["token"]["accessTokenEnc"].is_string());
	assert!(json["authIds"]["dev"]["token"]["refreshTokenEnc"].is_string());

	let public = store.get(&id).await.expect("Get should succeed.").expect("Record should exist.");

	assert_eq!(expose(&public.token.access_token), None);
	assert_eq!(expose(&public.token.refresh_token), None);

	let store: &dyn CredentialStore = &store;
	let hydrated = store
		.get_with_secrets(&id)
		.await
		.expect("Hydration should succeed.")
		.expect("Record should exist.");

	assert_eq!(expose(&hydrated.token.access_token), Some("secret-access"));
	assert_eq!(expose(&hydrated.token.refresh_token), Some("secret-refresh"));
	assert_eq!(hydrated.domains, record().domains);

	let locked = FileCredentialStore::new(&path, PasskeySource::none());

	assert!(matches!(
		locked.hydrate(&id).await.expect("Hydration should report locked secrets."),
		Some(Hydration::RequiresPasskey(_))
	));

	let locked: &dyn CredentialStore = &locked;

	assert_eq!(
		locked.get_with_secrets(&id).await,
		Err(StoreError::Secret(SecretError::PasskeyRequired))
	);

	let wrong = FileCredentialStore::new(&path, PasskeySource::fixed("battery staple"));

	assert!(matches!(
		wrong.hydrate(&id).await,
		Err(StoreError::Secret(SecretError::Decrypt))
	));
}

#[tokio::test]
async fn records_without_a_passkey_drop_the_access_token() {
	let dir = tempfile::tempdir().expect("Temporary directory should be created.");
	let path = dir.path().join("auth-store.json");
	let store = FileCredentialStore::new(&path, PasskeySource::none());
	let id = auth_id("dev");

	store.upsert(&id, record()).await.expect("Upsert should succeed.");

	let raw = fs::read_to_string(&path).expect("Store file should exist.");

	assert!(!raw.contains("secret-access"));
	assert!(raw.contains("secret-refresh"));

	let store: &dyn CredentialStore = &store;
	let hydrated = store
		.get_with_secrets(&id)
		.await
		.expect("Plaintext records need no passkey.")
		.expect("Record should exist.");

	assert_eq!(expose(&hydrated.token.access_token), None);
	assert_eq!(expose(&hydrated.token.refresh_token), Some("secret-refresh"));
}

#[tokio::test]
async fn rename_and_remove_follow_name_rules() {
	let dir = tempfile::tempdir().expect("Temporary directory should be created.");
	let store = FileCredentialStore::new(dir.path().join("auth-store.json"), PasskeySource::none());
	let (dev, prod, qa) = (auth_id("dev"), auth_id("prod"), auth_id("qa"));

	store.upsert(&dev, record()).await.expect("Upsert should succeed.");
	store.upsert(&qa, record()).await.expect("Upsert should succeed.");
	store.rename(&dev, &prod).await.expect("Rename should succeed.");

	let names: Vec<_> = store
		.list()
		.await
		.expect("List should succeed.")
		.into_keys()
		.map(|id| id.to_string())
		.collect();

	assert_eq!(names, ["prod", "qa"]);
	assert_eq!(
		store.rename(&dev, &prod).await,
		Err(StoreError::NotFound { auth_id: "dev".into() })
	);
	assert_eq!(
		store.rename(&qa, &prod).await,
		Err(StoreError::AlreadyExists { auth_id: "prod".into() })
	);
	assert!(store.remove(&prod).await.expect("Remove should succeed."));
	assert!(!store.remove(&prod).await.expect("Second remove should succeed."));
	assert!(store.get(&prod).await.expect("Get should succeed.").is_none());
}

#[tokio::test]
async fn numeric_account_info_and_broken_records_do_not_block_the_store() {
	let dir = tempfile::tempdir().expect("Temporary directory should be created.");
	let path = dir.path().join("auth-store.json");
	let broken = serde_json::json!({ "type": "PKCE", "createdAt": "yesterday" });

	write_store(
		&path,
		serde_json::json!({
			"good": {
				"type": "CLIENT_CREDENTIALS",
				"accountInfo": { "companyName": "Acme", "companyId": 1234567, "roleName": null },
			},
			"broken": broken.clone(),
		}),
	);

	let store = FileCredentialStore::new(&path, PasskeySource::none());
	let listed = store.list().await.expect("Readable records should list.");
	let good = listed.get(&auth_id("good")).expect("Readable record should be listed.");

	assert_eq!(listed.len(), 1);
	assert_eq!(good.account_info.as_ref().map(|info| info.company_id.as_str()), Some("1234567"));
	assert_eq!(good.account_info.as_ref().map(|info| info.role_name.as_str()), Some(""));
	assert!(store.get(&auth_id("broken")).await.expect("Get should succeed.").is_none());

	store.upsert(&auth_id("dev"), record()).await.expect("Upsert should succeed.");

	assert_eq!(read_store(&path)["authIds"]["broken"], broken);
	assert_eq!(
		store.rename(&auth_id("dev"), &auth_id("broken")).await,
		Err(StoreError::AlreadyExists { auth_id: "broken".into() })
	);

	store.rename(&auth_id("broken"), &auth_id("quarantined")).await.expect("Rename should succeed.");

	assert_eq!(read_store(&path)["authIds"]["quarantined"], broken);
	assert!(store.remove(&auth_id("quarantined")).await.expect("Remove should succeed."));
	assert!(read_store(&path)["authIds"].get("quarantined").is_none());
	assert_eq!(store.list().await.expect("List should succeed.").len(), 2);
}

#[tokio::test]
async fn unknown_record_types_pass_through_list_get_and_upsert() {
	let dir = tempfile::tempdir().expect("Temporary directory should be created.");
	let path = dir.path().join("auth-store.json");
	let future = auth_id("future");

	write_store(
		&path,
		serde_json::json!({
			"future": { "type": "TOKEN_BASED", "hostInfo": { "hostName": "test.app.netsuite.com" } },
		}),
	);

	let store = FileCredentialStore::new(&path, PasskeySource::none());
	let other = AuthKind::Other("TOKEN_BASED".into());
	let listed = store.list().await.expect("List should succeed.");

	assert_eq!(listed.get(&future).map(|record| &record.kind), Some(&other));

	let mut stored =
		store.get(&future).await.expect("Get should succeed.").expect("Record should exist.");

	assert_eq!(stored.kind, other);

	stored.updated_at = Some(macros::datetime!(2026-01-01 00:00 UTC));

	store.upsert(&future, stored).await.expect("Upsert should succeed.");
	store.upsert(&auth_id("dev"), record()).await.expect("Upsert should succeed.");

	let json = read_store(&path);

	assert_eq!(json["authIds"]["future"]["type"], "TOKEN_BASED");
	assert_eq!(json["authIds"]["future"]["hostInfo"]["hostName"], "test.app.netsuite.com");
	assert_eq!(json["authIds"]["dev"]["type"], "PKCE");
}

#[tokio::test]
async fn plaintext_refresh_tokens_from_older_files_hydrate() {
	let dir = tempfile::tempdir().expect("Temporary directory should be created.");
	let path = dir.path().join("auth-store.json");
	let key = EnvelopeKey::derive(&TokenSecret::new("pk")).expect("Key should derive.");
	let access_enc = key.seal(&TokenSecret::new("old-access")).expect("Access token should seal.");
	let id = auth_id("browser");

	write_store(
		&path,
		serde_json::json!({
			"browser": {
				"type": "PKCE",
				"token": {
					"accessTokenEnc": access_enc,
					"refreshToken": "old-refresh",
					"expiresAt": "2030-01-01T00:00:00Z",
				},
			},
		}),
	);

	let unlocked = FileCredentialStore::new(&path, PasskeySource::fixed("pk"));
	let unlocked: &dyn CredentialStore = &unlocked;
	let hydrated = unlocked
		.get_with_secrets(&id)
		.await
		.expect("Hydration should succeed.")
		.expect("Record should exist.");

	assert_eq!(expose(&hydrated.token.access_token), Some("old-access"));
	assert_eq!(expose(&hydrated.token.refresh_token), Some("old-refresh"));

	let locked = FileCredentialStore::new(&path, PasskeySource::none());

	match locked.hydrate(&id).await.expect("Hydration should succeed.") {
		Some(Hydration::RequiresPasskey(record)) => {
			assert_eq!(expose(&record.token.access_token), None);
			assert_eq!(expose(&record.token.refresh_token), Some("old-refresh"));
		},
		other => panic!("Sealed access tokens should require a passkey, got {other:?}."),
	}

	write_store(
		&path,
		serde_json::json!({ "browser": { "type": "PKCE", "token": { "refreshToken": "old-refresh" } } }),
	);

	let locked: &dyn CredentialStore = &locked;
	let hydrated = locked
		.get_with_secrets(&id)
		.await
		.expect("Plaintext-only records need no passkey.")
		.expect("Record should exist.");

	assert_eq!(expose(&hydrated.token.refresh_token), Some("old-refresh"));
}

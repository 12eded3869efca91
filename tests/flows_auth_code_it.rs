mod common;

// std
use std::{collections::HashMap, sync::Arc, time::Duration};
// crates.io
use httpmock::prelude::*;
use parking_lot::Mutex;
// self
use suitecloud_auth::{
	auth::Scope,
	config::Settings,
	error::{ConfigError, Error},
	flows::{Authenticator, PkceParams},
	provider,
	reqwest::{self, StatusCode},
	url::Url,
};

const CLIENT_ID: &str = "pkce-client";

type Seen = Arc<Mutex<Vec<(Url, Option<StatusCode>)>>>;

/// Plays the browser: follows the authorize URL's redirect with `extra` appended.
fn redirecting_authenticator(
	state_override: Option<&'static str>,
	extra: &'static [(&'static str, &'static str)],
) -> (Authenticator, Seen) {
	let seen = Seen::default();
	let sink = Arc::clone(&seen);
	let launcher = move |authorize_url: &Url| {
		let query: HashMap<_, _> = authorize_url.query_pairs().into_owned().collect();
		let state = state_override.map(str::to_owned).unwrap_or_else(|| query["state"].clone());
		let mut callback =
			Url::parse(&query["redirect_uri"]).expect("Redirect URI should be a valid URL.");

		callback.query_pairs_mut().append_pair("state", &state).extend_pairs(extra.iter());

		let sink = Arc::clone(&sink);
		let authorize_url = authorize_url.clone();

		tokio::spawn(async move {
			let status = reqwest::get(callback).await.ok().map(|response| response.status());

			sink.lock().push((authorize_url, status));
		});

		Ok::<_, ConfigError>(())
	};
	let authenticator = common::authenticator(Settings::default())
		.with_callback_ports(0..=0)
		.with_browser_launcher(launcher);

	(authenticator, seen)
}

/// Waits for the simulated browser to finish its redirect.
async fn browser_visit(seen: &Seen) -> (Url, Option<StatusCode>) {
	for _ in 0..100 {
		if let Some(visit) = seen.lock().first().cloned() {
			return visit;
		}

		tokio::time::sleep(Duration::from_millis(20)).await;
	}

	panic!("The browser should have followed the redirect.");
}

fn params(server: &MockServer) -> PkceParams {
	PkceParams::default()
		.with_domain(server.base_url())
		.with_client_id(CLIENT_ID)
		.with_timeout(Duration::from_secs(10))
}

#[tokio::test]
async fn browser_login_exchanges_the_code_for_tokens() {
	let server = MockServer::start_async().await;
	let discovery = common::mock_discovery(&server, common::ACCOUNT).await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(provider::TOKEN_PATH)
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "auth-code")
				.form_urlencoded_tuple("client_id", CLIENT_ID);
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"pkce-access\",\"refresh_token\":\"pkce-refresh\",\"expires_in\":3600,\"scope\":\"rest_webservices restlets\"}",
			);
		})
		.await;
	let (authenticator, seen) =
		redirecting_authenticator(None, &[("code", "auth-code"), ("company", common::ACCOUNT)]);
	let result = authenticator
		.authenticate_pkce(params(&server))
		.await
		.expect("Browser login should succeed.");

	discovery.assert_async().await;
	token.assert_async().await;

	assert_eq!(result.token.access_token.as_ref().map(|t| t.expose()), Some("pkce-access"));
	assert_eq!(result.token.refresh_token.as_ref().map(|t| t.expose()), Some("pkce-refresh"));
	assert_eq!(
		result.token.scope.as_ref().map(Scope::normalized).as_deref(),
		Some("rest_webservices restlets")
	);
	assert_eq!(result.account_info.role_name, "OAuth2 (PKCE)");
	assert_eq!(result.auth_config.client_id.as_deref(), Some(CLIENT_ID));
	assert!(result.auth_config.certificate_id.is_none());

	let (authorize_url, status) = browser_visit(&seen).await;
	let query: HashMap<_, _> = authorize_url.query_pairs().into_owned().collect();

	assert_eq!(authorize_url.path(), provider::AUTHORIZE_PATH);
	assert_eq!(query["response_type"], "code");
	assert_eq!(query["client_id"], CLIENT_ID);
	assert_eq!(query["scope"], "rest_webservices");
	assert_eq!(query["code_challenge_method"], "S256");
	assert!(query["redirect_uri"].starts_with("http://127.0.0.1:"));
	assert_eq!(status, Some(StatusCode::OK));
}

#[tokio::test]
async fn forged_state_is_rejected_without_a_token_request() {
	let server = MockServer::start_async().await;
	let (authenticator, seen) = redirecting_authenticator(
		Some("forged"),
		&[("code", "auth-code"), ("company", common::ACCOUNT)],
	);
	let err = authenticator
		.authenticate_pkce(params(&server))
		.await
		.expect_err("A forged state should fail.");

	assert!(matches!(err, Error::StateMismatch));
	assert_eq!(browser_visit(&seen).await.1, Some(StatusCode::BAD_REQUEST));
}

#[tokio::test]
async fn authorization_errors_carry_the_provider_description() {
	let server = MockServer::start_async().await;
	let (authenticator, _) = redirecting_authenticator(
		None,
		&[("error", "access_denied"), ("error_description", "User declined")],
	);
	let err = authenticator
		.authenticate_pkce(params(&server))
		.await
		.expect_err("Declined logins should fail.");

	assert!(matches!(
		&err,
		Error::Authorization { code, description }
			if code == "access_denied" && description == "User declined"
	));
}

#[tokio::test]
async fn logins_time_out_when_the_browser_never_returns() {
	let server = MockServer::start_async().await;
	let authenticator = common::authenticator(Settings::default())
		.with_callback_ports(0..=0)
		.with_browser_launcher(|_: &Url| Ok::<_, ConfigError>(()));
	let err = authenticator
		.authenticate_pkce(params(&server).with_timeout(Duration::from_millis(300)))
		.await
		.expect_err("Logins without a redirect should time out.");

	assert!(matches!(err, Error::Timeout { seconds: 1 }));
}

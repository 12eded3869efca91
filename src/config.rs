//! Environment-derived configuration, captured once and passed down explicitly.

// std
use std::{env, fs, io::ErrorKind};
// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

const CI_CLIENT_ID_VARS: [&str; 3] =
	["SUITECLOUD_CLIENT_ID", "SUITECLOUD_OAUTH_CLIENT_ID", "NS_CLIENT_ID"];
const INTEGRATION_CLIENT_ID_VARS: [&str; 3] =
	["SUITECLOUD_INTEGRATION_CLIENT_ID", "SUITECLOUD_OAUTH_CLIENT_ID", "SUITECLOUD_CLIENT_ID"];
const SCOPE_VARS: [&str; 3] = ["SUITECLOUD_SCOPE", "SUITECLOUD_SCOPES", "NS_SCOPES"];
const PROXY_VARS: [&str; 3] = ["SUITECLOUD_PROXY", "npm_config_https_proxy", "npm_config_proxy"];
const PASSKEY_VARS: [&str; 2] = ["SUITECLOUD_CI_PASSKEY", "SUITECLOUD_FALLBACK_PASSKEY"];
const HTTP_TRACE_VAR: &str = "SUITECLOUD_HTTP_TRACE";
const SDK_HOME_VAR: &str = "SUITECLOUD_SDK_HOME";
const SDK_HOME_DIR: &str = ".suitecloud-sdk";
const SDK_SETTINGS_FILE: &str = "suitecloud-sdk-settings.json";
const CREDENTIAL_STORE_DIR: &str = "auth";
const CREDENTIAL_STORE_FILE: &str = "auth-store.json";

/// Immutable snapshot of every environment-derived option the flows consult.
///
/// Build it once with [`Settings::from_env`] at process start, or with
/// [`Settings::from_lookup`] when the values come from somewhere else (tests, embedding).
/// Blank values count as unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
	/// Client id override for the client-credentials flow.
	pub ci_client_id: Option<String>,
	/// Client id override for the browser PKCE flow.
	pub integration_client_id: Option<String>,
	/// Scope override applied when the caller does not pass one.
	pub scope: Option<String>,
	/// Proxy URL for all outbound HTTP traffic.
	pub proxy: Option<String>,
	/// Promotes sanitized HTTP traces to `info`.
	pub http_trace: bool,
	/// SuiteCloud SDK home directory.
	pub sdk_home: Option<PathBuf>,
}
impl Settings {
	/// Reads the process environment.
	pub fn from_env() -> Self {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Reads options through `lookup`, which maps a variable name to its value.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let first = |names: &[&str]| names.iter().find_map(|name| non_blank(lookup(name)));
		let sdk_home = non_blank(lookup(SDK_HOME_VAR)).map(PathBuf::from).or_else(|| {
			directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(SDK_HOME_DIR))
		});

		Self {
			ci_client_id: first(&CI_CLIENT_ID_VARS),
			integration_client_id: first(&INTEGRATION_CLIENT_ID_VARS),
			scope: first(&SCOPE_VARS),
			proxy: first(&PROXY_VARS),
			http_trace: lookup(HTTP_TRACE_VAR).is_some_and(|value| is_truthy(&value)),
			sdk_home,
		}
	}

	/// Overrides the SDK home directory.
	pub fn with_sdk_home(mut self, sdk_home: impl Into<PathBuf>) -> Self {
		self.sdk_home = Some(sdk_home.into());

		self
	}

	/// Returns the SDK home directory.
	pub fn sdk_home(&self) -> Result<&Path, ConfigError> {
		self.sdk_home.as_deref().ok_or(ConfigError::SdkHomeUnavailable)
	}

	/// Location of the credential file under the SDK home.
	pub fn credential_store_path(&self) -> Result<PathBuf, ConfigError> {
		Ok(self.sdk_home()?.join(CREDENTIAL_STORE_DIR).join(CREDENTIAL_STORE_FILE))
	}
}

/// Where the credential store finds the passkey that encrypts secrets at rest.
#[derive(Clone, Debug, Default)]
pub enum PasskeySource {
	/// Read `SUITECLOUD_CI_PASSKEY`, then `SUITECLOUD_FALLBACK_PASSKEY`, on every call.
	#[default]
	Environment,
	/// Use a fixed passkey, or none at all.
	Fixed(Option<TokenSecret>),
}
impl PasskeySource {
	/// Fixed passkey.
	pub fn fixed(passkey: impl Into<String>) -> Self {
		Self::Fixed(Some(TokenSecret::new(passkey)))
	}

	/// Fixed absence of a passkey.
	pub fn none() -> Self {
		Self::Fixed(None)
	}

	/// Returns the current passkey, if any.
	pub fn passkey(&self) -> Option<TokenSecret> {
		match self {
			Self::Environment => PASSKEY_VARS
				.iter()
				.find_map(|name| non_blank(env::var(name).ok()))
				.map(TokenSecret::new),
			Self::Fixed(passkey) => passkey.clone().filter(|secret| !secret.is_blank()),
		}
	}
}

/// Project-local SDK settings file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SdkSettings {
	/// Client id of the integration record used for browser logins.
	pub integration_client_id: Option<String>,
}
impl SdkSettings {
	/// Loads `suitecloud-sdk-settings.json` from `sdk_path`; a missing file yields defaults.
	pub fn load(sdk_path: &Path) -> Result<Self, ConfigError> {
		let path = sdk_path.join(SDK_SETTINGS_FILE);
		let bytes = match fs::read(&path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
			Err(e) => return Err(ConfigError::InvalidSdkSettings { path, message: e.to_string() }),
		};

		serde_json::from_slice(&bytes)
			.map_err(|e| ConfigError::InvalidSdkSettings { path, message: e.to_string() })
	}

	/// Trimmed integration client id, if configured.
	pub fn integration_client_id(&self) -> Option<String> {
		non_blank(self.integration_client_id.clone())
	}
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
	value.map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
}

fn is_truthy(value: &str) -> bool {
	matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
		move |name| pairs.iter().find(|(key, _)| *key == name).map(|(_, value)| value.to_string())
	}

	#[test]
	fn lookups_follow_priority_and_skip_blanks() {
		let settings = Settings::from_lookup(lookup(&[
			("SUITECLOUD_CLIENT_ID", "  "),
			("SUITECLOUD_OAUTH_CLIENT_ID", "oauth-client"),
			("NS_CLIENT_ID", "ns-client"),
			("SUITECLOUD_SCOPES", "restlets"),
			("npm_config_proxy", "http://proxy:3128"),
			("SUITECLOUD_HTTP_TRACE", "Yes"),
			("SUITECLOUD_SDK_HOME", "/tmp/sdk-home"),
		]));

		assert_eq!(settings.ci_client_id.as_deref(), Some("oauth-client"));
		assert_eq!(settings.integration_client_id.as_deref(), Some("oauth-client"));
		assert_eq!(settings.scope.as_deref(), Some("restlets"));
		assert_eq!(settings.proxy.as_deref(), Some("http://proxy:3128"));
		assert!(settings.http_trace);
		assert_eq!(
			settings.credential_store_path().expect("SDK home should be configured."),
			PathBuf::from("/tmp/sdk-home/auth/auth-store.json"),
		);
	}

	#[test]
	fn integration_client_id_prefers_dedicated_variable() {
		let settings = Settings::from_lookup(lookup(&[
			("SUITECLOUD_CLIENT_ID", "ci-client"),
			("SUITECLOUD_INTEGRATION_CLIENT_ID", "integration-client"),
		]));

		assert_eq!(settings.ci_client_id.as_deref(), Some("ci-client"));
		assert_eq!(settings.integration_client_id.as_deref(), Some("integration-client"));
		assert!(!settings.http_trace);
	}

	#[test]
	fn fixed_passkeys_ignore_blank_values() {
		assert!(PasskeySource::fixed("  ").passkey().is_none());
		assert!(PasskeySource::none().passkey().is_none());
		assert_eq!(
			PasskeySource::fixed("secret").passkey().as_ref().map(TokenSecret::expose),
			Some("secret"),
		);
	}

	#[test]
	fn sdk_settings_load_and_report_invalid_json() {
		let dir = tempfile::tempdir().expect("Temporary directory should be created.");

		assert_eq!(
			SdkSettings::load(dir.path()).expect("Missing settings should load as defaults."),
			SdkSettings::default(),
		);

		fs::write(dir.path().join(SDK_SETTINGS_FILE), r#"{"integrationClientId":" abc "}"#)
			.expect("Settings fixture should be written.");

		let settings = SdkSettings::load(dir.path()).expect("Valid settings should load.");

		assert_eq!(settings.integration_client_id().as_deref(), Some("abc"));

		fs::write(dir.path().join(SDK_SETTINGS_FILE), "{not json")
			.expect("Settings fixture should be written.");

		let err = SdkSettings::load(dir.path()).expect_err("Invalid JSON should be rejected.");

		assert!(err.to_string().starts_with("Invalid SDK settings file"));
	}
}

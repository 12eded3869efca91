//! Opens the authorize URL in the user's browser.

// std
use std::process::{Command, Stdio};
// self
use crate::{_prelude::*, error::ConfigError};

/// Side effect that shows the authorize URL to the user.
///
/// Any `Fn(&Url) -> Result<(), ConfigError>` closure is a launcher, which is how tests drive
/// the redirect without a browser.
pub trait BrowserLauncher
where
	Self: Send + Sync,
{
	/// Opens `url`. Returning does not imply the user finished signing in.
	fn open(&self, url: &Url) -> Result<(), ConfigError>;
}
impl<F> BrowserLauncher for F
where
	F: Send + Sync + Fn(&Url) -> Result<(), ConfigError>,
{
	fn open(&self, url: &Url) -> Result<(), ConfigError> {
		self(url)
	}
}

/// Platform default browser: `open` on macOS, `cmd /c start` on Windows, `xdg-open` elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBrowser;
impl BrowserLauncher for SystemBrowser {
	fn open(&self, url: &Url) -> Result<(), ConfigError> {
		let (command, args) = launch_command(url.as_str());

		Command::new(command)
			.args(&args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.spawn()
			.map(drop)
			.map_err(|source| ConfigError::BrowserLaunch { command, source })
	}
}

fn launch_command(url: &str) -> (&'static str, Vec<String>) {
	if cfg!(target_os = "macos") {
		("open", vec![url.to_owned()])
	} else if cfg!(target_os = "windows") {
		("cmd", vec!["/c".into(), "start".into(), String::new(), url.to_owned()])
	} else {
		("xdg-open", vec![url.to_owned()])
	}
}

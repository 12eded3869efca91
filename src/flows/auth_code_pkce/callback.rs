//! Loopback HTTP listener that catches the browser redirect of one PKCE login.

// std
use std::{
	io::ErrorKind,
	net::{Ipv4Addr, SocketAddr},
	ops::RangeInclusive,
	time::Duration as StdDuration,
};
// crates.io
use axum::{
	Router,
	extract::{RawQuery, State},
	http::{StatusCode, header::CONTENT_TYPE},
	response::{Html, IntoResponse, Response},
	routing,
};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	error::{CallbackError, ConfigError},
};

/// Loopback address the listener binds to.
pub const CALLBACK_HOST: Ipv4Addr = Ipv4Addr::LOCALHOST;
/// Path the authorization server redirects to.
pub const CALLBACK_PATH: &str = "/suitecloud-auth";
/// Candidate ports, tried in order.
pub const DEFAULT_CALLBACK_PORTS: RangeInclusive<u16> = 52300..=52315;

const CLOSE_GRACE: StdDuration = StdDuration::from_secs(5);
const SUCCESS_HTML: &str = "<!doctype html><html><head><meta charset=\"utf-8\" /></head><body><h2>Authentication completed.</h2><p>You can close this window and return to SuiteCloud CLI.</p></body></html>";
const FAILURE_HTML: &str = "<!doctype html><html><head><meta charset=\"utf-8\" /></head><body><h2>Authentication failed.</h2><p>Please return to SuiteCloud CLI and retry.</p></body></html>";

/// Query parameters of the redirect, verbatim. Repeated names keep the last value.
pub type CallbackParams = BTreeMap<String, String>;

/// Lifecycle of a [`LoopbackCallbackServer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackServerState {
	/// Bound and waiting for the redirect.
	Listening,
	/// The first redirect was delivered to the waiter.
	CallbackReceived,
	/// The wait ended before a redirect arrived.
	TimedOut,
	/// The listener was shut down without delivering a redirect.
	Closed,
}

#[derive(Clone)]
struct CallbackHandler {
	sender: Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>,
	expected_state: Arc<str>,
}

/// One-shot redirect receiver bound to `127.0.0.1`.
///
/// The first request to [`CALLBACK_PATH`] resolves the wait; later requests still get a page
/// but are otherwise ignored. Any other path answers 404. Call [`close`](Self::close) on every
/// exit path; dropping the server also signals shutdown.
pub struct LoopbackCallbackServer {
	port: u16,
	redirect_uri: Url,
	state: CallbackServerState,
	receiver: Option<oneshot::Receiver<CallbackParams>>,
	shutdown: Option<oneshot::Sender<()>>,
	task: Option<JoinHandle<()>>,
}
impl LoopbackCallbackServer {
	/// Binds the first free port in `ports` and starts serving.
	///
	/// A port that is already in use moves on to the next candidate; any other bind failure is
	/// fatal. `expected_state` only decides which page the browser sees.
	pub async fn start(ports: RangeInclusive<u16>, expected_state: &str) -> Result<Self> {
		let (first, last) = (*ports.start(), *ports.end());

		for port in ports {
			match TcpListener::bind(SocketAddr::from((CALLBACK_HOST, port))).await {
				Ok(listener) => return Self::serve(listener, expected_state),
				Err(e) if e.kind() == ErrorKind::AddrInUse => {
					tracing::debug!(port, "Callback port is in use; trying the next one.");
				},
				Err(source) => return Err(CallbackError::Bind { port, source }.into()),
			}
		}

		Err(CallbackError::PortsExhausted { first, last }.into())
	}

	fn serve(listener: TcpListener, expected_state: &str) -> Result<Self> {
		let port = listener
			.local_addr()
			.map_err(|source| CallbackError::Bind { port: 0, source })?
			.port();
		let raw = format!("http://{CALLBACK_HOST}:{port}{CALLBACK_PATH}");
		let redirect_uri = Url::parse(&raw).map_err(|e| ConfigError::invalid_url(&raw, e))?;
		let (callback_tx, callback_rx) = oneshot::channel();
		let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
		let handler = CallbackHandler {
			sender: Arc::new(Mutex::new(Some(callback_tx))),
			expected_state: Arc::from(expected_state),
		};
		let router = Router::new()
			.route(CALLBACK_PATH, routing::any(handle_callback))
			.fallback(not_found)
			.with_state(handler);
		let task = tokio::spawn(async move {
			let shutdown = async {
				let _ = shutdown_rx.await;
			};

			if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(shutdown).await {
				tracing::warn!(port, error = %e, "Callback server stopped with an error.");
			}
		});

		tracing::debug!(port, "Callback server listening.");

		Ok(Self {
			port,
			redirect_uri,
			state: CallbackServerState::Listening,
			receiver: Some(callback_rx),
			shutdown: Some(shutdown_tx),
			task: Some(task),
		})
	}

	/// Bound port.
	pub fn port(&self) -> u16 {
		self.port
	}

	/// `http://127.0.0.1:{port}/suitecloud-auth`.
	pub fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}

	/// Current lifecycle state.
	pub fn state(&self) -> CallbackServerState {
		self.state
	}

	/// Waits at most `timeout` for the redirect.
	///
	/// Times out with [`Error::Timeout`] naming the wait in whole seconds, rounded up. The
	/// wait can only be consumed once.
	pub async fn wait_for_callback(&mut self, timeout: StdDuration) -> Result<CallbackParams> {
		let receiver = self.receiver.take().ok_or(CallbackError::Closed)?;

		match tokio::time::timeout(timeout, receiver).await {
			Ok(Ok(params)) => {
				self.state = CallbackServerState::CallbackReceived;

				Ok(params)
			},
			Ok(Err(_)) => {
				self.state = CallbackServerState::Closed;

				Err(CallbackError::Closed.into())
			},
			Err(_) => {
				self.state = CallbackServerState::TimedOut;

				Err(Error::Timeout { seconds: ceil_seconds(timeout) })
			},
		}
	}

	/// Stops listening and releases the port. Safe to call more than once.
	pub async fn close(&mut self) {
		if let Some(shutdown) = self.shutdown.take() {
			let _ = shutdown.send(());
		}
		if let Some(mut task) = self.task.take() {
			if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
				tracing::debug!(port = self.port, "Callback server did not drain in time; aborting.");
				task.abort();
			}
		}
		if self.state == CallbackServerState::Listening {
			self.state = CallbackServerState::Closed;
		}
	}
}
impl Debug for LoopbackCallbackServer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoopbackCallbackServer")
			.field("port", &self.port)
			.field("state", &self.state)
			.finish()
	}
}
impl Drop for LoopbackCallbackServer {
	fn drop(&mut self) {
		if let Some(shutdown) = self.shutdown.take() {
			let _ = shutdown.send(());
		}
	}
}

async fn handle_callback(
	State(handler): State<CallbackHandler>,
	RawQuery(query): RawQuery,
) -> Response {
	let params = url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
		.into_owned()
		.collect::<CallbackParams>();
	let well_formed = params.get("error").is_none_or(String::is_empty)
		&& params.get("code").is_some_and(|code| !code.is_empty())
		&& params.get("state").is_some_and(|state| state.as_str() == &*handler.expected_state);

	if let Some(sender) = handler.sender.lock().take() {
		let _ = sender.send(params);
	}

	if well_formed {
		(StatusCode::OK, Html(SUCCESS_HTML)).into_response()
	} else {
		(StatusCode::BAD_REQUEST, Html(FAILURE_HTML)).into_response()
	}
}

async fn not_found() -> Response {
	(StatusCode::NOT_FOUND, [(CONTENT_TYPE, "text/plain")], "Not found").into_response()
}

fn ceil_seconds(duration: StdDuration) -> u64 {
	duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	async fn start(expected_state: &str) -> LoopbackCallbackServer {
		LoopbackCallbackServer::start(0..=0, expected_state)
			.await
			.expect("Ephemeral callback server should start.")
	}

	#[tokio::test]
	async fn first_callback_wins_and_pages_reflect_validity() {
		let mut server = start("expected").await;
		let base = format!("http://127.0.0.1:{}", server.port());
		let client = ReqwestClient::new();
		let missing = client
			.get(format!("{base}/elsewhere?code=x"))
			.send()
			.await
			.expect("Unknown paths should answer.");

		assert_eq!(missing.status().as_u16(), 404);
		assert_eq!(missing.text().await.expect("Body should read."), "Not found");

		let first = client
			.get(server.redirect_uri().clone())
			.query(&[("code", "abc"), ("state", "expected"), ("company", "TEST")])
			.send()
			.await
			.expect("Callback should answer.");

		assert_eq!(first.status().as_u16(), 200);
		assert!(first.text().await.expect("Body should read.").contains("Authentication completed."));

		let second = client
			.get(server.redirect_uri().clone())
			.query(&[("code", "other"), ("state", "wrong")])
			.send()
			.await
			.expect("Later callbacks should still answer.");

		assert_eq!(second.status().as_u16(), 400);

		let params = server
			.wait_for_callback(StdDuration::from_secs(5))
			.await
			.expect("The first callback should be delivered.");

		assert_eq!(params.get("code").map(String::as_str), Some("abc"));
		assert_eq!(params.get("company").map(String::as_str), Some("TEST"));
		assert_eq!(server.state(), CallbackServerState::CallbackReceived);

		server.close().await;
		server.close().await;

		assert!(ReqwestClient::new().get(server.redirect_uri().clone()).send().await.is_err());
	}

	#[tokio::test]
	async fn waits_time_out_with_rounded_seconds() {
		let mut server = start("expected").await;
		let err = server
			.wait_for_callback(StdDuration::from_millis(1_200))
			.await
			.expect_err("No callback should arrive.");

		assert!(matches!(err, Error::Timeout { seconds: 2 }));
		assert_eq!(server.state(), CallbackServerState::TimedOut);
		assert!(matches!(
			server.wait_for_callback(StdDuration::from_millis(10)).await,
			Err(Error::Callback(CallbackError::Closed))
		));

		server.close().await;
	}

	#[tokio::test]
	async fn busy_ports_are_skipped_until_the_range_runs_out() {
		let taken = TcpListener::bind(SocketAddr::from((CALLBACK_HOST, 0)))
			.await
			.expect("Ephemeral listener should bind.");
		let port = taken.local_addr().expect("Local address should be known.").port();
		let err = LoopbackCallbackServer::start(port..=port, "state")
			.await
			.expect_err("A single busy port should exhaust the range.");

		assert!(matches!(
			err,
			Error::Callback(CallbackError::PortsExhausted { first, last }) if first == port && last == port
		));
	}
}

//! Outbound HTTP for the token endpoint, account discovery, and tokeninfo.
//!
//! Every request goes through a [`TokenHttpClient`]. Each call gets a fresh
//! [`ResponseMetadataSlot`] that the transport fills with the status code and any
//! `Retry-After` hint, so error mapping sees the same facts no matter which client is plugged in.

pub mod sanitize;

// std
use std::{ops::Deref, time::Duration as StdDuration};
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		HeaderMap, Method, Request,
		header::{ACCEPT, AUTHORIZATION, RETRY_AFTER},
	},
};
use reqwest::{Proxy, redirect::Policy};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*, auth::TokenSecret, config::Settings, error::ConfigError,
	oauth::TransportErrorMapper,
};

const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);
const MAX_REDIRECTS: usize = 5;

/// Pluggable transport shared by the authenticator and the domain resolver.
///
/// The client itself is long-lived; [`TokenHttpClient::with_metadata`] hands out per-request
/// handles that own everything their futures touch.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Error raised by the transport before any HTTP response exists.
	type TransportError: 'static + Send + Sync + StdError;

	/// Per-request handle that reports into a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Returns a handle bound to `slot`.
	///
	/// Handles clear the slot before sending and fill it as soon as a response carries a status,
	/// error statuses included.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Status and retry hint of the last response seen by a handle.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: Option<u16>,
	/// `Retry-After`, converted to a relative duration.
	pub retry_after: Option<Duration>,
}

/// Shared cell the transport writes [`ResponseMetadata`] into.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Replaces the recorded metadata.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Takes the recorded metadata, leaving the slot empty.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Default [`TokenHttpClient`] built on reqwest.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient {
	client: ReqwestClient,
	trace: bool,
}
impl ReqwestHttpClient {
	/// Uses `client` as is, with request tracing at `debug`.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, trace: false }
	}

	/// Builds the shared client: 30 second timeout, at most 5 redirects, optional proxy.
	pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
		let mut builder =
			ReqwestClient::builder().timeout(REQUEST_TIMEOUT).redirect(Policy::limited(MAX_REDIRECTS));

		if let Some(proxy) = &settings.proxy {
			builder = builder.proxy(Proxy::all(proxy)?);
		}

		Ok(Self { client: builder.build()?, trace: settings.http_trace })
	}

	/// Promotes request traces to `info` and adds sanitized headers.
	pub fn with_trace(mut self, trace: bool) -> Self {
		self.trace = trace;

		self
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.client
	}
}
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ReqwestHandle(Arc::new(HandleState { client: self.client.clone(), slot, trace: self.trace }))
	}
}

struct HandleState {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
	trace: bool,
}

/// Request handle produced by [`ReqwestHttpClient`].
#[derive(Clone)]
pub struct ReqwestHandle(Arc<HandleState>);
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let state = Arc::clone(&self.0);

		Box::pin(async move {
			state.slot.take();

			let method = request.method().clone();
			let url = request.uri().to_string();
			let request_headers = state.trace.then(|| request.headers().clone());
			let response =
				state.client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().clone();

			state.slot.store(ResponseMetadata {
				status: Some(status.as_u16()),
				retry_after: parse_retry_after(&headers),
			});
			trace_exchange(&method, &url, status.as_u16(), request_headers.as_ref(), &headers);

			let body = response.bytes().await.map_err(Box::new)?;
			let mut converted = HttpResponse::new(body.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Issues a JSON `GET`, optionally with a bearer token, and returns the raw response.
///
/// Non-2xx statuses are returned, not mapped, so callers decide what a failure means.
pub(crate) async fn get_json<C, M>(
	http_client: &C,
	mapper: &M,
	endpoint: &'static str,
	url: &Url,
	bearer: Option<&TokenSecret>,
) -> Result<HttpResponse>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let slot = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(slot.clone());
	let mut request =
		Request::builder().method(Method::GET).uri(url.as_str()).header(ACCEPT, "application/json");

	if let Some(token) = bearer {
		request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose()));
	}

	let request = request.body(Vec::new()).map_err(ConfigError::from)?;

	handle
		.call(request)
		.await
		.map_err(|e| mapper.map_transport_error(endpoint, slot.take().as_ref(), e))
}

fn trace_exchange(
	method: &Method,
	url: &str,
	status: u16,
	request_headers: Option<&HeaderMap>,
	response_headers: &HeaderMap,
) {
	let url = sanitize::sanitize_url(url);

	match request_headers {
		Some(request_headers) => tracing::info!(
			target: "suitecloud_auth::http",
			%method,
			%url,
			status,
			request_headers = ?sanitize::sanitize_headers(request_headers),
			response_headers = ?sanitize::sanitize_headers(response_headers),
			"HTTP exchange completed."
		),
		None => tracing::debug!(
			target: "suitecloud_auth::http",
			%method,
			%url,
			status,
			"HTTP exchange completed."
		),
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	match raw.parse::<i64>() {
		Ok(seconds) if seconds >= 0 => Some(Duration::seconds(seconds)),
		Ok(_) => None,
		Err(_) => OffsetDateTime::parse(raw, &Rfc2822)
			.ok()
			.map(|moment| moment - OffsetDateTime::now_utc())
			.filter(|delta| delta.is_positive()),
	}
}

//! Datacenter discovery: account id to REST, system, and web services domains.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, Domains, HostInfo},
	error::DiscoveryError,
	http::{self, ReqwestHttpClient, TokenHttpClient},
	oauth::{ReqwestTransportErrorMapper, TransportErrorMapper},
	obs::{self, FlowKind},
	provider::{self, strategy},
};

const DISCOVERY_ENDPOINT: &str = "Datacenter discovery";

/// Domains of one account plus the host of its system domain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedDomains {
	/// Normalized service domains.
	pub domains: Domains,
	/// Hostname of the system domain.
	pub host_info: HostInfo,
}
impl ResolvedDomains {
	/// Builds the pair from cached domains.
	pub fn from_domains(domains: Domains) -> Self {
		let host_info = HostInfo { host_name: provider::host_name(&domains.system_domain) };

		Self { domains, host_info }
	}
}

/// Resolves an account's datacenter through `GET {base}/rest/datacenterurls`.
pub struct DomainResolver<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
}
impl<C, M> DomainResolver<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a resolver over a shared transport.
	pub fn new(http_client: Arc<C>, transport_mapper: Arc<M>) -> Self {
		Self { http_client, transport_mapper }
	}

	/// Looks up the domains serving `account_id`.
	///
	/// `domain_override` replaces the generic production host as the discovery base; a bare
	/// host gains `https://`. Sandbox and release-preview suffixes are sent as `_SB1`/`_RP1`.
	pub async fn resolve(
		&self,
		account_id: &AccountId,
		domain_override: Option<&str>,
	) -> Result<ResolvedDomains> {
		obs::observe(FlowKind::Discovery, "resolve", async move {
			let base = provider::base_domain(domain_override)?;
			let mut url = provider::endpoint(&base, provider::DATACENTER_URLS_PATH)?;

			url.query_pairs_mut().append_pair("account", &account_id.datacenter_form());

			let response = http::get_json(
				self.http_client.as_ref(),
				self.transport_mapper.as_ref(),
				DISCOVERY_ENDPOINT,
				&url,
				None,
			)
			.await?;
			let status = response.status();

			if !status.is_success() {
				let body = String::from_utf8_lossy(response.body());

				return Err(DiscoveryError::Status {
					status: status.as_u16(),
					body: strategy::body_preview(body.trim()),
				}
				.into());
			}

			let resolved = parse_datacenter_urls(response.body())?;

			tracing::debug!(
				rest_domain = %resolved.domains.rest_domain,
				host = %resolved.host_info.host_name,
				"Resolved datacenter domains."
			);

			Ok(resolved)
		})
		.await
	}
}
impl<C, M> Clone for DomainResolver<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: Arc::clone(&self.http_client),
			transport_mapper: Arc::clone(&self.transport_mapper),
		}
	}
}
impl<C, M> Debug for DomainResolver<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("DomainResolver(..)")
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DatacenterUrls {
	rest_domain: Option<String>,
	system_domain: Option<String>,
	webservices_domain: Option<String>,
	urls: Option<Box<DatacenterUrls>>,
}
impl DatacenterUrls {
	fn pick(&self, field: impl Fn(&Self) -> Option<&String>) -> Option<String> {
		field(self)
			.or_else(|| self.urls.as_deref().and_then(|nested| field(nested)))
			.and_then(|value| provider::normalize_domain(value).ok().flatten())
	}
}

fn parse_datacenter_urls(body: &[u8]) -> Result<ResolvedDomains, DiscoveryError> {
	let urls = serde_json::from_slice::<DatacenterUrls>(body)
		.map_err(|_| DiscoveryError::UnexpectedResponse)?;
	let (Some(rest_domain), Some(system_domain)) =
		(urls.pick(|u| u.rest_domain.as_ref()), urls.pick(|u| u.system_domain.as_ref()))
	else {
		return Err(DiscoveryError::UnexpectedResponse);
	};
	let webservices_domain = urls.pick(|u| u.webservices_domain.as_ref());

	Ok(ResolvedDomains::from_domains(Domains { rest_domain, system_domain, webservices_domain }))
}

//! Observability for credential flows.
//!
//! Every flow runs inside a `suitecloud_auth.flow` span carrying `flow` and `stage` fields.
//! With the `metrics` feature enabled, each attempt, success, and failure also increments the
//! `suitecloud_auth_flow_total` counter labeled by `flow` and `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow families observed by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Client credentials with a signed JWT assertion.
	ClientCredentials,
	/// Browser authorization code with PKCE.
	AuthorizationCode,
	/// Refresh token grant.
	Refresh,
	/// Datacenter domain discovery.
	Discovery,
	/// Token lifecycle checks on stored credentials.
	Lifecycle,
}
impl FlowKind {
	/// Stable label for span and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::Refresh => "refresh",
			FlowKind::Discovery => "discovery",
			FlowKind::Lifecycle => "lifecycle",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// The flow was entered.
	Attempt,
	/// The flow completed.
	Success,
	/// The flow returned an error.
	Failure,
}
impl FlowOutcome {
	/// Stable label for span and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a flow span and records attempt and outcome.
pub(crate) async fn observe<T, Fut>(kind: FlowKind, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_flow_outcome(kind, FlowOutcome::Success),
		Err(e) => {
			::tracing::debug!(flow = kind.as_str(), stage, error = %e, "Flow failed.");
			record_flow_outcome(kind, FlowOutcome::Failure);
		},
	}

	result
}

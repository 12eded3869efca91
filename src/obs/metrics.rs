// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::{FlowKind, FlowOutcome};

/// Increments `suitecloud_auth_flow_total` when the `metrics` feature is enabled.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"suitecloud_auth_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Counters kept by the token lifecycle manager.
#[derive(Debug, Default)]
pub struct LifecycleMetrics {
	checks: AtomicU64,
	reuses: AtomicU64,
	renewals: AtomicU64,
	failures: AtomicU64,
}
impl LifecycleMetrics {
	/// Point-in-time copy of every counter.
	pub fn snapshot(&self) -> LifecycleSnapshot {
		LifecycleSnapshot {
			checks: self.checks.load(Ordering::Relaxed),
			reuses: self.reuses.load(Ordering::Relaxed),
			renewals: self.renewals.load(Ordering::Relaxed),
			failures: self.failures.load(Ordering::Relaxed),
		}
	}

	pub(crate) fn record_check(&self) {
		self.checks.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reuse(&self) {
		self.reuses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_renewal(&self) {
		self.renewals.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}

/// Values read from [`LifecycleMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LifecycleSnapshot {
	/// Access token lookups.
	pub checks: u64,
	/// Lookups answered from the stored token.
	pub reuses: u64,
	/// Successful renewals (re-run flow or refresh grant).
	pub renewals: u64,
	/// Renewals that failed.
	pub failures: u64,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn lifecycle_counters_accumulate() {
		let metrics = LifecycleMetrics::default();

		record_flow_outcome(FlowKind::Refresh, FlowOutcome::Failure);
		metrics.record_check();
		metrics.record_check();
		metrics.record_reuse();
		metrics.record_renewal();
		metrics.record_failure();

		assert_eq!(
			metrics.snapshot(),
			LifecycleSnapshot { checks: 2, reuses: 1, renewals: 1, failures: 1 }
		);
	}
}

// crates.io
use tracing::{Instrument, Span, instrument::Instrumented, span::EnteredSpan};
// self
use crate::{_prelude::*, obs::FlowKind};

/// Span wrapper shared by every flow.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: Span,
}
impl FlowSpan {
	/// Creates a `suitecloud_auth.flow` span for `kind` at `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		Self { span: tracing::info_span!("suitecloud_auth.flow", flow = kind.as_str(), stage) }
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> FlowSpanGuard {
		FlowSpanGuard { _guard: self.span.entered() }
	}

	/// Instruments a future so the span is active across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}

/// RAII guard returned by [`FlowSpan::entered`].
pub struct FlowSpanGuard {
	_guard: EnteredSpan,
}
impl Debug for FlowSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FlowSpanGuard(..)")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrumented_futures_resolve() {
		let _guard = FlowSpan::new(FlowKind::Discovery, "guard").entered();
		let span = FlowSpan::new(FlowKind::Lifecycle, "instrumented_futures_resolve");

		assert_eq!(FlowSpan::instrument(&span, async { 7 }).await, 7);
	}
}

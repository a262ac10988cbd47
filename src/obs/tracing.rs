// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, auth::ProviderId, obs::FlowStage};

/// A span builder used around adapter calls.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	span: Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided stage + provider.
	pub fn new(stage: FlowStage, provider: &ProviderId) -> Self {
		let span =
			tracing::info_span!("device_gate.flow", stage = stage.as_str(), provider = %provider);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::{FlowSpan, FlowStage, ProviderId};

	#[tokio::test]
	async fn instrument_wraps_future() {
		let provider = ProviderId::new("span-probe").expect("Provider fixture should be valid.");
		let span = FlowSpan::new(FlowStage::GetStatus, &provider);
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}

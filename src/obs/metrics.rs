// self
use crate::obs::{FlowStage, StageOutcome};

/// Records an adapter call outcome via the global metrics recorder (when enabled).
pub fn record_stage(stage: FlowStage, outcome: StageOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"device_gate_stage_total",
			"stage" => stage.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome);
	}
}

/// Records the terminal outcome label of a finished flow (when enabled).
pub fn record_terminal(outcome: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("device_gate_terminal_total", "outcome" => outcome).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_metrics() {
		record_stage(FlowStage::PollDeviceFlow, StageOutcome::Failure);
		record_terminal("expired");
	}
}

//! Observability helpers for device flows and status refreshes.
//!
//! Every adapter call runs inside a `device_gate.flow` span carrying the `stage` (which adapter
//! capability) and `provider` fields.
//!
//! # Feature Flags
//!
//! - Enable `metrics` to increment `device_gate_stage_total` for every adapter call
//!   (attempt/success/failure, labeled by `stage` + `outcome`) and `device_gate_terminal_total`
//!   once per finished flow, labeled by the terminal `outcome`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Adapter capabilities observed by the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowStage {
	/// `start_device_flow`.
	StartDeviceFlow,
	/// `poll_device_flow`.
	PollDeviceFlow,
	/// `get_status`.
	GetStatus,
	/// `clear_session`.
	ClearSession,
}
impl FlowStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowStage::StartDeviceFlow => "start_device_flow",
			FlowStage::PollDeviceFlow => "poll_device_flow",
			FlowStage::GetStatus => "get_status",
			FlowStage::ClearSession => "clear_session",
		}
	}
}
impl Display for FlowStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each adapter call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to an adapter call.
	Attempt,
	/// The call returned `Ok`.
	Success,
	/// The call returned `Err`.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}

	/// Maps a call result onto its outcome label.
	pub fn of<T>(result: &Result<T>) -> Self {
		if result.is_ok() { Self::Success } else { Self::Failure }
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

//! Terminal outcomes reported once per attempt.

// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenSecret},
	flows::FlowState,
	provider::PollStatus,
};

const CONFIG_MARKERS: &[&str] =
	&["environment variable", "not configured", "client_id", "client id", "credentials"];

/// The single terminal result of one `start()` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowOutcome {
	/// The user approved the request.
	Succeeded {
		/// Issued token, when the adapter hands one back.
		token: Option<TokenSecret>,
	},
	/// The attempt failed.
	Failed(FlowFailure),
	/// The device code lapsed first.
	Expired,
	/// The user cancelled.
	Cancelled,
}
impl FlowOutcome {
	/// Returns the outcome label: `success`, `error`, `expired`, or `cancelled`.
	pub const fn label(&self) -> &'static str {
		match self {
			Self::Succeeded { .. } => "success",
			Self::Failed(_) => "error",
			Self::Expired => "expired",
			Self::Cancelled => "cancelled",
		}
	}

	/// Terminal [`FlowState`] matching this outcome.
	pub const fn state(&self) -> FlowState {
		match self {
			Self::Succeeded { .. } => FlowState::Succeeded,
			Self::Failed(_) => FlowState::Failed,
			Self::Expired => FlowState::Expired,
			Self::Cancelled => FlowState::Cancelled,
		}
	}

	/// Returns true for [`FlowOutcome::Succeeded`].
	pub const fn is_success(&self) -> bool {
		matches!(self, Self::Succeeded { .. })
	}

	/// Maps a terminal poll status onto an outcome. Returns `None` for `Pending`/`SlowDown`.
	pub fn from_poll_status(status: PollStatus) -> Option<Self> {
		match status {
			PollStatus::Pending | PollStatus::SlowDown => None,
			PollStatus::Success { token } => Some(Self::Succeeded { token }),
			PollStatus::Denied { message } => Some(Self::Failed(FlowFailure::Denied { message })),
			PollStatus::Expired { .. } => Some(Self::Expired),
			PollStatus::Error { message } => Some(Self::Failed(FlowFailure::Provider { message })),
		}
	}
}

/// User-facing failure carried by [`FlowOutcome::Failed`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum FlowFailure {
	/// The provider's host runtime is absent.
	#[error("Device sign-in is not available in this context.")]
	NotSupported,
	/// Credentials or endpoints are missing; `guidance` tells the user what to set.
	#[error("{message}")]
	ConfigurationMissing {
		/// Reason reported by the adapter.
		message: String,
		/// Actionable next step.
		guidance: String,
	},
	/// Provider-side failure.
	#[error("{message}")]
	Provider {
		/// Provider-supplied message.
		message: String,
	},
	/// The user declined.
	#[error("Access was denied: {message}")]
	Denied {
		/// Provider-supplied message.
		message: String,
	},
	/// Network failures exhausted the retry budget.
	#[error("{message} (after {attempts} attempts)")]
	Transport {
		/// Last transport error.
		message: String,
		/// Consecutive failed attempts.
		attempts: u32,
	},
}
impl FlowFailure {
	/// Classifies a `start_device_flow` error for `provider`.
	///
	/// Missing-configuration reasons are recognized even when an adapter reports them as a
	/// generic provider failure, so the user always gets setup guidance for them.
	pub fn from_start_error(provider: &ProviderId, err: &Error) -> Self {
		match err {
			Error::NotSupported => Self::NotSupported,
			Error::ConfigurationMissing { reason } => Self::configuration(provider, reason.clone()),
			Error::Config(inner) => Self::configuration(provider, inner.to_string()),
			Error::Transient(_) | Error::Transport(_) =>
				Self::Transport { message: err.to_string(), attempts: 1 },
			Error::Provider { reason } => {
				let lowered = reason.to_ascii_lowercase();

				if CONFIG_MARKERS.iter().any(|marker| lowered.contains(marker)) {
					Self::configuration(provider, reason.clone())
				} else {
					Self::Provider { message: reason.clone() }
				}
			},
			Error::UnsupportedFlow { .. } => Self::Provider { message: err.to_string() },
		}
	}

	fn configuration(provider: &ProviderId, message: String) -> Self {
		let prefix = provider.to_ascii_uppercase().replace(['-', '.'], "_");
		let guidance = format!(
			"Set {prefix}_CLIENT_ID, {prefix}_DEVICE_AUTH_URL, and {prefix}_DEVICE_TOKEN_URL (or configure `{provider}` in settings), then try again."
		);

		Self::ConfigurationMissing { message, guidance }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn provider() -> ProviderId {
		ProviderId::new("qwen").expect("Provider fixture should be valid.")
	}

	#[test]
	fn start_errors_are_classified() {
		let failure = FlowFailure::from_start_error(&provider(), &Error::Provider {
			reason: "QWEN_CLIENT_ID environment variable is required.".into(),
		});

		match failure {
			FlowFailure::ConfigurationMissing { guidance, .. } => {
				assert!(guidance.contains("QWEN_CLIENT_ID"));
			},
			other => panic!("Unexpected failure: {other:?}."),
		}

		assert_eq!(
			FlowFailure::from_start_error(&provider(), &Error::NotSupported),
			FlowFailure::NotSupported
		);
		assert_eq!(
			FlowFailure::from_start_error(&provider(), &Error::Provider { reason: "boom".into() }),
			FlowFailure::Provider { message: "boom".into() }
		);
	}

	#[test]
	fn poll_statuses_map_to_outcomes() {
		assert_eq!(FlowOutcome::from_poll_status(PollStatus::Pending), None);
		assert_eq!(
			FlowOutcome::from_poll_status(PollStatus::Expired { message: "gone".into() }),
			Some(FlowOutcome::Expired)
		);
		assert_eq!(
			FlowOutcome::from_poll_status(PollStatus::Denied { message: "no".into() })
				.map(|outcome| outcome.label()),
			Some("error")
		);
	}
}

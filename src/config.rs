//! Gate-wide settings.

// self
use crate::{_prelude::*, auth::ProviderId, error::ConfigError, flows::PollPolicy};

/// Settings shared by every controller and the status aggregator.
///
/// Every field has a default, so `{}` is a valid document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
	/// Provider to prefer when several are connected.
	pub preferred_provider: Option<ProviderId>,
	/// Poll interval tuning.
	pub poll: PollPolicy,
	/// Per-provider `get_status` timeout.
	pub status_timeout_ms: u64,
}
impl GateConfig {
	/// Parses a JSON document, reporting the offending path on failure.
	pub fn from_json_str(raw: &str) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_str(raw);

		serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::Parse { source }.into())
	}

	/// Status timeout as a duration.
	pub fn status_timeout(&self) -> StdDuration {
		StdDuration::from_millis(self.status_timeout_ms)
	}
}
impl Default for GateConfig {
	fn default() -> Self {
		Self { preferred_provider: None, poll: PollPolicy::default(), status_timeout_ms: 10_000 }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn empty_document_yields_defaults() {
		let config = GateConfig::from_json_str("{}").expect("Empty config should parse.");

		assert_eq!(config, GateConfig::default());
		assert_eq!(config.status_timeout(), StdDuration::from_secs(10));
	}

	#[test]
	fn partial_overrides_keep_other_defaults() {
		let config = GateConfig::from_json_str(
			r#"{"preferred_provider":"gemini","poll":{"slow_down_step_ms":5000}}"#,
		)
		.expect("Partial config should parse.");

		assert_eq!(config.preferred_provider.as_deref(), Some("gemini"));
		assert_eq!(config.poll.slow_down_step_ms, 5_000);
		assert_eq!(config.poll.max_interval_ms, 30_000);
	}

	#[test]
	fn parse_errors_name_the_path() {
		let err = GateConfig::from_json_str(r#"{"preferred_provider":"Not Valid!"}"#)
			.expect_err("Invalid provider ids must be rejected.");

		match err {
			Error::Config(ConfigError::Parse { source }) =>
				assert_eq!(source.path().to_string(), "preferred_provider"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}
}

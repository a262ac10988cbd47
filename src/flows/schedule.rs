//! Poll interval policy and the per-attempt scheduler state machine.
//!
//! [`PollScheduler`] is deliberately clock-free: the controller sleeps for whatever
//! [`PollDecision::Reschedule`] returns, which keeps the interval arithmetic unit-testable.

// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	flows::{FlowFailure, FlowOutcome},
	provider::PollStatus,
};

/// Interval tuning shared by every flow controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
	/// Interval used when the provider does not send one.
	pub default_interval_ms: u64,
	/// Lower clamp for provider-supplied intervals.
	pub min_interval_ms: u64,
	/// Increment applied on every `slow_down`.
	pub slow_down_step_ms: u64,
	/// Upper bound for a single increment.
	pub max_slow_down_step_ms: u64,
	/// Ceiling that `slow_down` increments never cross.
	pub max_interval_ms: u64,
	/// Consecutive transport failures tolerated before the attempt fails.
	pub max_transport_retries: u32,
}
impl PollPolicy {
	/// Resolves the starting interval from the provider's `interval` (seconds).
	pub fn initial_interval(&self, provider_interval_secs: Option<u64>) -> StdDuration {
		let millis = provider_interval_secs
			.map(|secs| secs.saturating_mul(1_000))
			.unwrap_or(self.default_interval_ms);

		StdDuration::from_millis(millis.max(self.min_interval_ms))
	}

	/// Interval after one `slow_down` from `current`.
	pub fn slowed_down(&self, current: StdDuration) -> StdDuration {
		let step = StdDuration::from_millis(self.slow_down_step_ms.min(self.max_slow_down_step_ms));
		let ceiling = StdDuration::from_millis(self.max_interval_ms).max(current);

		current.saturating_add(step).min(ceiling)
	}
}
impl Default for PollPolicy {
	fn default() -> Self {
		Self {
			default_interval_ms: 5_000,
			min_interval_ms: 1_000,
			slow_down_step_ms: 2_000,
			max_slow_down_step_ms: 5_000,
			max_interval_ms: 30_000,
			max_transport_retries: 5,
		}
	}
}

/// What the poll loop does after one poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollDecision {
	/// Poll again after the given delay.
	Reschedule(StdDuration),
	/// Stop polling and report the outcome.
	Finish(FlowOutcome),
}

/// Interval and retry bookkeeping for one attempt.
#[derive(Clone, Debug)]
pub struct PollScheduler {
	provider: ProviderId,
	policy: PollPolicy,
	interval: StdDuration,
	polls: u32,
	consecutive_transport_failures: u32,
}
impl PollScheduler {
	/// Creates a scheduler starting at `initial`.
	pub fn new(provider: ProviderId, policy: PollPolicy, initial: StdDuration) -> Self {
		Self { provider, policy, interval: initial, polls: 0, consecutive_transport_failures: 0 }
	}

	/// Delay before the next poll.
	pub fn interval(&self) -> StdDuration {
		self.interval
	}

	/// Polls observed so far.
	pub fn polls(&self) -> u32 {
		self.polls
	}

	/// Folds one poll result into the schedule.
	pub fn observe(&mut self, result: Result<PollStatus>) -> PollDecision {
		self.polls += 1;

		match result {
			Ok(PollStatus::Pending) => {
				self.consecutive_transport_failures = 0;

				PollDecision::Reschedule(self.interval)
			},
			Ok(PollStatus::SlowDown) => {
				self.consecutive_transport_failures = 0;
				self.interval = self.policy.slowed_down(self.interval);

				PollDecision::Reschedule(self.interval)
			},
			Ok(status) => match FlowOutcome::from_poll_status(status) {
				Some(outcome) => PollDecision::Finish(outcome),
				None => PollDecision::Reschedule(self.interval),
			},
			Err(e) if e.is_retryable() => {
				self.consecutive_transport_failures += 1;

				if self.consecutive_transport_failures >= self.policy.max_transport_retries {
					return PollDecision::Finish(FlowOutcome::Failed(FlowFailure::Transport {
						message: e.to_string(),
						attempts: self.consecutive_transport_failures,
					}));
				}

				tracing::warn!(
					provider = %self.provider,
					attempt = self.consecutive_transport_failures,
					error = %e,
					"Device poll failed; retrying at the current interval."
				);

				PollDecision::Reschedule(self.interval)
			},
			Err(e) => {
				let failure = FlowFailure::from_start_error(&self.provider, &e);

				PollDecision::Finish(FlowOutcome::Failed(failure))
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::TransportError;

	fn scheduler(initial_ms: u64) -> PollScheduler {
		PollScheduler::new(
			ProviderId::new("sched").expect("Provider fixture should be valid."),
			PollPolicy::default(),
			StdDuration::from_millis(initial_ms),
		)
	}

	fn unreachable() -> Error {
		TransportError::Unreachable { message: "offline".into() }.into()
	}

	#[test]
	fn initial_interval_defaults_and_clamps() {
		let policy = PollPolicy::default();

		assert_eq!(policy.initial_interval(None), StdDuration::from_secs(5));
		assert_eq!(policy.initial_interval(Some(0)), StdDuration::from_secs(1));
		assert_eq!(policy.initial_interval(Some(8)), StdDuration::from_secs(8));
	}

	#[test]
	fn pending_keeps_interval_and_slow_down_grows_to_ceiling() {
		let mut scheduler = scheduler(2_000);

		assert_eq!(
			scheduler.observe(Ok(PollStatus::Pending)),
			PollDecision::Reschedule(StdDuration::from_secs(2))
		);
		assert_eq!(
			scheduler.observe(Ok(PollStatus::SlowDown)),
			PollDecision::Reschedule(StdDuration::from_secs(4))
		);

		for _ in 0..20 {
			scheduler.observe(Ok(PollStatus::SlowDown));
		}

		assert_eq!(scheduler.interval(), StdDuration::from_secs(30));
		assert_eq!(scheduler.polls(), 22);
	}

	#[test]
	fn interval_above_ceiling_is_never_lowered() {
		let mut scheduler = scheduler(45_000);

		scheduler.observe(Ok(PollStatus::SlowDown));

		assert_eq!(scheduler.interval(), StdDuration::from_secs(45));
	}

	#[test]
	fn transport_failures_escalate_after_budget() {
		let mut scheduler = scheduler(1_000);

		for _ in 0..4 {
			assert_eq!(
				scheduler.observe(Err(unreachable())),
				PollDecision::Reschedule(StdDuration::from_secs(1))
			);
		}

		match scheduler.observe(Err(unreachable())) {
			PollDecision::Finish(FlowOutcome::Failed(FlowFailure::Transport { attempts, .. })) =>
				assert_eq!(attempts, 5),
			other => panic!("Unexpected decision: {other:?}."),
		}
	}

	#[test]
	fn a_successful_poll_resets_the_transport_budget() {
		let mut scheduler = scheduler(1_000);

		for _ in 0..4 {
			scheduler.observe(Err(unreachable()));
		}

		scheduler.observe(Ok(PollStatus::Pending));

		assert!(matches!(scheduler.observe(Err(unreachable())), PollDecision::Reschedule(_)));
	}
}

//! One-second expiry clock.

// crates.io
use tokio::time::{self, Instant, MissedTickBehavior};
// self
use crate::_prelude::*;

const TICK: StdDuration = StdDuration::from_secs(1);
// Lifetimes are capped at one year so the deadline never overflows the clock.
const MAX_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

/// Countdown seeded from a device code's `expires_in`.
///
/// [`CountdownTimer::run`] consumes the timer, so it can fire at most once and cannot be
/// restarted.
#[derive(Debug)]
pub struct CountdownTimer {
	deadline: Instant,
}
impl CountdownTimer {
	/// Starts counting down from now.
	pub fn new(expires_in_secs: u64) -> Self {
		let lifetime = StdDuration::from_secs(expires_in_secs.min(MAX_LIFETIME_SECS));

		Self { deadline: Instant::now() + lifetime }
	}

	/// Whole seconds left, rounded up.
	pub fn remaining(&self) -> u64 {
		let left = self.deadline.saturating_duration_since(Instant::now());

		left.as_secs() + u64::from(left.subsec_nanos() > 0)
	}

	/// Ticks once per second, calling `on_tick` with the seconds remaining.
	///
	/// Returns true once the deadline is reached, or false as soon as `on_tick` returns false.
	pub async fn run<F>(self, mut on_tick: F) -> bool
	where
		F: FnMut(u64) -> bool,
	{
		let mut ticker = time::interval_at(Instant::now() + TICK, TICK);

		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			if self.remaining() == 0 {
				return true;
			}

			ticker.tick().await;

			let remaining = self.remaining();

			if remaining == 0 {
				return true;
			}
			if !on_tick(remaining) {
				return false;
			}
		}
	}
}

//! End-to-end orchestration of one provider's device flow.
//!
//! A [`FlowController`] owns at most one attempt at a time. Starting an attempt spawns two
//! tasks in the same critical section: the poll loop and the countdown. Whichever reaches a
//! terminal verdict first calls `finish`, which (under the controller lock) checks the attempt
//! counter and the current state, records the outcome, and aborts both tasks. Every later writer
//! sees a terminal state or a newer attempt and becomes a no-op.

// std
use std::collections::VecDeque;
// crates.io
use tokio::{sync::watch, task::AbortHandle, time};
// self
use crate::{
	_prelude::*,
	aggregate::StatusAggregator,
	auth::ProviderId,
	flows::{
		CountdownTimer, DeviceFlowSession, FlowFailure, FlowOutcome, FlowState, PollDecision,
		PollPolicy, PollScheduler, SessionView,
	},
	obs::{self, FlowSpan, FlowStage, StageOutcome},
	provider::ProviderAdapter,
};

/// Receives lifecycle notifications from a [`FlowController`].
///
/// Events are queued while the controller lock is held and delivered after it is released, in
/// the order they happened. Callbacks may call back into the controller (`state`, `cancel`,
/// ...); events raised by such a call are delivered after the current callback returns.
pub trait FlowObserver
where
	Self: Send + Sync,
{
	/// The controller entered `state`.
	fn on_state_change(&self, provider: &ProviderId, state: FlowState) {
		let _ = (provider, state);
	}

	/// One countdown tick; `remaining_secs` is rounded up.
	fn on_tick(&self, provider: &ProviderId, remaining_secs: u64) {
		let _ = (provider, remaining_secs);
	}

	/// The attempt ended. Called exactly once per `start()`.
	fn on_outcome(&self, provider: &ProviderId, outcome: &FlowOutcome) {
		let _ = (provider, outcome);
	}
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;
impl FlowObserver for NoopObserver {}

/// Result of [`FlowController::start`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartReport {
	/// The user code is ready to display; polling has begun.
	AwaitingUser(SessionView),
	/// The attempt ended before reaching the user (unavailable runtime, start failure).
	Finished(FlowOutcome),
	/// An attempt is already starting or awaiting the user.
	AlreadyRunning,
}

/// Builder for [`FlowController`].
pub struct FlowControllerBuilder {
	adapter: Arc<dyn ProviderAdapter>,
	policy: PollPolicy,
	observer: Arc<dyn FlowObserver>,
	aggregator: Option<Arc<StatusAggregator>>,
}
impl FlowControllerBuilder {
	/// Overrides the poll policy.
	pub fn policy(mut self, policy: PollPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Registers an observer.
	pub fn observer(mut self, observer: Arc<dyn FlowObserver>) -> Self {
		self.observer = observer;

		self
	}

	/// Refreshes `aggregator` after every successful attempt.
	pub fn aggregator(mut self, aggregator: Arc<StatusAggregator>) -> Self {
		self.aggregator = Some(aggregator);

		self
	}

	/// Creates the controller in [`FlowState::Idle`].
	pub fn build(self) -> FlowController {
		let (outcome_tx, _) = watch::channel(None);

		FlowController {
			shared: Arc::new(FlowShared {
				adapter: self.adapter,
				policy: self.policy,
				observer: self.observer,
				aggregator: self.aggregator,
				inner: Mutex::new(FlowInner::default()),
				events: Mutex::new(VecDeque::new()),
				dispatching: Mutex::new(()),
				outcome_tx,
			}),
		}
	}
}

/// Drives one provider's device flow and reports exactly one outcome per attempt.
pub struct FlowController {
	shared: Arc<FlowShared>,
}
impl FlowController {
	/// Starts building a controller for `adapter`.
	pub fn builder(adapter: Arc<dyn ProviderAdapter>) -> FlowControllerBuilder {
		FlowControllerBuilder {
			adapter,
			policy: PollPolicy::default(),
			observer: Arc::new(NoopObserver),
			aggregator: None,
		}
	}

	/// Creates a controller with the default policy and no observer.
	pub fn new(adapter: Arc<dyn ProviderAdapter>) -> Self {
		Self::builder(adapter).build()
	}

	/// Provider this controller drives.
	pub fn provider(&self) -> &ProviderId {
		self.shared.adapter.id()
	}

	/// Current state.
	pub fn state(&self) -> FlowState {
		self.shared.inner.lock().state
	}

	/// Snapshot of the current (or last) session, if one was created.
	pub fn session(&self) -> Option<SessionView> {
		self.shared.inner.lock().session.as_ref().map(DeviceFlowSession::view)
	}

	/// Begins a new attempt.
	///
	/// Start failures never surface as `Err`; they end the attempt and come back as
	/// [`StartReport::Finished`].
	pub async fn start(&self) -> StartReport {
		let shared = &self.shared;
		let provider = shared.adapter.id();
		let attempt = {
			let mut inner = shared.inner.lock();

			if inner.state.is_running() {
				return StartReport::AlreadyRunning;
			}

			inner.attempt += 1;
			inner.session = None;

			if !shared.adapter.is_available() {
				let outcome = FlowOutcome::Failed(FlowFailure::NotSupported);

				shared.finish_locked(&mut inner, outcome.clone());
				drop(inner);
				shared.dispatch();

				return StartReport::Finished(outcome);
			}

			inner.state = FlowState::Starting;
			shared.emit(FlowEvent::State(FlowState::Starting));

			inner.attempt
		};

		shared.dispatch();

		let span = FlowSpan::new(FlowStage::StartDeviceFlow, provider);

		obs::record_stage(FlowStage::StartDeviceFlow, StageOutcome::Attempt);

		let result = span.instrument(shared.adapter.start_device_flow()).await;

		obs::record_stage(FlowStage::StartDeviceFlow, StageOutcome::of(&result));

		let authorization = match result {
			Ok(authorization) => authorization,
			Err(e) => {
				tracing::warn!(provider = %provider, error = %e, "Device flow could not start.");

				let outcome = FlowOutcome::Failed(FlowFailure::from_start_error(provider, &e));

				shared.finish(attempt, outcome.clone());

				return StartReport::Finished(outcome);
			},
		};
		let interval = shared.policy.initial_interval(authorization.interval);
		let expires_in = authorization.expires_in;
		let mut inner = shared.inner.lock();

		if inner.attempt != attempt || inner.state != FlowState::Starting {
			return StartReport::AlreadyRunning;
		}

		let session = DeviceFlowSession::new(authorization, interval, OffsetDateTime::now_utc());
		let view = session.view();

		inner.session = Some(session);
		inner.state = FlowState::AwaitingUser;
		shared.emit(FlowEvent::State(FlowState::AwaitingUser));

		let scheduler = PollScheduler::new(provider.clone(), shared.policy.clone(), interval);

		inner.timers.poll =
			Some(tokio::spawn(poll_loop(shared.clone(), attempt, scheduler)).abort_handle());
		inner.timers.countdown = Some(
			tokio::spawn(countdown(shared.clone(), attempt, CountdownTimer::new(expires_in)))
				.abort_handle(),
		);

		tracing::debug!(
			provider = %provider,
			attempt,
			expires_in,
			interval_ms = view.poll_interval_ms,
			"Device flow awaiting user."
		);
		drop(inner);
		shared.dispatch();

		StartReport::AwaitingUser(view)
	}

	/// Cancels the attempt awaiting the user. Returns false (and does nothing) in any other
	/// state, so repeated calls are harmless.
	pub fn cancel(&self) -> bool {
		let mut inner = self.shared.inner.lock();

		if inner.state != FlowState::AwaitingUser {
			return false;
		}

		self.shared.finish_locked(&mut inner, FlowOutcome::Cancelled);
		drop(inner);
		self.shared.dispatch();

		true
	}

	/// Waits for the terminal outcome of the current attempt.
	///
	/// Returns `None` when nothing was ever started.
	pub async fn outcome(&self) -> Option<FlowOutcome> {
		let attempt = {
			let inner = self.shared.inner.lock();

			if inner.state == FlowState::Idle {
				return None;
			}

			inner.attempt
		};
		let mut rx = self.shared.outcome_tx.subscribe();
		let reported = rx
			.wait_for(|reported| reported.as_ref().is_some_and(|(seen, _)| *seen >= attempt))
			.await
			.ok()?;

		reported.as_ref().map(|(_, outcome)| outcome.clone())
	}
}
impl Drop for FlowController {
	fn drop(&mut self) {
		self.shared.inner.lock().timers.stop();
	}
}
impl Debug for FlowController {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let inner = self.shared.inner.lock();

		f.debug_struct("FlowController")
			.field("provider", self.shared.adapter.id())
			.field("attempt", &inner.attempt)
			.field("state", &inner.state)
			.finish()
	}
}

struct FlowShared {
	adapter: Arc<dyn ProviderAdapter>,
	policy: PollPolicy,
	observer: Arc<dyn FlowObserver>,
	aggregator: Option<Arc<StatusAggregator>>,
	inner: Mutex<FlowInner>,
	// Observer events in the order they happened; filled under `inner`, drained without it.
	events: Mutex<VecDeque<FlowEvent>>,
	dispatching: Mutex<()>,
	outcome_tx: watch::Sender<Option<(u64, FlowOutcome)>>,
}
impl FlowShared {
	fn finish(&self, attempt: u64, outcome: FlowOutcome) -> bool {
		let mut inner = self.inner.lock();

		if inner.attempt != attempt || !inner.state.is_running() {
			tracing::debug!(
				provider = %self.adapter.id(),
				attempt,
				outcome = outcome.label(),
				"Discarding a late terminal event."
			);

			return false;
		}

		self.finish_locked(&mut inner, outcome);
		drop(inner);
		self.dispatch();

		true
	}

	fn finish_locked(&self, inner: &mut FlowInner, outcome: FlowOutcome) {
		let provider = self.adapter.id();
		let state = outcome.state();

		inner.timers.stop();
		inner.state = state;

		if let Some(session) = inner.session.as_mut() {
			session.finish(state);
		}

		tracing::info!(provider = %provider, outcome = outcome.label(), "Device flow finished.");
		obs::record_terminal(outcome.label());
		self.emit(FlowEvent::State(state));
		self.emit(FlowEvent::Outcome(outcome.clone()));

		if outcome.is_success()
			&& let Some(aggregator) = self.aggregator.clone()
		{
			tokio::spawn(async move {
				aggregator.refresh().await;
			});
		}

		self.outcome_tx.send_replace(Some((inner.attempt, outcome)));
	}

	fn emit(&self, event: FlowEvent) {
		self.events.lock().push_back(event);
	}

	// Must be called without `inner` held. A nested call (an observer calling back into the
	// controller) finds `dispatching` taken and leaves its events to the outer loop.
	fn dispatch(&self) {
		let provider = self.adapter.id();

		loop {
			let Some(guard) = self.dispatching.try_lock() else {
				return;
			};

			loop {
				let Some(event) = self.events.lock().pop_front() else {
					break;
				};

				match event {
					FlowEvent::State(state) => self.observer.on_state_change(provider, state),
					FlowEvent::Tick(remaining) => self.observer.on_tick(provider, remaining),
					FlowEvent::Outcome(outcome) => self.observer.on_outcome(provider, &outcome),
				}
			}

			drop(guard);

			if self.events.lock().is_empty() {
				return;
			}
		}
	}
}

enum FlowEvent {
	State(FlowState),
	Tick(u64),
	Outcome(FlowOutcome),
}

#[derive(Default)]
struct FlowInner {
	attempt: u64,
	state: FlowState,
	session: Option<DeviceFlowSession>,
	timers: FlowTimers,
}
impl FlowInner {
	fn is_current(&self, attempt: u64) -> bool {
		self.attempt == attempt && self.state == FlowState::AwaitingUser
	}
}

#[derive(Default)]
struct FlowTimers {
	poll: Option<AbortHandle>,
	countdown: Option<AbortHandle>,
}
impl FlowTimers {
	fn stop(&mut self) {
		if let Some(poll) = self.poll.take() {
			poll.abort();
		}
		if let Some(countdown) = self.countdown.take() {
			countdown.abort();
		}
	}
}

async fn poll_loop(shared: Arc<FlowShared>, attempt: u64, mut scheduler: PollScheduler) {
	let provider = shared.adapter.id().clone();
	let mut delay = scheduler.interval();

	loop {
		time::sleep(delay).await;

		let device_code = {
			let inner = shared.inner.lock();

			match inner.session.as_ref() {
				Some(session) if inner.is_current(attempt) => session.device_code().clone(),
				_ => return,
			}
		};
		let span = FlowSpan::new(FlowStage::PollDeviceFlow, &provider);

		obs::record_stage(FlowStage::PollDeviceFlow, StageOutcome::Attempt);

		let result = span.instrument(shared.adapter.poll_device_flow(&device_code)).await;

		obs::record_stage(FlowStage::PollDeviceFlow, StageOutcome::of(&result));

		match scheduler.observe(result) {
			PollDecision::Reschedule(next) => {
				let mut inner = shared.inner.lock();

				if !inner.is_current(attempt) {
					tracing::debug!(provider = %provider, attempt, "Discarding a late poll result.");

					return;
				}
				if let Some(session) = inner.session.as_mut() {
					delay = session.raise_poll_interval(next);
				}
			},
			PollDecision::Finish(outcome) => {
				shared.finish(attempt, outcome);

				return;
			},
		}
	}
}

async fn countdown(shared: Arc<FlowShared>, attempt: u64, timer: CountdownTimer) {
	let expired = timer
		.run(|remaining| {
			let inner = shared.inner.lock();

			if !inner.is_current(attempt) {
				return false;
			}

			shared.emit(FlowEvent::Tick(remaining));
			drop(inner);
			shared.dispatch();

			true
		})
		.await;

	if expired {
		shared.finish(attempt, FlowOutcome::Expired);
	}
}

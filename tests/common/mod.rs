//! Scripted adapters and recording observers shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	future,
	sync::atomic::{AtomicUsize, Ordering},
	time::Duration,
};
// crates.io
use parking_lot::Mutex;
use tokio::time::Instant;
// self
use oauth2_device_gate::{
	auth::{AuthStatus, DeviceCode, ProviderId, TokenSecret},
	error::{Error, TransportError},
	flows::{FlowObserver, FlowOutcome, FlowState},
	provider::{AdapterFuture, DeviceAuthorization, PollStatus, ProviderAdapter},
};

pub fn id(value: &str) -> ProviderId {
	ProviderId::new(value).expect("Provider fixture should be valid.")
}

pub fn authorization(expires_in: u64, interval: Option<u64>) -> DeviceAuthorization {
	DeviceAuthorization {
		device_code: DeviceCode::new("device-code-1"),
		user_code: "WDJB-MJHT".into(),
		verification_uri: "https://example.com/device".into(),
		verification_uri_complete: Some("https://example.com/device?user_code=WDJB-MJHT".into()),
		expires_in,
		interval,
	}
}

/// One scripted poll reply. An exhausted script keeps answering `Pending`.
#[derive(Clone, Copy, Debug)]
pub enum PollStep {
	Pending,
	SlowDown,
	Success,
	Denied(&'static str),
	Expired,
	Fail(&'static str),
	Transport,
	Hang,
}

pub enum StartStep {
	Authorize(DeviceAuthorization),
	ConfigurationMissing(&'static str),
	Provider(&'static str),
}

pub struct ScriptedAdapter {
	id: ProviderId,
	available: bool,
	start: Mutex<VecDeque<StartStep>>,
	polls: Mutex<VecDeque<PollStep>>,
	status: Mutex<Result<AuthStatus, String>>,
	connect_on_success: bool,
	origin: Instant,
	poll_offsets: Mutex<Vec<Duration>>,
	start_calls: AtomicUsize,
	clear_calls: AtomicUsize,
}
impl ScriptedAdapter {
	pub fn new(id_value: &str) -> Self {
		Self {
			id: id(id_value),
			available: true,
			start: Mutex::new(VecDeque::new()),
			polls: Mutex::new(VecDeque::new()),
			status: Mutex::new(Ok(AuthStatus::Disconnected)),
			connect_on_success: true,
			origin: Instant::now(),
			poll_offsets: Mutex::new(Vec::new()),
			start_calls: AtomicUsize::new(0),
			clear_calls: AtomicUsize::new(0),
		}
	}

	pub fn unavailable(mut self) -> Self {
		self.available = false;

		self
	}

	pub fn start_with(self, step: StartStep) -> Self {
		self.start.lock().push_back(step);

		self
	}

	pub fn polls<I>(self, steps: I) -> Self
	where
		I: IntoIterator<Item = PollStep>,
	{
		self.polls.lock().extend(steps);

		self
	}

	pub fn status(self, status: Result<AuthStatus, String>) -> Self {
		*self.status.lock() = status;

		self
	}

	pub fn set_status(&self, status: Result<AuthStatus, String>) {
		*self.status.lock() = status;
	}

	/// Offsets (from adapter creation) at which polls were issued.
	pub fn poll_offsets(&self) -> Vec<Duration> {
		self.poll_offsets.lock().clone()
	}

	pub fn poll_count(&self) -> usize {
		self.poll_offsets.lock().len()
	}

	pub fn start_calls(&self) -> usize {
		self.start_calls.load(Ordering::SeqCst)
	}

	pub fn clear_calls(&self) -> usize {
		self.clear_calls.load(Ordering::SeqCst)
	}
}
impl ProviderAdapter for ScriptedAdapter {
	fn id(&self) -> &ProviderId {
		&self.id
	}

	fn is_available(&self) -> bool {
		self.available
	}

	fn start_device_flow(&self) -> AdapterFuture<'_, DeviceAuthorization> {
		Box::pin(async move {
			self.start_calls.fetch_add(1, Ordering::SeqCst);

			match self.start.lock().pop_front() {
				Some(StartStep::Authorize(authorization)) => Ok(authorization),
				Some(StartStep::ConfigurationMissing(reason)) =>
					Err(Error::ConfigurationMissing { reason: reason.into() }),
				Some(StartStep::Provider(reason)) => Err(Error::Provider { reason: reason.into() }),
				None => Ok(authorization(900, Some(5))),
			}
		})
	}

	fn poll_device_flow<'a>(
		&'a self,
		_device_code: &'a DeviceCode,
	) -> AdapterFuture<'a, PollStatus> {
		Box::pin(async move {
			self.poll_offsets.lock().push(Instant::now() - self.origin);

			let step = self.polls.lock().pop_front().unwrap_or(PollStep::Pending);

			match step {
				PollStep::Pending => Ok(PollStatus::Pending),
				PollStep::SlowDown => Ok(PollStatus::SlowDown),
				PollStep::Success => {
					if self.connect_on_success {
						*self.status.lock() = Ok(AuthStatus::Connected);
					}

					Ok(PollStatus::Success { token: Some(TokenSecret::new("access-token")) })
				},
				PollStep::Denied(message) => Ok(PollStatus::Denied { message: message.into() }),
				PollStep::Expired => Ok(PollStatus::Expired { message: "expired_token".into() }),
				PollStep::Fail(message) => Ok(PollStatus::Error { message: message.into() }),
				PollStep::Transport =>
					Err(TransportError::Unreachable { message: "offline".into() }.into()),
				PollStep::Hang => future::pending().await,
			}
		})
	}

	fn get_status(&self) -> AdapterFuture<'_, AuthStatus> {
		Box::pin(async move {
			self.status.lock().clone().map_err(|reason| Error::Provider { reason })
		})
	}

	fn clear_session(&self) -> AdapterFuture<'_, ()> {
		Box::pin(async move {
			self.clear_calls.fetch_add(1, Ordering::SeqCst);
			*self.status.lock() = Ok(AuthStatus::Disconnected);

			Ok(())
		})
	}
}

/// Status-only adapter that never answers.
pub struct HangingStatusAdapter {
	pub id: ProviderId,
}
impl ProviderAdapter for HangingStatusAdapter {
	fn id(&self) -> &ProviderId {
		&self.id
	}

	fn start_device_flow(&self) -> AdapterFuture<'_, DeviceAuthorization> {
		Box::pin(future::pending())
	}

	fn poll_device_flow<'a>(
		&'a self,
		_device_code: &'a DeviceCode,
	) -> AdapterFuture<'a, PollStatus> {
		Box::pin(future::pending())
	}

	fn get_status(&self) -> AdapterFuture<'_, AuthStatus> {
		Box::pin(future::pending())
	}

	fn clear_session(&self) -> AdapterFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}
}

#[derive(Default)]
pub struct RecordingObserver {
	pub states: Mutex<Vec<FlowState>>,
	pub ticks: Mutex<Vec<u64>>,
	pub outcomes: Mutex<Vec<FlowOutcome>>,
}
impl RecordingObserver {
	pub fn outcomes(&self) -> Vec<FlowOutcome> {
		self.outcomes.lock().clone()
	}

	pub fn states(&self) -> Vec<FlowState> {
		self.states.lock().clone()
	}

	pub fn ticks(&self) -> Vec<u64> {
		self.ticks.lock().clone()
	}
}
impl FlowObserver for RecordingObserver {
	fn on_state_change(&self, _provider: &ProviderId, state: FlowState) {
		self.states.lock().push(state);
	}

	fn on_tick(&self, _provider: &ProviderId, remaining_secs: u64) {
		self.ticks.lock().push(remaining_secs);
	}

	fn on_outcome(&self, _provider: &ProviderId, outcome: &FlowOutcome) {
		self.outcomes.lock().push(outcome.clone());
	}
}

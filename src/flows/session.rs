//! One in-flight device authorization attempt.

// self
use crate::{_prelude::*, auth::DeviceCode, provider::DeviceAuthorization};

/// Lifecycle state of a flow controller and its session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
	/// Nothing has been started yet.
	#[default]
	Idle,
	/// Waiting on the provider for a device code.
	Starting,
	/// The user code is displayed; polling and the countdown are running.
	AwaitingUser,
	/// The user approved the request.
	Succeeded,
	/// The attempt failed.
	Failed,
	/// The device code lapsed before the user finished.
	Expired,
	/// The user cancelled.
	Cancelled,
}
impl FlowState {
	/// Returns true for states that end an attempt.
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Succeeded | Self::Failed | Self::Expired | Self::Cancelled)
	}

	/// Returns true while an attempt is underway.
	pub const fn is_running(self) -> bool {
		matches!(self, Self::Starting | Self::AwaitingUser)
	}

	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Starting => "starting",
			Self::AwaitingUser => "awaiting_user",
			Self::Succeeded => "succeeded",
			Self::Failed => "failed",
			Self::Expired => "expired",
			Self::Cancelled => "cancelled",
		}
	}
}
impl Display for FlowState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Record of one device authorization attempt.
///
/// Everything except `poll_interval` and `state` is fixed at creation. The interval only ever
/// grows and the state only ever moves from `AwaitingUser` to a terminal value.
#[derive(Clone, Debug)]
pub struct DeviceFlowSession {
	device_code: DeviceCode,
	user_code: String,
	verification_uri: String,
	verification_uri_complete: Option<String>,
	expires_in: u64,
	expires_at: OffsetDateTime,
	poll_interval: StdDuration,
	state: FlowState,
}
impl DeviceFlowSession {
	/// Creates a session in [`FlowState::AwaitingUser`]; `expires_at` is computed once here.
	pub fn new(
		authorization: DeviceAuthorization,
		poll_interval: StdDuration,
		now: OffsetDateTime,
	) -> Self {
		let expires_in = authorization.expires_in;
		let lifetime = Duration::seconds(i64::try_from(expires_in).unwrap_or(i64::MAX));

		Self {
			device_code: authorization.device_code,
			user_code: authorization.user_code,
			verification_uri: authorization.verification_uri,
			verification_uri_complete: authorization.verification_uri_complete,
			expires_in,
			expires_at: now.saturating_add(lifetime),
			poll_interval,
			state: FlowState::AwaitingUser,
		}
	}

	/// Device code sent on every poll.
	pub fn device_code(&self) -> &DeviceCode {
		&self.device_code
	}

	/// Code the user types on the verification page.
	pub fn user_code(&self) -> &str {
		&self.user_code
	}

	/// Absolute expiry instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// Current poll interval.
	pub fn poll_interval(&self) -> StdDuration {
		self.poll_interval
	}

	/// Current state.
	pub fn state(&self) -> FlowState {
		self.state
	}

	/// Raises the poll interval to `interval`; smaller values are ignored.
	pub fn raise_poll_interval(&mut self, interval: StdDuration) -> StdDuration {
		self.poll_interval = self.poll_interval.max(interval);

		self.poll_interval
	}

	/// Moves the session to a terminal state. Returns false when it already was terminal.
	pub fn finish(&mut self, state: FlowState) -> bool {
		if self.state.is_terminal() || !state.is_terminal() {
			return false;
		}

		self.state = state;

		true
	}

	/// Secret-free snapshot for presentation layers.
	pub fn view(&self) -> SessionView {
		SessionView {
			user_code: self.user_code.clone(),
			verification_uri: self.verification_uri.clone(),
			verification_uri_complete: self.verification_uri_complete.clone(),
			expires_in: self.expires_in,
			expires_at: self.expires_at,
			poll_interval_ms: u64::try_from(self.poll_interval.as_millis()).unwrap_or(u64::MAX),
			state: self.state,
		}
	}
}

/// Presentation snapshot of a [`DeviceFlowSession`]. Never carries the device code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionView {
	/// Code the user types on the verification page.
	pub user_code: String,
	/// Verification page.
	pub verification_uri: String,
	/// Verification page with the code pre-filled, when available.
	pub verification_uri_complete: Option<String>,
	/// Lifetime granted by the provider, in seconds.
	pub expires_in: u64,
	/// Absolute expiry instant.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
	/// Poll interval at the time of the snapshot.
	pub poll_interval_ms: u64,
	/// Session state at the time of the snapshot.
	pub state: FlowState,
}
impl SessionView {
	/// URI to show the user: the pre-filled variant when present.
	pub fn display_uri(&self) -> &str {
		self.verification_uri_complete.as_deref().unwrap_or(&self.verification_uri)
	}

	/// Text to encode into a QR code. Rasterization is left to the caller.
	pub fn qr_payload(&self) -> &str {
		self.display_uri()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn session() -> DeviceFlowSession {
		DeviceFlowSession::new(
			DeviceAuthorization {
				device_code: DeviceCode::new("dev-code"),
				user_code: "ABCD-EFGH".into(),
				verification_uri: "https://example.com/device".into(),
				verification_uri_complete: None,
				expires_in: 600,
				interval: Some(5),
			},
			StdDuration::from_secs(5),
			OffsetDateTime::UNIX_EPOCH,
		)
	}

	#[test]
	fn expiry_and_interval_follow_invariants() {
		let mut session = session();

		assert_eq!(session.expires_at(), OffsetDateTime::UNIX_EPOCH + Duration::seconds(600));
		assert_eq!(session.state(), FlowState::AwaitingUser);
		assert_eq!(session.raise_poll_interval(StdDuration::from_secs(2)), StdDuration::from_secs(5));
		assert_eq!(session.raise_poll_interval(StdDuration::from_secs(7)), StdDuration::from_secs(7));
	}

	#[test]
	fn terminal_state_is_sticky() {
		let mut session = session();

		assert!(!session.finish(FlowState::Idle));
		assert!(session.finish(FlowState::Cancelled));
		assert!(!session.finish(FlowState::Succeeded));
		assert_eq!(session.state(), FlowState::Cancelled);
	}

	#[test]
	fn view_hides_device_code_and_prefers_complete_uri() {
		let mut session = session();

		session.verification_uri_complete = Some("https://example.com/device?code=ABCD-EFGH".into());

		let view = session.view();
		let json = serde_json::to_string(&view).expect("View should serialize.");

		assert!(!json.contains("dev-code"));
		assert_eq!(view.qr_payload(), "https://example.com/device?code=ABCD-EFGH");
		assert_eq!(view.poll_interval_ms, 5_000);
	}
}

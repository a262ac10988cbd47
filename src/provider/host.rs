//! Adapter over a host runtime that owns the provider's device flow.
//!
//! Some providers are driven by an embedding application (a desktop shell, a plugin host) that
//! exposes four loosely typed calls. [`HostAdapter`] forwards to them and tightens every string
//! the host returns into the crate's typed vocabulary once, at this boundary.

// self
use crate::{
	_prelude::*,
	auth::{AuthStatus, DeviceCode, ProviderId},
	error::TransportError,
	provider::{AdapterFuture, DeviceAuthorization, PollStatus, ProviderAdapter},
};

/// Boxed future returned by [`HostRuntime`] calls. Host failures are plain strings.
pub type HostFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, String>> + 'a + Send>>;

/// Calls exposed by the host runtime for one provider.
pub trait HostRuntime
where
	Self: Send + Sync,
{
	/// Begins a device authorization on the host side.
	fn start_device_auth(&self) -> HostFuture<'_, HostDeviceStart>;

	/// Polls the host once for `device_code`.
	fn poll_device_auth<'a>(&'a self, device_code: &'a str) -> HostFuture<'a, HostPollReply>;

	/// Returns the host's free-form status label (e.g. `"Authenticated (OAuth token)"`).
	fn get_auth_status(&self) -> HostFuture<'_, String>;

	/// Clears whatever credential the host holds.
	fn clear_auth(&self) -> HostFuture<'_, ()>;
}

/// Device start payload as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDeviceStart {
	/// Opaque device code.
	pub device_code: String,
	/// Code shown to the user.
	pub user_code: String,
	/// Verification page.
	pub verification_uri: String,
	/// Device code lifetime in seconds.
	pub expires_in: u64,
	/// Requested poll interval in seconds.
	#[serde(default)]
	pub interval: Option<u64>,
}

/// Poll reply as reported by the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPollReply {
	/// Loose status string (`pending`, `slow_down`, `success`, `denied`, `error`, ...).
	pub status: String,
	/// Optional detail accompanying the status.
	#[serde(default)]
	pub message: Option<String>,
}
impl HostPollReply {
	/// Converts the loose reply into a typed [`PollStatus`].
	pub fn into_poll_status(self) -> PollStatus {
		let status = self.status.trim().to_ascii_lowercase();
		let message = self.message.unwrap_or_else(|| status.clone());

		match status.as_str() {
			"pending" | "authorization_pending" => PollStatus::Pending,
			"slow_down" => PollStatus::SlowDown,
			"success" | "complete" | "completed" => PollStatus::Success { token: None },
			"denied" | "access_denied" => PollStatus::Denied { message },
			"expired" | "expired_token" => PollStatus::Expired { message },
			_ if message.to_ascii_lowercase().contains("expired") =>
				PollStatus::Expired { message },
			_ => PollStatus::Error { message },
		}
	}
}

/// Provider adapter that forwards to a [`HostRuntime`].
#[derive(Clone)]
pub struct HostAdapter {
	id: ProviderId,
	runtime: Option<Arc<dyn HostRuntime>>,
}
impl HostAdapter {
	/// Creates an adapter bound to a live host runtime.
	pub fn new(id: ProviderId, runtime: Arc<dyn HostRuntime>) -> Self {
		Self { id, runtime: Some(runtime) }
	}

	/// Creates an adapter for a context where the host runtime is absent (e.g. a plain browser
	/// build). Every call fails with [`Error::NotSupported`].
	pub fn unavailable(id: ProviderId) -> Self {
		Self { id, runtime: None }
	}

	fn runtime(&self) -> Result<&Arc<dyn HostRuntime>> {
		self.runtime.as_ref().ok_or(Error::NotSupported)
	}
}
impl ProviderAdapter for HostAdapter {
	fn id(&self) -> &ProviderId {
		&self.id
	}

	fn is_available(&self) -> bool {
		self.runtime.is_some()
	}

	fn start_device_flow(&self) -> AdapterFuture<'_, DeviceAuthorization> {
		Box::pin(async move {
			let start = self.runtime()?.start_device_auth().await.map_err(classify_host_error)?;

			Ok(DeviceAuthorization {
				device_code: DeviceCode::new(start.device_code),
				user_code: start.user_code,
				verification_uri: start.verification_uri,
				verification_uri_complete: None,
				expires_in: start.expires_in,
				interval: start.interval,
			})
		})
	}

	fn poll_device_flow<'a>(
		&'a self,
		device_code: &'a DeviceCode,
	) -> AdapterFuture<'a, PollStatus> {
		Box::pin(async move {
			let reply = self
				.runtime()?
				.poll_device_auth(device_code.expose())
				.await
				.map_err(classify_host_error)?;

			Ok(reply.into_poll_status())
		})
	}

	fn get_status(&self) -> AdapterFuture<'_, AuthStatus> {
		Box::pin(async move {
			let label = self.runtime()?.get_auth_status().await.map_err(classify_host_error)?;

			Ok(AuthStatus::from_host_label(&label))
		})
	}

	fn clear_session(&self) -> AdapterFuture<'_, ()> {
		Box::pin(async move {
			let Some(runtime) = self.runtime.as_ref() else {
				return Ok(());
			};

			if let Err(message) = runtime.clear_auth().await {
				tracing::warn!(
					provider = %self.id,
					error = %message,
					"Host failed to clear the session; treating it as cleared."
				);
			}

			Ok(())
		})
	}
}
impl Debug for HostAdapter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HostAdapter")
			.field("id", &self.id)
			.field("available", &self.runtime.is_some())
			.finish()
	}
}

const CONFIG_MARKERS: &[&str] =
	&["environment variable", "not configured", "client_id", "client id", "missing credentials"];
const NETWORK_MARKERS: &[&str] =
	&["network", "timed out", "timeout", "connection", "dns", "unreachable"];

/// Classifies a host error string into the crate taxonomy.
pub fn classify_host_error(message: String) -> Error {
	let lowered = message.to_ascii_lowercase();

	if CONFIG_MARKERS.iter().any(|marker| lowered.contains(marker)) {
		Error::ConfigurationMissing { reason: message }
	} else if NETWORK_MARKERS.iter().any(|marker| lowered.contains(marker)) {
		TransportError::Unreachable { message }.into()
	} else {
		Error::Provider { reason: message }
	}
}

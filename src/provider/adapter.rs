//! The capability contract every identity provider implements.

// self
use crate::{
	_prelude::*,
	auth::{AuthStatus, DeviceCode, ProviderId, TokenSecret},
};

/// Boxed future returned by [`ProviderAdapter`] methods.
pub type AdapterFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Capability set shared by every identity provider.
///
/// Adapters hide provider-specific transport and never schedule retries themselves; the flow
/// controller owns all timing decisions. Implementations must be `Send + Sync` so one adapter
/// can back both a running flow and the status aggregator.
pub trait ProviderAdapter
where
	Self: Send + Sync,
{
	/// Identifier of the provider this adapter speaks for.
	fn id(&self) -> &ProviderId;

	/// Returns false when the runtime this adapter needs is absent.
	///
	/// The flow controller checks this before calling
	/// [`start_device_flow`](ProviderAdapter::start_device_flow) and fails fast with
	/// `NotSupported`.
	fn is_available(&self) -> bool {
		true
	}

	/// Requests a fresh device code.
	fn start_device_flow(&self) -> AdapterFuture<'_, DeviceAuthorization>;

	/// Polls the token endpoint once for `device_code`.
	///
	/// Network failures are reported as `Err` with a retryable [`Error`]; provider verdicts are
	/// reported as `Ok` with the matching [`PollStatus`].
	fn poll_device_flow<'a>(&'a self, device_code: &'a DeviceCode)
	-> AdapterFuture<'a, PollStatus>;

	/// Reports whether a usable credential exists.
	fn get_status(&self) -> AdapterFuture<'_, AuthStatus>;

	/// Forgets (and where possible revokes) the current credential. Must be idempotent.
	fn clear_session(&self) -> AdapterFuture<'_, ()>;
}

/// Device code response normalized across providers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceAuthorization {
	/// Code sent back on every poll.
	pub device_code: DeviceCode,
	/// Short code the user types on the verification page.
	pub user_code: String,
	/// Page the user must open.
	pub verification_uri: String,
	/// Verification page with the user code pre-filled, when the provider offers one.
	pub verification_uri_complete: Option<String>,
	/// Lifetime of the device code in seconds.
	pub expires_in: u64,
	/// Provider-requested poll interval in seconds.
	pub interval: Option<u64>,
}

/// Result of a single poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollStatus {
	/// The user has not finished signing in yet.
	Pending,
	/// The provider asked the client to poll less often.
	SlowDown,
	/// The user approved the request.
	Success {
		/// Issued access token, when the adapter hands it back. Host-managed providers keep the
		/// token on their side and report `None`.
		token: Option<TokenSecret>,
	},
	/// The user declined the request.
	Denied {
		/// Provider-supplied message.
		message: String,
	},
	/// The provider considers the device code expired.
	Expired {
		/// Provider-supplied message.
		message: String,
	},
	/// Any other provider-side failure.
	Error {
		/// Provider-supplied message.
		message: String,
	},
}
impl PollStatus {
	/// Returns a stable label suitable for logs and metric fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::SlowDown => "slow_down",
			Self::Success { .. } => "success",
			Self::Denied { .. } => "denied",
			Self::Expired { .. } => "expired",
			Self::Error { .. } => "error",
		}
	}

	/// Maps an RFC 8628 `error` code (plus optional description) onto a poll status.
	pub fn from_oauth_error(code: &str, description: Option<String>) -> Self {
		let message = || description.clone().unwrap_or_else(|| code.to_owned());

		match code {
			"authorization_pending" => Self::Pending,
			"slow_down" => Self::SlowDown,
			"access_denied" => Self::Denied { message: message() },
			"expired_token" | "expired_token_code" => Self::Expired { message: message() },
			_ => Self::Error { message: message() },
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn oauth_error_codes_map_to_poll_statuses() {
		assert_eq!(PollStatus::from_oauth_error("authorization_pending", None), PollStatus::Pending);
		assert_eq!(PollStatus::from_oauth_error("slow_down", None), PollStatus::SlowDown);
		assert_eq!(
			PollStatus::from_oauth_error("access_denied", Some("User said no".into())),
			PollStatus::Denied { message: "User said no".into() }
		);
		assert_eq!(
			PollStatus::from_oauth_error("expired_token", None),
			PollStatus::Expired { message: "expired_token".into() }
		);
		assert_eq!(
			PollStatus::from_oauth_error("invalid_client", Some("Unknown client".into())),
			PollStatus::Error { message: "Unknown client".into() }
		);
	}
}

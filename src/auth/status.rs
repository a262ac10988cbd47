//! Typed authentication status values and the aggregate snapshot built from them.

// self
use crate::{_prelude::*, auth::ProviderId};

/// Connectivity reported by one provider adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
	/// A usable credential is present.
	Connected,
	/// No credential is present, or the credential was rejected.
	Disconnected,
	/// A credential exists but is past its expiry.
	Expired,
	/// The adapter could not determine its status.
	Unknown,
}
impl AuthStatus {
	/// Returns true only for [`AuthStatus::Connected`].
	pub const fn is_connected(self) -> bool {
		matches!(self, Self::Connected)
	}

	/// Returns a stable label suitable for logs and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Connected => "connected",
			Self::Disconnected => "disconnected",
			Self::Expired => "expired",
			Self::Unknown => "unknown",
		}
	}

	/// Classifies a human-readable status label produced by a host runtime.
	///
	/// Host bridges report strings such as `"OAuth Token"`, `"API Key"`,
	/// `"OAuth Token Expired"`, or `"Not authenticated"`. Negative markers are checked before
	/// positive ones because every negative label also contains a positive word.
	pub fn from_host_label(label: &str) -> Self {
		let lowered = label.trim().to_ascii_lowercase();

		match lowered.as_str() {
			"" => Self::Unknown,
			text if text.contains("not authenticated") || text.contains("unauthenticated") =>
				Self::Disconnected,
			text if text.contains("expired") => Self::Expired,
			text if text.contains("invalid") || text.contains("revoked") => Self::Disconnected,
			text if text.contains("oauth token")
				|| text.contains("api key")
				|| text.contains("authenticated") =>
				Self::Connected,
			_ => Self::Unknown,
		}
	}
}
impl Display for AuthStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Latest status observed for a single provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAuthStatus {
	/// Provider the status belongs to.
	pub provider: ProviderId,
	/// Typed status returned by the adapter (or derived from its failure).
	pub status: AuthStatus,
	/// Convenience flag mirroring [`AuthStatus::is_connected`].
	pub connected: bool,
	/// When the adapter was last queried.
	#[serde(with = "time::serde::rfc3339")]
	pub last_checked_at: OffsetDateTime,
	/// Diagnostic message when the query failed; never shown as a user-facing error.
	pub detail: Option<String>,
}
impl ProviderAuthStatus {
	/// Builds a status record stamped at `checked_at`.
	pub fn new(provider: ProviderId, status: AuthStatus, checked_at: OffsetDateTime) -> Self {
		Self {
			provider,
			status,
			connected: status.is_connected(),
			last_checked_at: checked_at,
			detail: None,
		}
	}

	/// Attaches a diagnostic message.
	pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
		self.detail = Some(detail.into());

		self
	}
}

/// Immutable snapshot of every configured provider's status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateAuthState {
	/// True when at least one provider is connected.
	pub any_connected: bool,
	/// Per-provider view for settings screens.
	pub per_provider: BTreeMap<ProviderId, ProviderAuthStatus>,
	/// Provider the user prefers when several are connected.
	pub preferred: Option<ProviderId>,
	/// Configuration order used as the fallback for [`Self::active_provider`]. Snapshots that
	/// omit it fall back to identifier order.
	#[serde(default)]
	pub order: Vec<ProviderId>,
}
impl AggregateAuthState {
	/// OR-reduces the provided statuses, keeping their iteration order as the fallback order.
	pub fn from_statuses(
		statuses: impl IntoIterator<Item = ProviderAuthStatus>,
		preferred: Option<ProviderId>,
	) -> Self {
		let mut per_provider = BTreeMap::new();
		let mut order = Vec::new();

		for status in statuses {
			order.push(status.provider.clone());
			per_provider.insert(status.provider.clone(), status);
		}

		let any_connected = per_provider.values().any(|status| status.connected);

		Self { any_connected, per_provider, preferred, order }
	}

	/// Returns the status recorded for `provider`, if it is configured.
	pub fn get(&self, provider: &str) -> Option<&ProviderAuthStatus> {
		self.per_provider.get(provider)
	}

	/// Returns true when `provider` is configured and connected.
	pub fn is_connected(&self, provider: &str) -> bool {
		self.get(provider).is_some_and(|status| status.connected)
	}

	/// Picks the provider the application should use.
	///
	/// The preferred provider wins when it is connected; otherwise the first connected provider
	/// in configuration order is returned.
	pub fn active_provider(&self) -> Option<&ProviderId> {
		if let Some(preferred) = self.preferred.as_ref()
			&& self.is_connected(preferred)
		{
			return Some(preferred);
		}

		if self.order.is_empty() {
			return self.per_provider.keys().find(|provider| self.is_connected(provider));
		}

		self.order.iter().find(|provider| self.is_connected(provider))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn id(value: &str) -> ProviderId {
		ProviderId::new(value).expect("Provider fixture should be valid.")
	}

	#[test]
	fn host_labels_map_to_typed_statuses() {
		assert_eq!(AuthStatus::from_host_label("OAuth Token"), AuthStatus::Connected);
		assert_eq!(AuthStatus::from_host_label("API Key"), AuthStatus::Connected);
		assert_eq!(AuthStatus::from_host_label("OAuth Token (No Refresh)"), AuthStatus::Connected);
		assert_eq!(AuthStatus::from_host_label("OAuth Token Expired"), AuthStatus::Expired);
		assert_eq!(AuthStatus::from_host_label("Not authenticated"), AuthStatus::Disconnected);
		assert_eq!(AuthStatus::from_host_label("API Key Invalid"), AuthStatus::Disconnected);
		assert_eq!(AuthStatus::from_host_label("Auth Error"), AuthStatus::Unknown);
		assert_eq!(AuthStatus::from_host_label("   "), AuthStatus::Unknown);
	}

	#[test]
	fn aggregate_is_or_over_providers() {
		let now = OffsetDateTime::now_utc();
		let state = AggregateAuthState::from_statuses(
			[
				ProviderAuthStatus::new(id("qwen"), AuthStatus::Disconnected, now),
				ProviderAuthStatus::new(id("gemini"), AuthStatus::Connected, now),
			],
			None,
		);

		assert!(state.any_connected);
		assert!(state.is_connected("gemini"));
		assert!(!state.is_connected("qwen"));
		assert!(!state.is_connected("openai"));

		let empty = AggregateAuthState::from_statuses([], None);

		assert!(!empty.any_connected);
		assert_eq!(empty.active_provider(), None);
	}

	#[test]
	fn snapshots_serialize_timestamps_as_rfc3339_and_tolerate_missing_order() {
		let checked_at = OffsetDateTime::UNIX_EPOCH;
		let status = ProviderAuthStatus::new(id("gemini"), AuthStatus::Connected, checked_at);
		let json = serde_json::to_value(&status).expect("Status should serialize.");

		assert_eq!(json["last_checked_at"], "1970-01-01T00:00:00Z");

		let state: AggregateAuthState = serde_json::from_str(
			r#"{
				"any_connected": true,
				"per_provider": {
					"gemini": {
						"provider": "gemini",
						"status": "connected",
						"connected": true,
						"last_checked_at": "1970-01-01T00:00:00Z",
						"detail": null
					}
				},
				"preferred": null
			}"#,
		)
		.expect("Snapshots without an order should deserialize.");

		assert_eq!(state.per_provider["gemini"].last_checked_at, checked_at);
		assert_eq!(state.active_provider(), Some(&id("gemini")));
	}

	#[test]
	fn active_provider_prefers_connected_preference() {
		let now = OffsetDateTime::now_utc();
		let statuses = [
			ProviderAuthStatus::new(id("qwen"), AuthStatus::Connected, now),
			ProviderAuthStatus::new(id("gemini"), AuthStatus::Connected, now),
			ProviderAuthStatus::new(id("openai"), AuthStatus::Expired, now),
		];
		let preferred = AggregateAuthState::from_statuses(statuses.clone(), Some(id("gemini")));

		assert_eq!(preferred.active_provider(), Some(&id("gemini")));

		let fallback = AggregateAuthState::from_statuses(statuses, Some(id("openai")));

		assert_eq!(fallback.active_provider(), Some(&id("qwen")));
	}
}

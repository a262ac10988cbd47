//! Cross-provider status aggregation.
//!
//! [`StatusAggregator`] queries every configured adapter in parallel and folds the answers into
//! an immutable [`AggregateAuthState`] snapshot. One misbehaving provider can never poison the
//! result: its error or timeout is logged and recorded as a disconnected entry with a detail.

// crates.io
use futures::future;
use tokio::{sync::watch, time};
// self
use crate::{
	_prelude::*,
	auth::{AggregateAuthState, AuthStatus, ProviderAuthStatus, ProviderId},
	config::GateConfig,
	obs::{self, FlowSpan, FlowStage, StageOutcome},
	provider::ProviderAdapter,
};

/// Pull-based aggregator over a fixed set of providers.
pub struct StatusAggregator {
	providers: Vec<Arc<dyn ProviderAdapter>>,
	preferred: Option<ProviderId>,
	status_timeout: StdDuration,
	snapshot_tx: watch::Sender<Arc<AggregateAuthState>>,
	refresh_guard: AsyncMutex<()>,
}
impl StatusAggregator {
	const DEFAULT_STATUS_TIMEOUT: StdDuration = StdDuration::from_secs(10);

	/// Creates an aggregator; `providers` order is the fallback order for
	/// [`AggregateAuthState::active_provider`].
	pub fn new(providers: Vec<Arc<dyn ProviderAdapter>>, preferred: Option<ProviderId>) -> Self {
		let initial = AggregateAuthState::from_statuses([], preferred.clone());
		let (snapshot_tx, _) = watch::channel(Arc::new(initial));

		Self {
			providers,
			preferred,
			status_timeout: Self::DEFAULT_STATUS_TIMEOUT,
			snapshot_tx,
			refresh_guard: AsyncMutex::new(()),
		}
	}

	/// Creates an aggregator using the preference and timeout from `config`.
	pub fn from_config(providers: Vec<Arc<dyn ProviderAdapter>>, config: &GateConfig) -> Self {
		Self::new(providers, config.preferred_provider.clone())
			.with_status_timeout(config.status_timeout())
	}

	/// Overrides the per-provider status timeout (defaults to 10 seconds).
	pub fn with_status_timeout(mut self, timeout: StdDuration) -> Self {
		self.status_timeout = timeout;

		self
	}

	/// Configured providers, in order.
	pub fn providers(&self) -> impl Iterator<Item = &ProviderId> {
		self.providers.iter().map(|adapter| adapter.id())
	}

	/// Latest snapshot. Empty until the first [`refresh`](Self::refresh).
	pub fn snapshot(&self) -> Arc<AggregateAuthState> {
		self.snapshot_tx.borrow().clone()
	}

	/// Subscribes to snapshot replacements.
	pub fn subscribe(&self) -> watch::Receiver<Arc<AggregateAuthState>> {
		self.snapshot_tx.subscribe()
	}

	/// Queries every provider and publishes a new snapshot.
	///
	/// Concurrent calls are serialized so snapshots are published in query order.
	pub async fn refresh(&self) -> Arc<AggregateAuthState> {
		let _guard = self.refresh_guard.lock().await;
		let statuses =
			future::join_all(self.providers.iter().map(|adapter| self.query(adapter.as_ref())))
				.await;
		let state = Arc::new(AggregateAuthState::from_statuses(statuses, self.preferred.clone()));

		tracing::debug!(
			any_connected = state.any_connected,
			providers = state.per_provider.len(),
			"Auth status refreshed."
		);

		self.snapshot_tx.send_replace(state.clone());

		state
	}

	/// Clears `provider`'s session (best-effort) and refreshes.
	pub async fn sign_out(&self, provider: &str) -> Result<Arc<AggregateAuthState>> {
		let adapter = self
			.providers
			.iter()
			.find(|adapter| &**adapter.id() == provider)
			.ok_or_else(|| Error::ConfigurationMissing {
				reason: format!("Provider `{provider}` is not configured."),
			})?;
		let span = FlowSpan::new(FlowStage::ClearSession, adapter.id());

		obs::record_stage(FlowStage::ClearSession, StageOutcome::Attempt);

		let result = span.instrument(adapter.clear_session()).await;

		obs::record_stage(FlowStage::ClearSession, StageOutcome::of(&result));

		if let Err(e) = result {
			tracing::warn!(provider, error = %e, "Clearing the session failed; refreshing anyway.");
		}

		Ok(self.refresh().await)
	}

	async fn query(&self, adapter: &dyn ProviderAdapter) -> ProviderAuthStatus {
		let provider = adapter.id().clone();

		if !adapter.is_available() {
			return ProviderAuthStatus::new(
				provider,
				AuthStatus::Disconnected,
				OffsetDateTime::now_utc(),
			)
			.with_detail("The host runtime is not available in this context.");
		}

		let span = FlowSpan::new(FlowStage::GetStatus, &provider);

		obs::record_stage(FlowStage::GetStatus, StageOutcome::Attempt);

		let result = span.instrument(time::timeout(self.status_timeout, adapter.get_status())).await;
		let now = OffsetDateTime::now_utc();

		match result {
			Ok(Ok(status)) => {
				obs::record_stage(FlowStage::GetStatus, StageOutcome::Success);

				ProviderAuthStatus::new(provider, status, now)
			},
			Ok(Err(e)) => {
				obs::record_stage(FlowStage::GetStatus, StageOutcome::Failure);
				tracing::warn!(provider = %provider, error = %e, "Status check failed.");

				ProviderAuthStatus::new(provider, AuthStatus::Disconnected, now)
					.with_detail(e.to_string())
			},
			Err(_) => {
				obs::record_stage(FlowStage::GetStatus, StageOutcome::Failure);
				tracing::warn!(
					provider = %provider,
					timeout_ms = self.status_timeout.as_millis() as u64,
					"Status check timed out."
				);

				ProviderAuthStatus::new(provider, AuthStatus::Unknown, now).with_detail(format!(
					"Status check timed out after {} ms.",
					self.status_timeout.as_millis()
				))
			},
		}
	}
}
impl Debug for StatusAggregator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StatusAggregator")
			.field("providers", &self.providers().collect::<Vec<_>>())
			.field("preferred", &self.preferred)
			.field("status_timeout", &self.status_timeout)
			.finish()
	}
}

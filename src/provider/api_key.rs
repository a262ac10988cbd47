//! Adapter for providers authenticated by a static API key.

// std
use std::{
	env,
	sync::atomic::{AtomicBool, Ordering},
};
// self
use crate::{
	_prelude::*,
	auth::{AuthStatus, DeviceCode, ProviderId, TokenSecret},
	provider::{AdapterFuture, DeviceAuthorization, PollStatus, ProviderAdapter},
};

/// Key-only provider. Reports status and forgets the key; the device flow is unsupported.
pub struct ApiKeyAdapter {
	id: ProviderId,
	env_var: Option<String>,
	env_enabled: AtomicBool,
	key: RwLock<Option<TokenSecret>>,
}
impl ApiKeyAdapter {
	/// Creates an adapter holding `key`, if any.
	pub fn new(id: ProviderId, key: Option<TokenSecret>) -> Self {
		Self { id, env_var: None, env_enabled: AtomicBool::new(false), key: RwLock::new(key) }
	}

	/// Creates an adapter that reads its key from `env_var` whenever no key is held in memory.
	pub fn from_env(id: ProviderId, env_var: impl Into<String>) -> Self {
		Self {
			id,
			env_var: Some(env_var.into()),
			env_enabled: AtomicBool::new(true),
			key: RwLock::new(None),
		}
	}

	/// Replaces the held key.
	pub fn set_key(&self, key: TokenSecret) {
		*self.key.write() = Some(key);
	}

	fn has_key(&self) -> bool {
		if self.key.read().is_some() {
			return true;
		}

		let Some(name) = self.env_var.as_deref().filter(|_| self.env_enabled.load(Ordering::Acquire))
		else {
			return false;
		};

		match env::var(name) {
			Ok(value) if !value.trim().is_empty() => {
				*self.key.write() = Some(TokenSecret::new(value));

				true
			},
			_ => false,
		}
	}

	fn unsupported(&self) -> Error {
		Error::UnsupportedFlow { provider: self.id.to_string() }
	}
}
impl ProviderAdapter for ApiKeyAdapter {
	fn id(&self) -> &ProviderId {
		&self.id
	}

	fn start_device_flow(&self) -> AdapterFuture<'_, DeviceAuthorization> {
		Box::pin(async move { Err(self.unsupported()) })
	}

	fn poll_device_flow<'a>(
		&'a self,
		_device_code: &'a DeviceCode,
	) -> AdapterFuture<'a, PollStatus> {
		Box::pin(async move { Err(self.unsupported()) })
	}

	fn get_status(&self) -> AdapterFuture<'_, AuthStatus> {
		Box::pin(async move {
			Ok(if self.has_key() { AuthStatus::Connected } else { AuthStatus::Disconnected })
		})
	}

	fn clear_session(&self) -> AdapterFuture<'_, ()> {
		Box::pin(async move {
			// The variable itself stays set; it is just no longer consulted.
			self.env_enabled.store(false, Ordering::Release);
			self.key.write().take();

			Ok(())
		})
	}
}
impl Debug for ApiKeyAdapter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiKeyAdapter")
			.field("id", &self.id)
			.field("env_var", &self.env_var)
			.field("key_held", &self.key.read().is_some())
			.finish()
	}
}

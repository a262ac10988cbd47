//! Tagged union over the concrete adapters.

// self
use crate::{
	_prelude::*,
	auth::{AuthStatus, DeviceCode, ProviderId},
	http::ProviderHttpClient,
	provider::{
		AdapterFuture, ApiKeyAdapter, DeviceAuthorization, HostAdapter, HttpDeviceAdapter,
		PollStatus, ProviderAdapter,
	},
};

/// One provider, whichever way it authenticates.
///
/// Lets an application keep a homogeneous provider list (and a single
/// `Arc<dyn ProviderAdapter>` per entry) without a separate code path per provider kind.
pub enum ProviderShim<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// RFC 8628 spoken directly over HTTP.
	Device(HttpDeviceAdapter<C>),
	/// Device flow owned by a host runtime.
	Host(HostAdapter),
	/// Static API key.
	ApiKey(ApiKeyAdapter),
}
impl<C> ProviderShim<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn inner(&self) -> &dyn ProviderAdapter {
		match self {
			Self::Device(adapter) => adapter,
			Self::Host(adapter) => adapter,
			Self::ApiKey(adapter) => adapter,
		}
	}

	/// Returns the shim kind as a stable label.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::Device(_) => "device",
			Self::Host(_) => "host",
			Self::ApiKey(_) => "api_key",
		}
	}
}
impl<C> ProviderAdapter for ProviderShim<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn id(&self) -> &ProviderId {
		self.inner().id()
	}

	fn is_available(&self) -> bool {
		self.inner().is_available()
	}

	fn start_device_flow(&self) -> AdapterFuture<'_, DeviceAuthorization> {
		self.inner().start_device_flow()
	}

	fn poll_device_flow<'a>(
		&'a self,
		device_code: &'a DeviceCode,
	) -> AdapterFuture<'a, PollStatus> {
		self.inner().poll_device_flow(device_code)
	}

	fn get_status(&self) -> AdapterFuture<'_, AuthStatus> {
		self.inner().get_status()
	}

	fn clear_session(&self) -> AdapterFuture<'_, ()> {
		self.inner().clear_session()
	}
}
impl<C> Debug for ProviderShim<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Device(adapter) => f.debug_tuple("Device").field(adapter).finish(),
			Self::Host(adapter) => f.debug_tuple("Host").field(adapter).finish(),
			Self::ApiKey(adapter) => f.debug_tuple("ApiKey").field(adapter).finish(),
		}
	}
}
impl<C> From<HostAdapter> for ProviderShim<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn from(adapter: HostAdapter) -> Self {
		Self::Host(adapter)
	}
}
impl<C> From<ApiKeyAdapter> for ProviderShim<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn from(adapter: ApiKeyAdapter) -> Self {
		Self::ApiKey(adapter)
	}
}
impl<C> From<HttpDeviceAdapter<C>> for ProviderShim<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn from(adapter: HttpDeviceAdapter<C>) -> Self {
		Self::Device(adapter)
	}
}

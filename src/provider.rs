//! Provider-facing descriptors (data) and adapters (behavior).
//!
//! `descriptor` exposes validated device authorization metadata covering HTTPS-only endpoints,
//! client identity, and provider quirks (scope delimiter, `verification_url` alias).
//! `adapter` defines [`ProviderAdapter`], the four-call capability contract the flow controller
//! and status aggregator are written against. The remaining modules are the concrete shims:
//! [`HttpDeviceAdapter`] for RFC 8628 over HTTP, [`HostAdapter`] for providers whose device flow
//! runs inside a host runtime, and [`ApiKeyAdapter`] for key-only providers. [`ProviderShim`]
//! tags them into one type.

pub mod adapter;
pub mod api_key;
pub mod descriptor;
pub mod device;
pub mod host;
pub mod shim;

pub use adapter::*;
pub use api_key::*;
pub use descriptor::*;
pub use device::*;
pub use host::*;
pub use shim::*;

//! Device authorization descriptors: validated endpoints, client identity, and quirks.
//!
//! A descriptor is plain data. It can be assembled through [`DeviceProviderDescriptorBuilder`],
//! deserialized from a settings document, or resolved from environment variables with
//! [`DeviceProviderDescriptor::from_env`].

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Provider-specific quirk toggles.
pub mod quirks;

pub use builder::*;
pub use quirks::*;

// std
use std::env;
// self
use crate::{
	_prelude::*,
	auth::{ClientSecret, ProviderId},
	error::ConfigError,
};

/// Endpoint set declared by a device authorization descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEndpoints {
	/// Device authorization endpoint (RFC 8628 section 3.1).
	pub device_authorization: Url,
	/// Token endpoint polled with the device code.
	pub token: Url,
	/// Optional revocation endpoint used when the session is cleared.
	pub revocation: Option<Url>,
}

/// Immutable descriptor consumed by [`HttpDeviceAdapter`](crate::provider::HttpDeviceAdapter).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: DeviceEndpoints,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Optional secret for confidential clients.
	#[serde(default, skip_serializing)]
	pub client_secret: Option<ClientSecret>,
	/// Scopes requested when the flow starts.
	#[serde(default)]
	pub scopes: Vec<String>,
	/// Provider-specific quirks.
	#[serde(default)]
	pub quirks: ProviderQuirks,
}
impl DeviceProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> DeviceProviderDescriptorBuilder {
		DeviceProviderDescriptorBuilder::new(id)
	}

	/// Resolves a descriptor from `{PREFIX}_*` environment variables.
	///
	/// | Variable | Required |
	/// | --- | --- |
	/// | `{PREFIX}_DEVICE_AUTH_URL` | yes |
	/// | `{PREFIX}_DEVICE_TOKEN_URL` | yes |
	/// | `{PREFIX}_CLIENT_ID` | yes |
	/// | `{PREFIX}_CLIENT_SECRET` | no |
	/// | `{PREFIX}_SCOPE` | no, split on the quirk delimiter |
	/// | `{PREFIX}_REVOKE_URL` | no |
	///
	/// A missing required variable yields [`Error::ConfigurationMissing`] naming it, so the flow
	/// controller can surface setup guidance instead of a generic failure.
	pub fn from_env(id: ProviderId, prefix: &str, quirks: ProviderQuirks) -> Result<Self> {
		let device_authorization =
			parse_endpoint("device_authorization", &required_var(prefix, "DEVICE_AUTH_URL")?)?;
		let token = parse_endpoint("token", &required_var(prefix, "DEVICE_TOKEN_URL")?)?;
		let client_id = required_var(prefix, "CLIENT_ID")?;
		let mut builder = Self::builder(id)
			.device_authorization_endpoint(device_authorization)
			.token_endpoint(token)
			.client_id(client_id)
			.quirks(quirks);

		if let Some(secret) = optional_var(prefix, "CLIENT_SECRET") {
			builder = builder.client_secret(secret);
		}
		if let Some(scope) = optional_var(prefix, "SCOPE") {
			builder = builder.scopes(
				scope.split(quirks.scope_delimiter).map(str::trim).filter(|s| !s.is_empty()),
			);
		}
		if let Some(revocation) = optional_var(prefix, "REVOKE_URL") {
			builder = builder.revocation_endpoint(parse_endpoint("revocation", &revocation)?);
		}

		Ok(builder.build().map_err(ConfigError::from)?)
	}

	/// Joins the requested scopes with the provider's delimiter.
	pub fn scope_param(&self) -> Option<String> {
		if self.scopes.is_empty() {
			return None;
		}

		let delimiter = self.quirks.scope_delimiter.to_string();

		Some(self.scopes.join(&delimiter))
	}
}

fn required_var(prefix: &str, suffix: &str) -> Result<String> {
	let name = format!("{prefix}_{suffix}");

	optional_var(prefix, suffix).ok_or_else(|| Error::ConfigurationMissing {
		reason: format!("{name} environment variable is required."),
	})
}

fn optional_var(prefix: &str, suffix: &str) -> Option<String> {
	env::var(format!("{prefix}_{suffix}")).ok().filter(|value| !value.trim().is_empty())
}

fn parse_endpoint(name: &'static str, raw: &str) -> Result<Url> {
	Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidEndpoint { name, source }.into())
}

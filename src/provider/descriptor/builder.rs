// std
use std::iter::IntoIterator;
// self
use crate::{
	_prelude::*,
	auth::{ClientSecret, ProviderId},
	provider::{DeviceEndpoints, DeviceProviderDescriptor, ProviderQuirks},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum DescriptorError {
	/// The device authorization endpoint is mandatory.
	#[error("Missing device authorization endpoint.")]
	MissingDeviceAuthorizationEndpoint,
	/// The token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Device requests always carry a client identifier.
	#[error("Missing client identifier.")]
	MissingClientId,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Reject scope delimiters that are control characters.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
}

/// Builder for [`DeviceProviderDescriptor`] values.
#[derive(Debug)]
pub struct DeviceProviderDescriptorBuilder {
	id: ProviderId,
	device_authorization_endpoint: Option<Url>,
	token_endpoint: Option<Url>,
	revocation_endpoint: Option<Url>,
	client_id: Option<String>,
	client_secret: Option<ClientSecret>,
	scopes: Vec<String>,
	quirks: ProviderQuirks,
}
impl DeviceProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			device_authorization_endpoint: None,
			token_endpoint: None,
			revocation_endpoint: None,
			client_id: None,
			client_secret: None,
			scopes: Vec::new(),
			quirks: ProviderQuirks::default(),
		}
	}

	/// Sets the device authorization endpoint.
	pub fn device_authorization_endpoint(mut self, url: Url) -> Self {
		self.device_authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the optional revocation endpoint.
	pub fn revocation_endpoint(mut self, url: Url) -> Self {
		self.revocation_endpoint = Some(url);

		self
	}

	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the confidential client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(ClientSecret::new(secret));

		self
	}

	/// Replaces the requested scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the provider quirks.
	pub fn quirks(mut self, quirks: ProviderQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<DeviceProviderDescriptor, DescriptorError> {
		let device_authorization = self
			.device_authorization_endpoint
			.ok_or(DescriptorError::MissingDeviceAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(DescriptorError::MissingTokenEndpoint)?;
		let client_id = self
			.client_id
			.filter(|value| !value.trim().is_empty())
			.ok_or(DescriptorError::MissingClientId)?;
		let descriptor = DeviceProviderDescriptor {
			id: self.id,
			endpoints: DeviceEndpoints {
				device_authorization,
				token,
				revocation: self.revocation_endpoint,
			},
			client_id,
			client_secret: self.client_secret,
			scopes: self.scopes,
			quirks: self.quirks,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl DeviceProviderDescriptor {
	/// Validates invariants for descriptors that did not come through the builder.
	pub fn validate(&self) -> Result<(), DescriptorError> {
		if self.client_id.trim().is_empty() {
			return Err(DescriptorError::MissingClientId);
		}

		validate_endpoint("device_authorization", &self.endpoints.device_authorization)?;
		validate_endpoint("token", &self.endpoints.token)?;

		if let Some(revocation) = self.endpoints.revocation.as_ref() {
			validate_endpoint("revocation", revocation)?;
		}
		if self.quirks.scope_delimiter.is_control() {
			return Err(DescriptorError::InvalidScopeDelimiter {
				delimiter: self.quirks.scope_delimiter,
			});
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), DescriptorError> {
	if url.scheme() != "https" {
		Err(DescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}

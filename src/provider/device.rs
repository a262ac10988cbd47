//! RFC 8628 device authorization over HTTP.
//!
//! [`HttpDeviceAdapter`] performs the two device-flow requests itself (device code + one token
//! poll per call) and keeps the issued token in memory only, which is enough to answer
//! [`ProviderAdapter::get_status`] for the lifetime of the process.

// self
use crate::{
	_prelude::*,
	auth::{AuthStatus, DeviceCode, ProviderId, TokenSecret},
	error::TransientError,
	http::{self, FormResponse, ProviderHttpClient},
	provider::{
		AdapterFuture, DeviceAuthorization, DeviceProviderDescriptor, PollStatus, ProviderAdapter,
		ProviderQuirks,
	},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const BODY_PREVIEW_LIMIT: usize = 256;

/// Device adapter specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestDeviceAdapter = HttpDeviceAdapter<ReqwestHttpClient>;

/// Where an adapter reads its descriptor from.
#[derive(Clone, Debug)]
pub enum DescriptorSource {
	/// A descriptor validated up front.
	Fixed(Arc<DeviceProviderDescriptor>),
	/// `{prefix}_*` environment variables, resolved again on every request so settings edited
	/// while the application runs are picked up.
	Env {
		/// Variable prefix, e.g. `QWEN`.
		prefix: String,
		/// Quirks applied to the resolved descriptor.
		quirks: ProviderQuirks,
	},
}

/// Provider adapter speaking RFC 8628 directly over HTTP.
pub struct HttpDeviceAdapter<C>
where
	C: ?Sized + ProviderHttpClient,
{
	id: ProviderId,
	source: DescriptorSource,
	http_client: Arc<C>,
	issued: Mutex<Option<IssuedToken>>,
}
impl<C> HttpDeviceAdapter<C>
where
	C: ?Sized + ProviderHttpClient,
{
	/// Creates an adapter for a validated descriptor using the caller-provided transport.
	pub fn with_http_client(
		descriptor: DeviceProviderDescriptor,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			id: descriptor.id.clone(),
			source: DescriptorSource::Fixed(Arc::new(descriptor)),
			http_client: http_client.into(),
			issued: Mutex::new(None),
		}
	}

	/// Creates an adapter whose descriptor is resolved from `{prefix}_*` variables per request.
	pub fn from_env_with_http_client(
		id: ProviderId,
		prefix: impl Into<String>,
		quirks: ProviderQuirks,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			id,
			source: DescriptorSource::Env { prefix: prefix.into(), quirks },
			http_client: http_client.into(),
			issued: Mutex::new(None),
		}
	}

	/// Returns the descriptor source backing this adapter.
	pub fn source(&self) -> &DescriptorSource {
		&self.source
	}

	fn descriptor(&self) -> Result<Arc<DeviceProviderDescriptor>> {
		match &self.source {
			DescriptorSource::Fixed(descriptor) => Ok(descriptor.clone()),
			DescriptorSource::Env { prefix, quirks } =>
				DeviceProviderDescriptor::from_env(self.id.clone(), prefix, *quirks).map(Arc::new),
		}
	}

	fn remember(&self, body: TokenBody) -> TokenSecret {
		let now = OffsetDateTime::now_utc();
		let access = TokenSecret::new(body.access_token);
		let issued = IssuedToken {
			access: access.clone(),
			expires_at: body
				.expires_in
				.filter(|secs| *secs > 0)
				.map(|secs| now.saturating_add(Duration::seconds(secs))),
		};

		*self.issued.lock() = Some(issued);

		access
	}
}
#[cfg(feature = "reqwest")]
impl HttpDeviceAdapter<ReqwestHttpClient> {
	/// Creates an adapter that provisions its own reqwest transport.
	pub fn new(descriptor: DeviceProviderDescriptor) -> Self {
		Self::with_http_client(descriptor, ReqwestHttpClient::default())
	}

	/// Creates an env-configured adapter that provisions its own reqwest transport.
	pub fn from_env(id: ProviderId, prefix: impl Into<String>, quirks: ProviderQuirks) -> Self {
		Self::from_env_with_http_client(id, prefix, quirks, ReqwestHttpClient::default())
	}
}
impl<C> ProviderAdapter for HttpDeviceAdapter<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn id(&self) -> &ProviderId {
		&self.id
	}

	fn start_device_flow(&self) -> AdapterFuture<'_, DeviceAuthorization> {
		Box::pin(async move {
			let descriptor = self.descriptor()?;
			let scope = descriptor.scope_param();
			let mut form = vec![("client_id", descriptor.client_id.as_str())];

			if let Some(scope) = scope.as_deref() {
				form.push(("scope", scope));
			}

			let response = http::post_form(
				self.http_client.as_ref(),
				&descriptor.endpoints.device_authorization,
				&form,
			)
			.await?;

			if !response.is_success() {
				tracing::warn!(
					provider = %self.id,
					status = response.status,
					"Device authorization request was rejected."
				);

				return Err(rejection(&response));
			}

			response.json::<DeviceCodeBody>()?.into_authorization(&descriptor.quirks)
		})
	}

	fn poll_device_flow<'a>(
		&'a self,
		device_code: &'a DeviceCode,
	) -> AdapterFuture<'a, PollStatus> {
		Box::pin(async move {
			let descriptor = self.descriptor()?;
			let mut form = vec![
				("grant_type", DEVICE_CODE_GRANT),
				("device_code", device_code.expose()),
				("client_id", descriptor.client_id.as_str()),
			];

			if let Some(secret) = descriptor.client_secret.as_ref() {
				form.push(("client_secret", secret.expose()));
			}

			let response =
				http::post_form(self.http_client.as_ref(), &descriptor.endpoints.token, &form)
					.await?;

			let oauth_error = response.json::<OAuthErrorBody>().ok();

			if response.is_success() {
				// Some providers report RFC 8628 errors with a 200 status.
				let token = match (response.json::<TokenBody>(), oauth_error) {
					(Ok(body), _) => self.remember(body),
					(Err(_), Some(body)) =>
						return Ok(PollStatus::from_oauth_error(&body.error, body.error_description)),
					(Err(e), None) => return Err(e),
				};

				return Ok(PollStatus::Success { token: Some(token) });
			}

			if response.is_throttled_or_server_error() {
				// Some providers answer slow_down with 429 instead of 400.
				if let Some(body) = oauth_error.as_ref().filter(|body| body.error == "slow_down") {
					return Ok(PollStatus::from_oauth_error(&body.error, None));
				}

				return Err(rejection(&response));
			}

			Ok(match oauth_error {
				Some(body) => PollStatus::from_oauth_error(&body.error, body.error_description),
				None => PollStatus::Error { message: response.body_preview(BODY_PREVIEW_LIMIT) },
			})
		})
	}

	fn get_status(&self) -> AdapterFuture<'_, AuthStatus> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();
			let status = match self.issued.lock().as_ref() {
				None => AuthStatus::Disconnected,
				Some(token) if token.is_expired_at(now) => AuthStatus::Expired,
				Some(_) => AuthStatus::Connected,
			};

			Ok(status)
		})
	}

	fn clear_session(&self) -> AdapterFuture<'_, ()> {
		Box::pin(async move {
			let Some(issued) = self.issued.lock().take() else {
				return Ok(());
			};
			let descriptor = match self.descriptor() {
				Ok(descriptor) => descriptor,
				Err(e) => {
					tracing::warn!(
						provider = %self.id,
						error = %e,
						"Descriptor is unavailable; the local session is cleared without revocation."
					);

					return Ok(());
				},
			};
			let Some(revocation) = descriptor.endpoints.revocation.as_ref() else {
				return Ok(());
			};
			let form = [
				("token", issued.access.expose()),
				("token_type_hint", "access_token"),
				("client_id", descriptor.client_id.as_str()),
			];

			match http::post_form(self.http_client.as_ref(), revocation, &form).await {
				Ok(response) if response.is_success() => {},
				Ok(response) => tracing::warn!(
					provider = %self.id,
					status = response.status,
					"Token revocation was rejected; the local session is cleared anyway."
				),
				Err(e) => tracing::warn!(
					provider = %self.id,
					error = %e,
					"Token revocation failed; the local session is cleared anyway."
				),
			}

			Ok(())
		})
	}
}
impl<C> Debug for HttpDeviceAdapter<C>
where
	C: ?Sized + ProviderHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpDeviceAdapter")
			.field("id", &self.id)
			.field("source", &self.source)
			.field("token_held", &self.issued.lock().is_some())
			.finish()
	}
}

struct IssuedToken {
	access: TokenSecret,
	expires_at: Option<OffsetDateTime>,
}
impl IssuedToken {
	fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at <= instant)
	}
}

#[derive(Deserialize)]
struct DeviceCodeBody {
	device_code: String,
	user_code: String,
	#[serde(default)]
	verification_uri: Option<String>,
	#[serde(default)]
	verification_url: Option<String>,
	#[serde(default)]
	verification_uri_complete: Option<String>,
	expires_in: u64,
	#[serde(default)]
	interval: Option<u64>,
}
impl DeviceCodeBody {
	fn into_authorization(self, quirks: &ProviderQuirks) -> Result<DeviceAuthorization> {
		let verification_uri = self
			.verification_uri
			.or(self.verification_url.filter(|_| quirks.accept_verification_url_alias))
			.ok_or_else(|| Error::Provider {
				reason: "Device authorization response is missing verification_uri.".into(),
			})?;
		let verification_uri_complete =
			self.verification_uri_complete.filter(|_| quirks.prefer_complete_verification_uri);

		Ok(DeviceAuthorization {
			device_code: DeviceCode::new(self.device_code),
			user_code: self.user_code,
			verification_uri,
			verification_uri_complete,
			expires_in: self.expires_in,
			interval: self.interval,
		})
	}
}

#[derive(Deserialize)]
struct TokenBody {
	access_token: String,
	#[serde(default)]
	expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

fn rejection(response: &FormResponse) -> Error {
	let body = response.json::<OAuthErrorBody>().ok();
	let message = body
		.map(|body| body.error_description.unwrap_or(body.error))
		.unwrap_or_else(|| response.body_preview(BODY_PREVIEW_LIMIT));

	if response.is_throttled_or_server_error() {
		TransientError::Endpoint {
			message,
			status: Some(response.status),
			retry_after: response.retry_after,
		}
		.into()
	} else {
		Error::Provider { reason: message }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(status: u16, body: &str) -> FormResponse {
		FormResponse { status, body: body.as_bytes().to_vec(), retry_after: None }
	}

	#[test]
	fn device_body_honors_alias_and_complete_uri_quirks() {
		let body: DeviceCodeBody = serde_json::from_str(
			r#"{"device_code":"d","user_code":"U-1","verification_url":"https://g.co/device","verification_uri_complete":"https://g.co/device?c=U-1","expires_in":900}"#,
		)
		.expect("Device body fixture should parse.");
		let authorization = body
			.into_authorization(&ProviderQuirks {
				prefer_complete_verification_uri: false,
				..Default::default()
			})
			.expect("Alias should be accepted by default.");

		assert_eq!(authorization.verification_uri, "https://g.co/device");
		assert_eq!(authorization.verification_uri_complete, None);
		assert_eq!(authorization.interval, None);

		let body: DeviceCodeBody = serde_json::from_str(
			r#"{"device_code":"d","user_code":"U-1","verification_url":"https://g.co/device","expires_in":900}"#,
		)
		.expect("Device body fixture should parse.");
		let err = body
			.into_authorization(&ProviderQuirks {
				accept_verification_url_alias: false,
				..Default::default()
			})
			.expect_err("Alias must be ignored when the quirk is off.");

		assert!(matches!(err, Error::Provider { .. }));
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn clear_session_survives_an_unresolvable_descriptor() {
		let adapter = ReqwestDeviceAdapter::from_env(
			ProviderId::new("env-clear").expect("Provider fixture should be valid."),
			"OAUTH2_DEVICE_GATE_UNSET_CLEAR",
			ProviderQuirks::default(),
		);

		*adapter.issued.lock() =
			Some(IssuedToken { access: TokenSecret::new("at-env"), expires_at: None });

		assert_eq!(adapter.get_status().await.expect("Status is local."), AuthStatus::Connected);

		adapter.clear_session().await.expect("Clearing is best-effort.");

		assert_eq!(adapter.get_status().await.expect("Status is local."), AuthStatus::Disconnected);
	}

	#[test]
	fn rejection_splits_transient_and_provider_failures() {
		let err = rejection(&response(503, "upstream down"));

		assert!(matches!(
			err,
			Error::Transient(TransientError::Endpoint { status: Some(503), .. })
		));

		let err = rejection(&response(
			400,
			r#"{"error":"invalid_client","error_description":"Unknown client id"}"#,
		));

		match err {
			Error::Provider { reason } => assert_eq!(reason, "Unknown client id"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}
}

//! Transport primitives for device authorization requests.
//!
//! The module exposes [`ProviderHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can plug in their own HTTP stack while the
//! device adapter keeps classifying throttling and retry hints consistently. Implementations
//! call [`ResponseMetadataSlot::take`] before dispatching a request and
//! [`ResponseMetadataSlot::store`] once an HTTP status or retry hint is known.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest,
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE},
	},
};
#[cfg(feature = "reqwest")] use oauth2::HttpResponse;
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError, TransportError},
};

/// Abstraction over HTTP transports capable of executing device authorization requests while
/// publishing response metadata.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// adapter, and the handles they return must own whatever state the request future needs so
/// that future remains `Send` while a poll is in flight.
pub trait ProviderHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	/// information never leaks across polls, then save the status and retry hint with
	/// [`ResponseMetadataSlot::store`] once a response arrives.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Captures metadata from the most recent HTTP response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Raw response returned by [`post_form`].
#[derive(Clone, Debug)]
pub struct FormResponse {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body.
	pub body: Vec<u8>,
	/// Retry-After hint captured by the transport.
	pub retry_after: Option<Duration>,
}
impl FormResponse {
	/// Returns true for 2xx responses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns true for responses that should be retried rather than reported (429, 5xx).
	pub fn is_throttled_or_server_error(&self) -> bool {
		self.status == 429 || self.status >= 500
	}

	/// Decodes the body as JSON, keeping the failing path for diagnostics.
	pub fn json<T>(&self) -> Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| {
			TransientError::ResponseParse { source, status: Some(self.status) }.into()
		})
	}

	/// Returns a lossy UTF-8 preview of the body, truncated to `limit` characters.
	pub fn body_preview(&self, limit: usize) -> String {
		let text = String::from_utf8_lossy(&self.body);
		let mut preview = text.chars().take(limit).collect::<String>();

		if text.chars().count() > limit {
			preview.push('…');
		}

		preview
	}
}

/// Sends an `application/x-www-form-urlencoded` POST and returns the raw response.
///
/// Transport failures are classified before they reach the caller: a failure that still carried
/// an HTTP status becomes [`TransientError::Endpoint`], everything else a [`TransportError`].
pub async fn post_form<C>(client: &C, url: &Url, form: &[(&str, &str)]) -> Result<FormResponse>
where
	C: ?Sized + ProviderHttpClient,
{
	let slot = ResponseMetadataSlot::default();
	let handle = client.with_metadata(slot.clone());
	let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(form).finish();
	let request: HttpRequest = Request::builder()
		.method(Method::POST)
		.uri(url.as_str())
		.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
		.header(ACCEPT, "application/json")
		.body(body.into_bytes())
		.map_err(ConfigError::from)?;
	let response = handle.call(request).await.map_err(|err| map_client_error(slot.take(), err))?;
	let retry_after = slot.take().and_then(|meta| meta.retry_after);

	Ok(FormResponse { status: response.status().as_u16(), body: response.into_body(), retry_after })
}

fn map_client_error<E>(meta: Option<ResponseMetadata>, err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	if let Some(ResponseMetadata { status: Some(status), retry_after }) = meta {
		return TransientError::Endpoint {
			message: format!("transport failed after HTTP {status}: {err}"),
			status: Some(status),
			retry_after,
		}
		.into();
	}

	match err {
		HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransportError::Unreachable { message }.into(),
		other => TransportError::Unreachable { message: other.to_string() }.into(),
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Device authorization endpoints answer directly, so a custom [`ReqwestClient`] should disable
/// redirect following.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ProviderHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		InstrumentedHandle(Arc::new(InstrumentedHttpClient { client: self.0.clone(), slot }))
	}
}

#[cfg(feature = "reqwest")]
struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that records status codes and retry hints.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut converted =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<i64>() {
		return Some(Duration::seconds(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn body_preview_truncates_long_bodies() {
		let response =
			FormResponse { status: 400, body: "x".repeat(300).into_bytes(), retry_after: None };
		let preview = response.body_preview(8);

		assert_eq!(preview, "xxxxxxxx…");
		assert!(!response.is_success());
		assert!(!response.is_throttled_or_server_error());
	}

	#[test]
	fn json_errors_are_transient_with_status() {
		let response = FormResponse { status: 200, body: b"not json".to_vec(), retry_after: None };
		let err = response
			.json::<serde_json::Value>()
			.expect_err("Malformed JSON should fail to decode.");

		assert!(matches!(
			err,
			Error::Transient(TransientError::ResponseParse { status: Some(200), .. })
		));
	}

	#[test]
	fn status_metadata_turns_transport_failures_transient() {
		let err = map_client_error::<std::io::Error>(
			Some(ResponseMetadata { status: Some(503), retry_after: Some(Duration::seconds(2)) }),
			HttpClientError::Other("body read failed".into()),
		);

		match err {
			Error::Transient(TransientError::Endpoint { status, retry_after, .. }) => {
				assert_eq!(status, Some(503));
				assert_eq!(retry_after, Some(Duration::seconds(2)));
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}

		let err = map_client_error::<std::io::Error>(None, HttpClientError::Other("down".into()));

		assert!(matches!(err, Error::Transport(TransportError::Unreachable { .. })));
	}
}

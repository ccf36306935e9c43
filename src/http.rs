//! Transport primitives for credentialed requests.
//!
//! The module exposes [`ApiRequest`] and [`ApiResponse`], owned and cloneable
//! request/response values, together with the [`HttpTransport`] seam the gateway sends
//! them through. A transport resolves to `Ok` for every HTTP response, whatever its
//! status; classifying statuses is the gateway's job. Only failures that prevent a
//! response from being produced map to [`TransportError`].

// std
use std::ops::Deref;
// crates.io
use http::{
	HeaderMap, HeaderValue, Method, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderName},
};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::EndpointClass,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks able to deliver [`ApiRequest`]s.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by the
/// gateway, the refresh client, and every replay behind an `Arc`.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends the request and resolves to the response, whatever its status.
	fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Owned outbound request that can be cloned for replays.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
	/// Explicit endpoint class; overrides path-based classification when set.
	pub class: Option<EndpointClass>,
}
impl ApiRequest {
	/// Creates a bodiless request.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None, class: None }
	}

	/// Creates a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Creates a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Serializes `body` as JSON and sets the matching content type.
	pub fn json<T>(mut self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(body)?);
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Inserts or replaces a header.
	pub fn header(mut self, name: HeaderName, value: &str) -> Result<Self, ConfigError> {
		self.headers.insert(name, HeaderValue::from_str(value)?);

		Ok(self)
	}

	/// Pins the endpoint class instead of deriving it from the URL path.
	pub fn with_class(mut self, class: EndpointClass) -> Self {
		self.class = Some(class);

		self
	}

	/// Returns a clone carrying `Authorization: Bearer <token>`.
	pub fn with_bearer(&self, token: &TokenSecret) -> Result<Self, ConfigError> {
		let mut value = HeaderValue::from_str(&token.bearer())?;

		value.set_sensitive(true);

		let mut authed = self.clone();

		authed.headers.insert(AUTHORIZATION, value);

		Ok(authed)
	}

	/// Returns the bearer token currently attached to the request, if any.
	pub fn bearer(&self) -> Option<TokenSecret> {
		self.headers
			.get(AUTHORIZATION)?
			.to_str()
			.ok()?
			.strip_prefix("Bearer ")
			.map(TokenSecret::new)
	}
}

/// Fully buffered response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response without headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Whether the status is in the 2xx range.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Whether the status signals an authorization failure (401 or 403).
	pub fn is_auth_failure(&self) -> bool {
		matches!(self.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
	}

	/// Deserializes the body as JSON, reporting the failing field path on error.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
	}

	/// Returns the body as lossy UTF-8 text.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Thin wrapper around [`ReqwestClient`] implementing [`HttpTransport`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
		let mut builder = self.0.request(request.method, request.url).headers(request.headers);

		if let Some(body) = request.body {
			builder = builder.body(body);
		}

		let response = builder.send().await?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let body = response.bytes().await?.to_vec();

		Ok(ApiResponse { status, headers, body })
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(self.execute(request))
	}
}

//! Credential refresh: the backend refresh call and the single-flight coordinator that
//! shares one refresh among every request that failed while it was in flight.

mod coordinator;
mod metrics;

pub use coordinator::RefreshCoordinator;
pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{RefreshGrant, RefreshedCredentials},
	config::EndpointClass,
	error::RefreshFailure,
	http::{ApiRequest, HttpTransport},
};

/// Boxed future returned by [`RefreshClient::refresh`].
pub type RefreshFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RefreshedCredentials, RefreshFailure>> + 'a + Send>>;

/// Exchanges a refresh token for new credentials.
pub trait RefreshClient
where
	Self: Send + Sync,
{
	/// Calls the refresh endpoint once with the provided grant.
	fn refresh(&self, grant: RefreshGrant) -> RefreshFuture<'_>;
}

/// [`RefreshClient`] that posts `{"refreshToken": ...}` as JSON to a fixed endpoint.
///
/// Requests go straight to the transport, never through the gateway, so a failing
/// refresh can not trigger another refresh.
pub struct HttpRefreshClient<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	endpoint: Url,
}
impl<T> HttpRefreshClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a client posting to `endpoint` through `transport`.
	pub fn new(transport: Arc<T>, endpoint: Url) -> Self {
		Self { transport, endpoint }
	}

	async fn exchange(&self, grant: RefreshGrant) -> Result<RefreshedCredentials, RefreshFailure> {
		let request = ApiRequest::post(self.endpoint.clone())
			.json(&grant)
			.map_err(|e| RefreshFailure::RefreshFailed { status: None, reason: e.to_string() })?
			.with_class(EndpointClass::Refresh);
		let response = self
			.transport
			.send(request)
			.await
			.map_err(|e| RefreshFailure::RefreshFailed { status: None, reason: e.to_string() })?;
		let status = Some(response.status.as_u16());

		if !response.is_success() {
			return Err(RefreshFailure::RefreshFailed {
				status,
				reason: format!("refresh endpoint answered {}", response.status),
			});
		}

		response.json().map_err(|e| RefreshFailure::RefreshFailed {
			status,
			reason: format!("malformed refresh response at `{}`", e.path()),
		})
	}
}
impl<T> RefreshClient for HttpRefreshClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn refresh(&self, grant: RefreshGrant) -> RefreshFuture<'_> {
		Box::pin(self.exchange(grant))
	}
}
impl<T> Debug for HttpRefreshClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpRefreshClient").field("endpoint", &self.endpoint.as_str()).finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::StatusCode;
	// self
	use super::*;
	use crate::{
		auth::TokenSecret,
		error::TransportError,
		http::{ApiResponse, TransportFuture},
	};

	/// Transport answering every request with one canned response.
	struct Canned(StatusCode, &'static str);
	impl HttpTransport for Canned {
		fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
			let response = ApiResponse::new(self.0, self.1);

			Box::pin(async move {
				assert_eq!(request.class, Some(EndpointClass::Refresh));
				assert!(request.bearer().is_none());

				Ok::<_, TransportError>(response)
			})
		}
	}

	fn client(status: StatusCode, body: &'static str) -> HttpRefreshClient<Canned> {
		HttpRefreshClient::new(
			Arc::new(Canned(status, body)),
			Url::parse("https://api.example.com/auth/refresh")
				.expect("Refresh URL fixture should parse."),
		)
	}

	fn grant() -> RefreshGrant {
		RefreshGrant { refresh_token: TokenSecret::new("refresh-1") }
	}

	#[tokio::test]
	async fn successful_refresh_parses_credentials() {
		let credentials = client(StatusCode::OK, "{\"accessToken\":\"fresh\"}")
			.refresh(grant())
			.await
			.expect("Well-formed refresh response should parse.");

		assert_eq!(credentials.access_token.expose(), "fresh");
		assert!(credentials.refresh_token.is_none());
	}

	#[tokio::test]
	async fn malformed_success_body_is_a_refresh_failure() {
		let failure = client(StatusCode::OK, "{\"accessToken\":7}")
			.refresh(grant())
			.await
			.expect_err("Numeric access token should be rejected.");

		match failure {
			RefreshFailure::RefreshFailed { status, reason } => {
				assert_eq!(status, Some(200));
				assert!(reason.contains("accessToken"), "Unexpected reason: {reason}.");
			},
			other => panic!("Unexpected failure: {other:?}."),
		}
	}

	#[tokio::test]
	async fn rejected_refresh_carries_the_status() {
		let failure = client(StatusCode::UNAUTHORIZED, "revoked")
			.refresh(grant())
			.await
			.expect_err("Rejected refresh should fail.");

		assert!(matches!(failure, RefreshFailure::RefreshFailed { status: Some(401), .. }));
	}
}

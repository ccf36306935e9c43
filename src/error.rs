//! Gateway-level error types shared by the interceptor, the refresh coordinator, and stores.

// self
use crate::{_prelude::*, config::EndpointClass, http::ApiResponse};

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error surfaced to request originators.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential store failure. Raised by termination when the credentials could not be
	/// cleared.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Failure unrelated to authorization, propagated unchanged.
	#[error(transparent)]
	Passthrough(#[from] PassthroughFailure),
	/// Refresh cycle ended without an outcome; credentials were left untouched.
	#[error(transparent)]
	Refresh(#[from] RefreshFailure),

	/// Login or branch-selection endpoint refused the credentials.
	#[error("The {class} endpoint rejected the request with status {}.", .response.status)]
	AuthRejected {
		/// Endpoint class that produced the rejection.
		class: EndpointClass,
		/// Response returned by the endpoint.
		response: ApiResponse,
	},
	/// Session could not be recovered; credentials were cleared.
	#[error("Session expired or lacks permissions.")]
	SessionExpired {
		/// Refresh failure that forced termination.
		#[source]
		cause: RefreshFailure,
	},
	/// Permission failure during branch selection; the session was kept.
	#[error("Branch permissions are not available yet.")]
	DeferredPermission {
		/// Refresh failure that would otherwise have terminated the session.
		#[source]
		cause: RefreshFailure,
	},
}
impl Error {
	/// Returns the refresh failure behind a terminal or deferred error, if any.
	pub fn refresh_failure(&self) -> Option<&RefreshFailure> {
		match self {
			Self::Refresh(cause)
			| Self::SessionExpired { cause }
			| Self::DeferredPermission { cause } => Some(cause),
			_ => None,
		}
	}

	/// Returns the HTTP status attached to the error, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Passthrough(PassthroughFailure::Status { response })
			| Self::AuthRejected { response, .. } => Some(response.status.as_u16()),
			Self::Refresh(RefreshFailure::RefreshFailed { status, .. })
			| Self::SessionExpired { cause: RefreshFailure::RefreshFailed { status, .. } }
			| Self::DeferredPermission { cause: RefreshFailure::RefreshFailed { status, .. } } =>
				*status,
			_ => None,
		}
	}
}

/// Failures that are forwarded to the originator without any refresh handling.
#[derive(Debug, ThisError)]
pub enum PassthroughFailure {
	/// Upstream answered with a non-success status.
	#[error("Upstream responded with status {}.", .response.status)]
	Status {
		/// Full upstream response, body included.
		response: ApiResponse,
	},
	/// Request never produced a response.
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Outcome of a refresh cycle that did not yield a new access token.
///
/// The value is cloned to every caller queued on the same cycle, so all of them
/// observe the identical failure.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshFailure {
	/// Credential store holds no refresh token.
	#[error("No refresh token is available in the credential store.")]
	MissingRefreshToken,
	/// Refresh endpoint returned an error or an unusable payload.
	#[error("Refresh endpoint rejected the request: {reason}.")]
	RefreshFailed {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Summary of the failure.
		reason: String,
	},
	/// Refreshed credentials could not be read from or written to the store.
	#[error("Credential store failed during refresh: {message}.")]
	Storage {
		/// Store-supplied message.
		message: String,
	},
	/// Cycle leader went away before publishing an outcome.
	#[error("Refresh cycle ended without publishing an outcome.")]
	Abandoned,
}
impl From<crate::store::StoreError> for RefreshFailure {
	fn from(e: crate::store::StoreError) -> Self {
		Self::Storage { message: e.to_string() }
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Body(#[from] serde_json::Error),
	/// Header value cannot be encoded.
	#[error("Header value is invalid.")]
	InvalidHeader(#[from] http::header::InvalidHeaderValue),
	/// Configuration document could not be parsed.
	#[error("Gateway configuration is malformed at `{}`.", .source.path())]
	Parse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Gateway configuration failed validation.
	#[error(transparent)]
	Gateway(#[from] crate::config::GatewayConfigError),
}

/// Failure that kept a request from producing any response.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

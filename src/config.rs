//! Gateway configuration: which endpoints are exempt from refresh handling and which
//! routes guard session termination.
//!
//! Endpoint and route paths are matched on whole path segments, so `/auth/login` matches
//! `/api/auth/login` and `/auth/login/` but never `/auth/login-history`. Query strings and
//! fragments are ignored.

/// Builder API for assembling gateway configurations.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// Role an outbound request plays in the authentication protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
	/// Credential refresh endpoint; never credentialed and never refreshed.
	Refresh,
	/// Login endpoint; authorization failures are final.
	Login,
	/// Branch-selection endpoint; authorization failures are final.
	BranchSelection,
	/// Any other endpoint; authorization failures trigger a refresh.
	Protected,
}
impl EndpointClass {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			EndpointClass::Refresh => "refresh",
			EndpointClass::Login => "login",
			EndpointClass::BranchSelection => "branch_selection",
			EndpointClass::Protected => "protected",
		}
	}

	/// Whether an authorization failure on this endpoint is a final decision.
	pub const fn is_auth_decision(self) -> bool {
		matches!(self, EndpointClass::Login | EndpointClass::BranchSelection)
	}
}
impl Display for EndpointClass {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Session-setup phase derived from the current navigation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoutePhase {
	/// User is on the login entry point.
	Login,
	/// User is choosing a branch; the session is still being provisioned.
	BranchSelection,
	/// Any other route.
	Other,
}
impl RoutePhase {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RoutePhase::Login => "login",
			RoutePhase::BranchSelection => "branch_selection",
			RoutePhase::Other => "other",
		}
	}
}

/// Backend endpoint paths with special authorization semantics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointPaths {
	/// Refresh endpoint path.
	pub refresh: String,
	/// Login endpoint path.
	pub login: String,
	/// Branch-selection endpoint path.
	pub branch_selection: String,
}
impl Default for EndpointPaths {
	fn default() -> Self {
		Self {
			refresh: "/auth/refresh".into(),
			login: "/auth/login".into(),
			branch_selection: "/auth/select-branch".into(),
		}
	}
}

/// Client-side navigation paths consulted by the session terminator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutePaths {
	/// Login entry point; termination navigates here.
	pub login: String,
	/// Branch-selection step; termination is deferred while here.
	pub branch_selection: String,
}
impl Default for RoutePaths {
	fn default() -> Self {
		Self { login: "/login".into(), branch_selection: "/select-branch".into() }
	}
}

/// Immutable gateway configuration.
///
/// Deserializing goes through [`GatewayConfigBuilder`], so a document that omits
/// `endpoints.refresh` recognizes refresh requests by the path of `refresh_url`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GatewayDocument")]
pub struct GatewayConfig {
	/// Absolute URL the refresh client posts to.
	pub refresh_url: Url,
	/// Endpoint paths with special authorization semantics.
	pub endpoints: EndpointPaths,
	/// Navigation paths consulted during termination.
	pub routes: RoutePaths,
}
impl GatewayConfig {
	/// Creates a new builder for the provided refresh endpoint URL.
	pub fn builder(refresh_url: Url) -> GatewayConfigBuilder {
		GatewayConfigBuilder::new(refresh_url)
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json(raw: &[u8]) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_slice(raw);
		let document: GatewayDocument = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::Parse { source })?;

		Ok(Self::try_from(document)?)
	}

	/// Classifies an outbound request URL.
	pub fn classify(&self, url: &Url) -> EndpointClass {
		let path = url.path();

		if segment_match(path, &self.endpoints.refresh) {
			EndpointClass::Refresh
		} else if segment_match(path, &self.endpoints.login) {
			EndpointClass::Login
		} else if segment_match(path, &self.endpoints.branch_selection) {
			EndpointClass::BranchSelection
		} else {
			EndpointClass::Protected
		}
	}

	/// Classifies a client-side navigation path.
	pub fn route_phase(&self, current_path: &str) -> RoutePhase {
		let path = strip_suffixes(current_path);

		if segment_match(path, &self.routes.branch_selection) {
			RoutePhase::BranchSelection
		} else if segment_match(path, &self.routes.login) {
			RoutePhase::Login
		} else {
			RoutePhase::Other
		}
	}
}

/// Wire shape of [`GatewayConfig`]; every endpoint path is optional.
#[derive(Deserialize)]
struct GatewayDocument {
	refresh_url: Url,
	#[serde(default)]
	endpoints: EndpointOverrides,
	#[serde(default)]
	routes: RoutePaths,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct EndpointOverrides {
	refresh: Option<String>,
	login: Option<String>,
	branch_selection: Option<String>,
}

impl TryFrom<GatewayDocument> for GatewayConfig {
	type Error = GatewayConfigError;

	fn try_from(document: GatewayDocument) -> Result<Self, Self::Error> {
		let GatewayDocument { refresh_url, endpoints, routes } = document;
		let mut builder = GatewayConfigBuilder::new(refresh_url);

		if let Some(path) = endpoints.refresh {
			builder = builder.refresh_endpoint(path);
		}
		if let Some(path) = endpoints.login {
			builder = builder.login_endpoint(path);
		}
		if let Some(path) = endpoints.branch_selection {
			builder = builder.branch_selection_endpoint(path);
		}

		builder.routes = routes;

		builder.build()
	}
}

fn strip_suffixes(path: &str) -> &str {
	path.split(['?', '#']).next().unwrap_or(path)
}

fn segment_match(path: &str, needle: &str) -> bool {
	let needle = needle.trim_end_matches('/');

	if needle.is_empty() {
		return false;
	}

	path.match_indices(needle).any(|(idx, _)| {
		let rest = &path[idx + needle.len()..];

		rest.is_empty() || rest.starts_with('/')
	})
}

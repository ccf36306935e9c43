// self
use crate::{
	_prelude::*,
	config::{EndpointPaths, GatewayConfig, RoutePaths},
};

/// Errors raised while constructing or validating gateway configurations.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum GatewayConfigError {
	/// Endpoint and route paths must be absolute.
	#[error("The {name} path must start with `/`: {path}.")]
	RelativePath {
		/// Which path failed validation.
		name: &'static str,
		/// Offending value.
		path: String,
	},
	/// Refresh endpoint must be reachable over HTTP(S).
	#[error("The refresh URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Refresh URL that failed validation.
		url: String,
	},
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug)]
pub struct GatewayConfigBuilder {
	/// Absolute refresh endpoint URL.
	pub refresh_url: Url,
	/// Endpoint paths with special semantics.
	pub endpoints: EndpointPaths,
	/// Navigation paths consulted during termination.
	pub routes: RoutePaths,
}
impl GatewayConfigBuilder {
	/// Creates a new builder seeded with the refresh URL and default paths.
	pub fn new(refresh_url: Url) -> Self {
		let mut endpoints = EndpointPaths::default();

		endpoints.refresh = refresh_url.path().to_owned();

		Self { refresh_url, endpoints, routes: RoutePaths::default() }
	}

	/// Overrides the path used to recognize refresh requests.
	pub fn refresh_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.refresh = path.into();

		self
	}

	/// Overrides the login endpoint path.
	pub fn login_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.login = path.into();

		self
	}

	/// Overrides the branch-selection endpoint path.
	pub fn branch_selection_endpoint(mut self, path: impl Into<String>) -> Self {
		self.endpoints.branch_selection = path.into();

		self
	}

	/// Overrides the login route termination navigates to.
	pub fn login_route(mut self, path: impl Into<String>) -> Self {
		self.routes.login = path.into();

		self
	}

	/// Overrides the branch-selection route that defers termination.
	pub fn branch_selection_route(mut self, path: impl Into<String>) -> Self {
		self.routes.branch_selection = path.into();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<GatewayConfig, GatewayConfigError> {
		let config = GatewayConfig {
			refresh_url: self.refresh_url,
			endpoints: self.endpoints,
			routes: self.routes,
		};

		config.validate()?;

		Ok(config)
	}
}

impl GatewayConfig {
	/// Validates invariants for the configuration.
	pub(crate) fn validate(&self) -> Result<(), GatewayConfigError> {
		if !matches!(self.refresh_url.scheme(), "http" | "https") {
			return Err(GatewayConfigError::UnsupportedScheme {
				url: self.refresh_url.to_string(),
			});
		}

		validate_path("refresh endpoint", &self.endpoints.refresh)?;
		validate_path("login endpoint", &self.endpoints.login)?;
		validate_path("branch-selection endpoint", &self.endpoints.branch_selection)?;
		validate_path("login route", &self.routes.login)?;
		validate_path("branch-selection route", &self.routes.branch_selection)?;

		Ok(())
	}
}

fn validate_path(name: &'static str, path: &str) -> Result<(), GatewayConfigError> {
	if path.starts_with('/') {
		Ok(())
	} else {
		Err(GatewayConfigError::RelativePath { name, path: path.to_owned() })
	}
}

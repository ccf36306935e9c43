//! Authenticated request gateway.
//!
//! [`Gateway::intercept`] attaches the stored access token to every outbound request,
//! forwards successes untouched, and triages authorization failures:
//!
//! - requests to the refresh endpoint pass through uncredentialed and are never refreshed;
//! - 401/403 from the login or branch-selection endpoints surface as [`Error::AuthRejected`];
//! - 401/403 from any other endpoint go to the [`RefreshCoordinator`], which replays the
//!   request once a new token is available or terminates the session;
//! - every other failure surfaces as [`Error::Passthrough`].

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	config::{EndpointClass, GatewayConfig, RoutePhase},
	error::PassthroughFailure,
	http::{ApiRequest, ApiResponse, HttpTransport},
	obs::{self, GatewayStage, StageOutcome, StageSpan},
	refresh::{HttpRefreshClient, RefreshClient, RefreshCoordinator, RefreshMetrics},
	route::RouteContext,
	store::CredentialStore,
	terminator::SessionTerminator,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = Gateway<ReqwestTransport>;

/// Outcome of [`Gateway::restore_session`].
#[derive(Debug)]
pub enum SessionRestore {
	/// No access token was stored; nothing to restore.
	Anonymous,
	/// The check request succeeded with the stored credentials.
	Restored(ApiResponse),
	/// The check request failed; stored credentials were discarded.
	Discarded(Error),
}

/// Intercepts outbound requests to attach, refresh, and replay bearer credentials.
///
/// One gateway (and therefore one [`RefreshCoordinator`]) should exist per credential
/// store. Clones share the coordinator, so refreshes stay single-flight across them.
pub struct Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Transport every request and replay is sent through.
	pub transport: Arc<T>,
	/// Credential store consulted on every request.
	pub store: Arc<dyn CredentialStore>,
	/// Endpoint and route classification.
	pub config: Arc<GatewayConfig>,
	coordinator: Arc<RefreshCoordinator>,
}
impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a gateway that refreshes through [`HttpRefreshClient`] on the same transport.
	pub fn with_transport(
		store: Arc<dyn CredentialStore>,
		router: Arc<dyn RouteContext>,
		config: GatewayConfig,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let transport = transport.into();
		let refresher: Arc<dyn RefreshClient> =
			Arc::new(HttpRefreshClient::new(transport.clone(), config.refresh_url.clone()));

		Self::with_refresh_client(store, router, config, transport, refresher)
	}

	/// Creates a gateway with a caller-provided refresh client.
	pub fn with_refresh_client(
		store: Arc<dyn CredentialStore>,
		router: Arc<dyn RouteContext>,
		config: GatewayConfig,
		transport: impl Into<Arc<T>>,
		refresher: Arc<dyn RefreshClient>,
	) -> Self {
		let config = Arc::new(config);
		let metrics = Arc::new(RefreshMetrics::default());
		let terminator =
			SessionTerminator::new(store.clone(), router, config.clone(), metrics.clone());
		let coordinator = Arc::new(RefreshCoordinator::new(
			store.clone(),
			refresher,
			terminator,
			metrics,
			config.endpoints.refresh.clone(),
		));

		Self { transport: transport.into(), store, config, coordinator }
	}

	/// Shared refresh counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.coordinator.metrics()
	}

	/// Sends `request` with the current credentials, recovering from authorization failures.
	pub async fn intercept(&self, request: ApiRequest) -> Result<ApiResponse> {
		const STAGE: GatewayStage = GatewayStage::Intercept;

		let class = request.class.unwrap_or_else(|| self.config.classify(&request.url));
		let span = StageSpan::new(STAGE, request.url.path());

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let result = span.instrument(self.dispatch(class, request)).await;

		match &result {
			Ok(_) => obs::record_stage_outcome(STAGE, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(STAGE, StageOutcome::Failure),
		}

		obs::record_request_outcome(class, &result);

		result
	}

	/// Checks the stored credentials against the backend at start-up.
	///
	/// Without a stored access token this returns [`SessionRestore::Anonymous`] and sends
	/// nothing. If `check` fails, even after a refresh attempt, the stored credentials are
	/// discarded so the application starts signed out.
	pub async fn restore_session(&self, check: ApiRequest) -> Result<SessionRestore> {
		const STAGE: GatewayStage = GatewayStage::Restore;

		if self.store.token().await?.is_none() {
			return Ok(SessionRestore::Anonymous);
		}

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		match self.intercept(check).await {
			Ok(response) => {
				obs::record_stage_outcome(STAGE, StageOutcome::Success);

				Ok(SessionRestore::Restored(response))
			},
			Err(err) => {
				obs::warn_event!(error = %err, "Stored session is invalid; discarding it.");
				obs::record_stage_outcome(STAGE, StageOutcome::Failure);
				self.store.logout().await?;

				Ok(SessionRestore::Discarded(err))
			},
		}
	}

	async fn dispatch(&self, class: EndpointClass, request: ApiRequest) -> Result<ApiResponse> {
		if class == EndpointClass::Refresh {
			return self.forward(request).await;
		}

		let token = self.store.token().await?;
		let request = match &token {
			Some(token) => request.with_bearer(token)?,
			None => request,
		};
		let response =
			self.transport.send(request.clone()).await.map_err(PassthroughFailure::from)?;

		if response.is_success() {
			return Ok(response);
		}
		if !response.is_auth_failure() {
			return Err(PassthroughFailure::Status { response }.into());
		}
		if class.is_auth_decision() {
			return Err(Error::AuthRejected { class, response });
		}
		if response.status == http::StatusCode::FORBIDDEN
			&& self.coordinator.route_phase() == RoutePhase::BranchSelection
		{
			obs::warn_event!(
				path = request.url.path(),
				"Forbidden during branch selection; attempting a refresh in case the token expired."
			);
		}

		obs::debug_event!(status = response.status.as_u16(), "Authorization failure; recovering.");

		self.coordinator.recover(token, |fresh| self.replay(request, fresh)).await
	}

	async fn replay(&self, request: ApiRequest, token: TokenSecret) -> Result<ApiResponse> {
		const STAGE: GatewayStage = GatewayStage::Replay;

		let span = StageSpan::new(STAGE, request.url.path());

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		let result = span
			.instrument(async move {
				let request = request.with_bearer(&token)?;

				self.forward(request).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_stage_outcome(STAGE, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(STAGE, StageOutcome::Failure),
		}

		result
	}

	async fn forward(&self, request: ApiRequest) -> Result<ApiResponse> {
		let response = self.transport.send(request).await.map_err(PassthroughFailure::from)?;

		if response.is_success() {
			Ok(response)
		} else {
			Err(PassthroughFailure::Status { response }.into())
		}
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestTransport> {
	/// Creates a gateway backed by a default reqwest client.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		router: Arc<dyn RouteContext>,
		config: GatewayConfig,
	) -> Self {
		Self::with_transport(store, router, config, ReqwestTransport::default())
	}
}
impl<T> Clone for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			config: self.config.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<T> Debug for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("config", &self.config)
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

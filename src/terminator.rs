//! Session termination with redirect-loop and branch-selection guards.

// self
use crate::{
	_prelude::*,
	config::{GatewayConfig, RoutePhase},
	error::RefreshFailure,
	obs::{self, GatewayStage, StageOutcome},
	refresh::RefreshMetrics,
	route::RouteContext,
	store::{CredentialStore, StoreError},
};

/// Result of a termination request. Both variants are failures for the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
	/// Credentials were cleared and the user was sent to the login route.
	Expired(RefreshFailure),
	/// The user is selecting a branch; the session was left intact.
	Deferred(RefreshFailure),
	/// The store refused to clear the credentials; the user was still sent to the login route.
	LogoutFailed(StoreError),
}
impl From<Termination> for Error {
	fn from(termination: Termination) -> Self {
		match termination {
			Termination::Expired(cause) => Error::SessionExpired { cause },
			Termination::Deferred(cause) => Error::DeferredPermission { cause },
			Termination::LogoutFailed(e) => Error::Storage(e),
		}
	}
}

/// Clears credentials and navigates to the login route once recovery is impossible.
#[derive(Clone)]
pub struct SessionTerminator {
	store: Arc<dyn CredentialStore>,
	router: Arc<dyn RouteContext>,
	config: Arc<GatewayConfig>,
	metrics: Arc<RefreshMetrics>,
}
impl SessionTerminator {
	/// Creates a terminator over the shared store and router.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		router: Arc<dyn RouteContext>,
		config: Arc<GatewayConfig>,
		metrics: Arc<RefreshMetrics>,
	) -> Self {
		Self { store, router, config, metrics }
	}

	/// Classifies the router's current path.
	pub fn route_phase(&self) -> RoutePhase {
		self.config.route_phase(&self.router.current_path())
	}

	/// Terminates the session unless the user is selecting a branch.
	///
	/// On the login route the credentials are still cleared but no navigation is issued. A
	/// store that fails to clear them yields [`Termination::LogoutFailed`] instead of
	/// [`Termination::Expired`].
	pub async fn terminate(&self, cause: RefreshFailure) -> Termination {
		let phase = self.route_phase();

		if phase == RoutePhase::BranchSelection {
			obs::warn_event!(%cause, "Deferring logout while the user selects a branch.");

			return Termination::Deferred(cause);
		}

		obs::record_stage_outcome(GatewayStage::Terminate, StageOutcome::Attempt);

		let cleared = self.store.logout().await;

		self.metrics.record_termination();

		if phase != RoutePhase::Login {
			self.router.navigate(&self.config.routes.login);
		}

		match cleared {
			Ok(()) => {
				obs::record_stage_outcome(GatewayStage::Terminate, StageOutcome::Success);
				obs::info_event!(%cause, "Session expired; credentials cleared.");

				Termination::Expired(cause)
			},
			Err(e) => {
				obs::warn_event!(error = %e, %cause, "Failed to clear credentials during termination.");
				obs::record_stage_outcome(GatewayStage::Terminate, StageOutcome::Failure);

				Termination::LogoutFailed(e)
			},
		}
	}
}
impl Debug for SessionTerminator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTerminator").field("routes", &self.config.routes).finish()
	}
}

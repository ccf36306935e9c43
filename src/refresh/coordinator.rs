//! Single-flight refresh state machine.
//!
//! The coordinator is `IDLE` or `REFRESHING`. The first caller that observes `IDLE` becomes
//! the leader of a new cycle. It flips the state and takes the cycle's result slot in one
//! critical section, so two callers can never both lead. Callers arriving while a cycle is in
//! flight queue on that cycle's slot and wake once the leader publishes:
//!
//! - a fresh access token, which every caller replays its own request with, or
//! - a [`Termination`], which every caller surfaces unchanged.
//!
//! Each cycle owns its own slot, so a queued caller can never observe an outcome from an
//! earlier cycle. If the leader is dropped before publishing, the slot is released empty
//! and the state returns to `IDLE`; queued callers then fail with
//! [`RefreshFailure::Abandoned`] instead of waiting forever.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use async_lock::MutexGuardArc;
// self
use crate::{
	_prelude::*,
	auth::{RefreshGrant, TokenSecret},
	config::RoutePhase,
	error::RefreshFailure,
	obs::{self, GatewayStage, StageOutcome, StageSpan},
	refresh::{RefreshClient, RefreshMetrics},
	store::CredentialStore,
	terminator::{SessionTerminator, Termination},
};

type Slot = Arc<AsyncMutex<Option<CycleOutcome>>>;

#[derive(Clone, Debug)]
enum CycleOutcome {
	Refreshed(TokenSecret),
	Terminated(Termination),
}

#[derive(Clone)]
struct Cycle {
	id: u64,
	slot: Slot,
}

enum RefreshState {
	Idle,
	Refreshing(Cycle),
}

enum Role<'a> {
	Leader(CycleLease<'a>),
	Waiter(Cycle),
}

/// Leader-side handle on an in-flight cycle; publishing or dropping it ends the cycle.
struct CycleLease<'a> {
	coordinator: &'a RefreshCoordinator,
	id: u64,
	guard: Option<MutexGuardArc<Option<CycleOutcome>>>,
}
impl CycleLease<'_> {
	fn publish(mut self, outcome: CycleOutcome) {
		self.coordinator.finish(self.id);

		if let Some(mut guard) = self.guard.take() {
			*guard = Some(outcome);
		}
	}
}
impl Drop for CycleLease<'_> {
	fn drop(&mut self) {
		self.coordinator.finish(self.id);
	}
}

/// Coordinates credential refreshes so at most one refresh call is in flight.
pub struct RefreshCoordinator {
	store: Arc<dyn CredentialStore>,
	refresher: Arc<dyn RefreshClient>,
	terminator: SessionTerminator,
	metrics: Arc<RefreshMetrics>,
	refresh_path: String,
	state: Mutex<RefreshState>,
	next_cycle: AtomicU64,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		refresher: Arc<dyn RefreshClient>,
		terminator: SessionTerminator,
		metrics: Arc<RefreshMetrics>,
		refresh_path: impl Into<String>,
	) -> Self {
		Self {
			store,
			refresher,
			terminator,
			metrics,
			refresh_path: refresh_path.into(),
			state: Mutex::new(RefreshState::Idle),
			next_cycle: AtomicU64::new(0),
		}
	}

	/// Shared refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Whether a refresh cycle is currently in flight.
	pub fn is_refreshing(&self) -> bool {
		matches!(*self.state.lock(), RefreshState::Refreshing(_))
	}

	/// Classifies the current route, as consulted before terminating.
	pub fn route_phase(&self) -> RoutePhase {
		self.terminator.route_phase()
	}

	/// Recovers a request that failed authorization.
	///
	/// `sent_with` is the access token the failed request carried. When the store already
	/// holds a different token, the request is replayed with it directly. Otherwise the
	/// caller either leads a new refresh cycle or queues on the one in flight, and `replay`
	/// runs with the refreshed token once it is available.
	pub async fn recover<T, R, Fut>(&self, sent_with: Option<TokenSecret>, replay: R) -> Result<T>
	where
		R: FnOnce(TokenSecret) -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		if let Some(current) = self.store.token().await? {
			if sent_with.as_ref() != Some(&current) {
				obs::debug_event!("Credential already rotated; replaying without refresh.");
				self.metrics.record_stale_replay();

				return replay(current).await;
			}
		}

		let outcome = match self.enter() {
			Role::Leader(lease) => {
				let outcome = self.run_cycle().await;

				lease.publish(outcome.clone());

				outcome
			},
			Role::Waiter(cycle) => {
				self.metrics.record_waiter();
				obs::debug_event!(cycle = cycle.id, "Refresh in flight; waiting for its outcome.");

				let published = cycle.slot.lock().await.clone();

				published.ok_or(RefreshFailure::Abandoned)?
			},
		};

		match outcome {
			CycleOutcome::Refreshed(token) => replay(token).await,
			CycleOutcome::Terminated(termination) => Err(termination.into()),
		}
	}

	fn enter(&self) -> Role<'_> {
		let mut state = self.state.lock();

		if let RefreshState::Refreshing(cycle) = &*state {
			return Role::Waiter(cycle.clone());
		}

		let id = self.next_cycle.fetch_add(1, Ordering::Relaxed);
		let slot: Slot = Arc::new(AsyncMutex::new(None));
		// A freshly created mutex is uncontended.
		let guard = slot.try_lock_arc();

		*state = RefreshState::Refreshing(Cycle { id, slot });

		Role::Leader(CycleLease { coordinator: self, id, guard })
	}

	fn finish(&self, id: u64) {
		let mut state = self.state.lock();

		if matches!(&*state, RefreshState::Refreshing(cycle) if cycle.id == id) {
			*state = RefreshState::Idle;
		}
	}

	async fn run_cycle(&self) -> CycleOutcome {
		self.metrics.record_attempt();

		let refresh_token = match self.store.refresh_token().await {
			Ok(Some(token)) => token,
			Ok(None) => {
				obs::warn_event!("No refresh token found in the credential store.");

				return self.fail(RefreshFailure::MissingRefreshToken).await;
			},
			Err(e) => return self.fail(e.into()).await,
		};
		let span = StageSpan::new(GatewayStage::Refresh, &self.refresh_path);

		obs::record_stage_outcome(GatewayStage::Refresh, StageOutcome::Attempt);

		let grant = RefreshGrant { refresh_token: refresh_token.clone() };
		let refreshed = span.instrument(self.refresher.refresh(grant)).await;
		let pair = match refreshed {
			Ok(credentials) => credentials.into_pair(refresh_token),
			Err(failure) => {
				obs::record_stage_outcome(GatewayStage::Refresh, StageOutcome::Failure);

				return self.fail(failure).await;
			},
		};
		let access_token = pair.access_token.clone();

		if let Err(e) = self.store.save(pair).await {
			obs::record_stage_outcome(GatewayStage::Refresh, StageOutcome::Failure);

			return self.fail(e.into()).await;
		}

		obs::record_stage_outcome(GatewayStage::Refresh, StageOutcome::Success);
		obs::info_event!("Access token refreshed.");
		self.metrics.record_success();

		CycleOutcome::Refreshed(access_token)
	}

	async fn fail(&self, cause: RefreshFailure) -> CycleOutcome {
		self.metrics.record_failure();

		CycleOutcome::Terminated(self.terminator.terminate(cause).await)
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("refresh_path", &self.refresh_path)
			.field("refreshing", &self.is_refreshing())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicUsize;
	// crates.io
	use tokio::sync::Notify;
	// self
	use super::*;
	use crate::{
		auth::{CredentialPair, RefreshedCredentials},
		config::GatewayConfig,
		refresh::RefreshFuture,
		route::MemoryRouter,
		store::MemoryCredentialStore,
	};

	/// Refresh client that blocks until released and counts its calls.
	#[derive(Default)]
	struct GatedRefresher {
		calls: AtomicUsize,
		gate: Notify,
		fail: bool,
	}
	impl RefreshClient for GatedRefresher {
		fn refresh(&self, grant: RefreshGrant) -> RefreshFuture<'_> {
			Box::pin(async move {
				let call = self.calls.fetch_add(1, Ordering::SeqCst);

				self.gate.notified().await;

				if self.fail {
					return Err(RefreshFailure::RefreshFailed {
						status: Some(401),
						reason: "revoked".into(),
					});
				}

				assert_eq!(grant.refresh_token.expose(), "refresh-0");

				Ok(RefreshedCredentials {
					access_token: TokenSecret::new(format!("access-{}", call + 1)),
					refresh_token: None,
				})
			})
		}
	}

	struct Fixture {
		coordinator: Arc<RefreshCoordinator>,
		refresher: Arc<GatedRefresher>,
		store: MemoryCredentialStore,
		router: MemoryRouter,
	}

	fn fixture(refresher: GatedRefresher, route: &str) -> Fixture {
		let store = MemoryCredentialStore::with_pair(CredentialPair::new("access-0", "refresh-0"));
		let router = MemoryRouter::at(route);
		let config = GatewayConfig::builder(
			Url::parse("https://api.example.com/auth/refresh")
				.expect("Refresh URL fixture should parse."),
		)
		.build()
		.expect("Gateway configuration fixture should build.");
		let metrics = Arc::new(RefreshMetrics::default());
		let refresher = Arc::new(refresher);
		let terminator = SessionTerminator::new(
			Arc::new(store.clone()),
			Arc::new(router.clone()),
			Arc::new(config),
			metrics.clone(),
		);
		let coordinator = Arc::new(RefreshCoordinator::new(
			Arc::new(store.clone()),
			refresher.clone(),
			terminator,
			metrics,
			"/auth/refresh",
		));

		Fixture { coordinator, refresher, store, router }
	}

	fn spawn_recover(
		coordinator: &Arc<RefreshCoordinator>,
		label: &'static str,
	) -> tokio::task::JoinHandle<Result<String>> {
		let coordinator = coordinator.clone();

		tokio::spawn(async move {
			coordinator
				.recover(Some(TokenSecret::new("access-0")), |token| async move {
					Ok(format!("{label}:{}", token.expose()))
				})
				.await
		})
	}

	async fn wait_for_waiters(coordinator: &RefreshCoordinator, count: u64) {
		while coordinator.metrics().waiters() < count {
			tokio::task::yield_now().await;
		}
	}

	#[tokio::test]
	async fn concurrent_failures_share_one_refresh() {
		let Fixture { coordinator, refresher, store, .. } =
			fixture(GatedRefresher::default(), "/orders");
		let leader = spawn_recover(&coordinator, "orders");

		while !coordinator.is_refreshing() {
			tokio::task::yield_now().await;
		}

		let waiters: Vec<_> = ["tables", "floors", "clients"]
			.into_iter()
			.map(|label| spawn_recover(&coordinator, label))
			.collect();

		wait_for_waiters(&coordinator, 3).await;
		refresher.gate.notify_one();

		assert_eq!(
			leader.await.expect("Leader task should join.").expect("Leader should replay."),
			"orders:access-1"
		);

		for (handle, label) in waiters.into_iter().zip(["tables", "floors", "clients"]) {
			let replayed =
				handle.await.expect("Waiter task should join.").expect("Waiter should replay.");

			assert_eq!(replayed, format!("{label}:access-1"));
		}

		assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
		assert_eq!(coordinator.metrics().attempts(), 1);
		assert!(!coordinator.is_refreshing());

		let stored = store.snapshot().expect("Refreshed credentials should be stored.");

		assert_eq!(stored.access_token.expose(), "access-1");
		assert_eq!(stored.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-0"));
	}

	#[tokio::test]
	async fn concurrent_failures_share_one_termination() {
		let Fixture { coordinator, refresher, store, router } =
			fixture(GatedRefresher { fail: true, ..Default::default() }, "/dashboard");
		let leader = spawn_recover(&coordinator, "orders");

		while !coordinator.is_refreshing() {
			tokio::task::yield_now().await;
		}

		let waiter = spawn_recover(&coordinator, "tables");

		wait_for_waiters(&coordinator, 1).await;
		refresher.gate.notify_one();

		for handle in [leader, waiter] {
			let err = handle
				.await
				.expect("Task should join.")
				.expect_err("Refresh failure should surface to every caller.");

			assert!(matches!(
				err,
				Error::SessionExpired { cause: RefreshFailure::RefreshFailed { status: Some(401), .. } }
			));
		}

		assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
		assert!(store.is_empty());
		assert_eq!(router.navigations(), vec!["/login".to_owned()]);
	}

	#[tokio::test]
	async fn rotated_credentials_replay_without_refresh() {
		let Fixture { coordinator, refresher, store, .. } =
			fixture(GatedRefresher::default(), "/orders");

		store
			.save(CredentialPair::new("access-9", "refresh-9"))
			.await
			.expect("Saving rotated credentials should succeed.");

		let replayed = coordinator
			.recover(Some(TokenSecret::new("access-0")), |token| async move {
				Ok(token.expose().to_owned())
			})
			.await
			.expect("Stale request should replay with the stored token.");

		assert_eq!(replayed, "access-9");
		assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
		assert_eq!(coordinator.metrics().stale_replays(), 1);
	}

	#[tokio::test]
	async fn dropped_leader_releases_waiters() {
		let Fixture { coordinator, refresher, store, .. } =
			fixture(GatedRefresher::default(), "/orders");
		let leader = spawn_recover(&coordinator, "orders");

		while !coordinator.is_refreshing() {
			tokio::task::yield_now().await;
		}

		let waiter = spawn_recover(&coordinator, "tables");

		wait_for_waiters(&coordinator, 1).await;
		leader.abort();

		let err = waiter
			.await
			.expect("Waiter task should join.")
			.expect_err("Waiter should fail once the leader is gone.");

		assert!(matches!(err, Error::Refresh(RefreshFailure::Abandoned)));
		assert!(!coordinator.is_refreshing());
		assert!(!store.is_empty());
		assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
	}
}

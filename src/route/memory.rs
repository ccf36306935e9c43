//! In-process [`RouteContext`] that records every navigation.

// self
use crate::{_prelude::*, route::RouteContext};

#[derive(Debug, Default)]
struct RouterState {
	current: String,
	history: Vec<String>,
}

/// Router double for headless clients and tests.
///
/// Navigating updates the current path, so a later termination observes the login route
/// and does not navigate again.
#[derive(Clone, Debug, Default)]
pub struct MemoryRouter(Arc<Mutex<RouterState>>);
impl MemoryRouter {
	/// Creates a router positioned at `path`.
	pub fn at(path: impl Into<String>) -> Self {
		Self(Arc::new(Mutex::new(RouterState { current: path.into(), history: Vec::new() })))
	}

	/// Moves to `path` without recording a navigation, as a user-initiated route change would.
	pub fn visit(&self, path: impl Into<String>) {
		self.0.lock().current = path.into();
	}

	/// Returns every path passed to [`RouteContext::navigate`], oldest first.
	pub fn navigations(&self) -> Vec<String> {
		self.0.lock().history.clone()
	}
}
impl RouteContext for MemoryRouter {
	fn current_path(&self) -> String {
		self.0.lock().current.clone()
	}

	fn navigate(&self, path: &str) {
		let mut state = self.0.lock();

		state.current = path.to_owned();
		state.history.push(path.to_owned());
	}
}

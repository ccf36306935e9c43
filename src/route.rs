//! Navigation collaborator consulted before tearing a session down.

pub mod memory;

pub use memory::MemoryRouter;

/// Client-side navigation surface.
///
/// The gateway only reads the current path to derive a [`RoutePhase`](crate::config::RoutePhase)
/// and navigates once, to the login route, when a session is terminated.
pub trait RouteContext
where
	Self: Send + Sync,
{
	/// Returns the current navigation path (query and fragment may be included).
	fn current_path(&self) -> String;

	/// Navigates to `path`.
	fn navigate(&self, path: &str);
}

//! Optional observability helpers for gateway stages.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bearer_gateway.stage` with the `stage` and
//!   `path` fields, plus events at notable session transitions.
//! - Enable `metrics` to increment the `bearer_gateway_stage_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`, and the
//!   `bearer_gateway_requests_total` counter for every intercepted request, labeled by
//!   endpoint `class` + `outcome` (`success`, `passthrough`, `rejected`, `expired`,
//!   `deferred`, `abandoned`, `error`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Pipeline stages observed by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GatewayStage {
	/// Credential attachment and first send.
	Intercept,
	/// Refresh endpoint call made by a cycle leader.
	Refresh,
	/// Re-send of a request with a refreshed credential.
	Replay,
	/// Session termination.
	Terminate,
	/// Start-up session restoration.
	Restore,
}
impl GatewayStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GatewayStage::Intercept => "intercept",
			GatewayStage::Refresh => "refresh",
			GatewayStage::Replay => "replay",
			GatewayStage::Terminate => "terminate",
			GatewayStage::Restore => "restore",
		}
	}
}
impl Display for GatewayStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

macro_rules! debug_event {
	($($arg:tt)*) => {
		#[cfg(feature = "tracing")]
		::tracing::debug!($($arg)*);
	};
}
macro_rules! info_event {
	($($arg:tt)*) => {
		#[cfg(feature = "tracing")]
		::tracing::info!($($arg)*);
	};
}
macro_rules! warn_event {
	($($arg:tt)*) => {
		#[cfg(feature = "tracing")]
		::tracing::warn!($($arg)*);
	};
}
pub(crate) use {debug_event, info_event, warn_event};

// self
use crate::{
	_prelude::*,
	config::EndpointClass,
	http::ApiResponse,
	obs::{GatewayStage, StageOutcome},
};

/// Records a stage outcome via the global metrics recorder (when enabled).
pub fn record_stage_outcome(stage: GatewayStage, outcome: StageOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bearer_gateway_stage_total",
			"stage" => stage.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome);
	}
}

/// Counts one intercepted request under `bearer_gateway_requests_total`, labeled by the
/// endpoint class it was routed as and by how it ended.
pub fn record_request_outcome(class: EndpointClass, result: &Result<ApiResponse>) {
	let outcome = request_outcome(result);

	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"bearer_gateway_requests_total",
			"class" => class.as_str(),
			"outcome" => outcome
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (class, outcome);
	}
}

/// Stable label for the way a request ended.
pub fn request_outcome(result: &Result<ApiResponse>) -> &'static str {
	match result {
		Ok(_) => "success",
		Err(Error::Passthrough(_)) => "passthrough",
		Err(Error::AuthRejected { .. }) => "rejected",
		Err(Error::SessionExpired { .. }) => "expired",
		Err(Error::DeferredPermission { .. }) => "deferred",
		Err(Error::Refresh(_)) => "abandoned",
		Err(Error::Storage(_) | Error::Config(_)) => "error",
	}
}

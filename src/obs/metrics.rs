// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_token_manager_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records the outcome of a finished request, distinguishing empty tokens from real ones.
pub fn record_result<T, E>(
	kind: FlowKind,
	result: &Result<T, E>,
	is_empty: impl FnOnce(&T) -> bool,
) {
	let outcome = match result {
		Ok(value) if is_empty(value) => FlowOutcome::Empty,
		Ok(_) => FlowOutcome::Success,
		Err(_) => FlowOutcome::Failure,
	};

	record_flow_outcome(kind, outcome);
}

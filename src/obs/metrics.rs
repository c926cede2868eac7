// self
use crate::obs::{AuthOutcome, AuthStage};

/// Records a stage outcome via the global metrics recorder and the tracing subscriber (when
/// enabled).
pub fn record_auth_outcome(stage: AuthStage, outcome: AuthOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"session_broker_auth_total",
			"stage" => stage.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(feature = "tracing")]
	match outcome {
		AuthOutcome::Failure =>
			tracing::warn!(stage = stage.as_str(), outcome = outcome.as_str(), "auth stage failed"),
		_ => tracing::debug!(stage = stage.as_str(), outcome = outcome.as_str(), "auth stage"),
	}

	#[cfg(not(any(feature = "metrics", feature = "tracing")))]
	{
		let _ = (stage, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_auth_outcome_is_infallible_without_recorder() {
		record_auth_outcome(AuthStage::Recovery, AuthOutcome::Failure);
		record_auth_outcome(AuthStage::Bootstrap, AuthOutcome::NoSession);
	}
}

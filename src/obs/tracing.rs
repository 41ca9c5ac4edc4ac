// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by token flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("oauth2_token_manager.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs that a request is being sent without a token because acquisition failed.
pub fn log_interceptor_fallback(owner: &dyn Display, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			owner = %owner,
			error = %error,
			"Token acquisition failed; sending the request without a token."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (owner, error);
	}
}

/// Logs that a `401` response triggered a forced renewal.
pub fn log_interceptor_retry(owner: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(owner = %owner, "Upstream answered 401; retrying with a renewed token.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = owner;
	}
}

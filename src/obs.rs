//! Optional observability helpers for token acquisition.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_token_manager.flow` with the `flow`
//!   (grant) and `stage` (call site) fields, plus warnings when the interceptor has to send a
//!   request without a token.
//! - Enable `metrics` to increment the `oauth2_token_manager_flow_total` counter for every
//!   attempt, acquisition, and outcome, labeled by `flow` + `outcome`. Cache hits are counted by
//!   [`CacheMetrics`](crate::cache::CacheMetrics).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Token flows observed by the manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Back-channel `client_credentials` acquisition.
	ClientCredentials,
	/// Delegated user token renewed from the session.
	UserRefresh,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::UserRefresh => "user_refresh",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to [`TokenManager::get_access_token`](crate::manager::TokenManager::get_access_token).
	Attempt,
	/// Acquisition round trip started.
	Acquire,
	/// Successful completion.
	Success,
	/// Completed without a token (no session or refresh token).
	Empty,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Acquire => "acquire",
			FlowOutcome::Success => "success",
			FlowOutcome::Empty => "empty",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

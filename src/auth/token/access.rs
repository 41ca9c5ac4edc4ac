//! Access tokens returned by the manager.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
};

/// Access token plus the metadata the cache needs to judge freshness.
///
/// A token whose value is blank means "no token available". The manager returns such tokens as
/// successes (for example when a user has no session) and callers decide whether to proceed
/// without credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
	/// Bearer value; callers must avoid logging it.
	pub value: TokenSecret,
	/// Instant after which the token must no longer be used.
	pub expires_at: OffsetDateTime,
	/// Scope granted by the token endpoint, when reported.
	pub scope: Option<ScopeSet>,
}
impl AccessToken {
	/// Creates a token that expires at the provided instant.
	pub fn new(value: impl Into<TokenSecret>, expires_at: OffsetDateTime) -> Self {
		Self { value: value.into(), expires_at, scope: None }
	}

	/// Creates the "no token available" value.
	pub fn empty() -> Self {
		Self { value: TokenSecret::default(), expires_at: OffsetDateTime::UNIX_EPOCH, scope: None }
	}

	/// Attaches the granted scope.
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Returns `true` when the token carries no usable value.
	pub fn is_empty(&self) -> bool {
		self.value.is_blank()
	}

	/// Returns `true` if the token has a value and stays valid past `now + skew`.
	///
	/// The skew shortens the usable lifetime so a token is never attached moments before the
	/// resource server would consider it expired.
	pub fn is_fresh_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		!self.is_empty() && now < self.expires_at - skew
	}

	/// Remaining lifetime at `now`, clamped at zero.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - now;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}

	/// Formats the `Authorization` header value (`Bearer <token>`).
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.value.expose())
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("value", &self.value)
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.finish()
	}
}

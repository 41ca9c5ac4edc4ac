//! Authentication-session boundary for delegated user tokens.
//!
//! A signed-in user's session owns their refresh token (and usually a still-valid access token).
//! The manager reads it before renewing and writes rotated values back; where the session lives
//! (cookie, database, distributed cache) is up to the [`SessionStore`] implementation.

pub mod memory;

pub use memory::MemorySessionStore;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, SchemeName, SubjectId, TokenSecret},
};

/// Boxed future returned by [`SessionStore`] implementations.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SessionError>> + 'a + Send>>;

/// Storage contract for per-user session tokens.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Loads the tokens stored for the key, if any.
	fn load<'a>(&'a self, key: &'a SessionKey) -> SessionFuture<'a, Option<UserTokens>>;

	/// Persists or replaces the tokens stored for the key.
	fn store(&self, key: SessionKey, tokens: UserTokens) -> SessionFuture<'_, ()>;

	/// Removes the tokens stored for the key (sign-out).
	fn clear<'a>(&'a self, key: &'a SessionKey) -> SessionFuture<'a, ()>;
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionError {
	/// Session payload could not be encoded or decoded.
	#[error("Session serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the session storage.
	#[error("Session backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Identifies one user session under one authentication scheme.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
	/// Signed-in user.
	pub subject: SubjectId,
	/// Authentication scheme the session belongs to.
	pub scheme: Option<SchemeName>,
}
impl SessionKey {
	/// Creates a session key.
	pub fn new(subject: SubjectId, scheme: Option<SchemeName>) -> Self {
		Self { subject, scheme }
	}
}

/// Tokens held by a user's authentication session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTokens {
	/// Most recent access token for the default request shape.
	pub access_token: AccessToken,
	/// Refresh token used to renew the access token.
	pub refresh_token: Option<TokenSecret>,
}
impl UserTokens {
	/// Creates session tokens.
	pub fn new(access_token: AccessToken, refresh_token: Option<TokenSecret>) -> Self {
		Self { access_token, refresh_token }
	}

	/// Returns the refresh token when it carries a usable value.
	pub fn usable_refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref().filter(|token| !token.is_blank())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn session_error_converts_into_manager_error_with_source() {
		let session_error = SessionError::Backend { message: "redis unreachable".into() };
		let error: Error = session_error.clone().into();

		assert!(matches!(error, Error::Session(_)));
		assert!(error.to_string().contains("redis unreachable"));

		let source =
			StdError::source(&error).expect("Manager error should expose the session error.");

		assert_eq!(source.to_string(), session_error.to_string());
	}

	#[test]
	fn blank_refresh_tokens_are_unusable() {
		let tokens = UserTokens::new(AccessToken::empty(), Some(TokenSecret::new("  ")));

		assert!(tokens.usable_refresh_token().is_none());
	}
}

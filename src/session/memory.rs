//! Thread-safe in-memory [`SessionStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	session::{SessionError, SessionFuture, SessionKey, SessionStore, UserTokens},
};

type SessionMap = Arc<RwLock<HashMap<SessionKey, UserTokens>>>;

/// Session store that keeps user tokens in-process.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore(SessionMap);
impl MemorySessionStore {
	/// Seeds a session synchronously, typically right after sign-in.
	pub fn insert(&self, key: SessionKey, tokens: UserTokens) {
		self.0.write().insert(key, tokens);
	}

	/// Returns a snapshot of the stored tokens.
	pub fn get(&self, key: &SessionKey) -> Option<UserTokens> {
		self.0.read().get(key).cloned()
	}

	fn store_now(map: SessionMap, key: SessionKey, tokens: UserTokens) -> Result<(), SessionError> {
		map.write().insert(key, tokens);

		Ok(())
	}
}
impl SessionStore for MemorySessionStore {
	fn load<'a>(&'a self, key: &'a SessionKey) -> SessionFuture<'a, Option<UserTokens>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn store(&self, key: SessionKey, tokens: UserTokens) -> SessionFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::store_now(map, key, tokens) })
	}

	fn clear<'a>(&'a self, key: &'a SessionKey) -> SessionFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(key);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{AccessToken, SchemeName, SubjectId, TokenSecret};

	fn key(scheme: Option<&str>) -> SessionKey {
		SessionKey::new(
			SubjectId::new("alice").expect("Subject should be valid."),
			scheme.map(|value| SchemeName::new(value).expect("Scheme should be valid.")),
		)
	}

	#[test]
	fn sessions_are_partitioned_by_scheme() {
		let store = MemorySessionStore::default();
		let tokens = UserTokens::new(
			AccessToken::new("user-token", macros::datetime!(2025-01-01 01:00 UTC)),
			Some(TokenSecret::new("refresh-1")),
		);

		futures::executor::block_on(store.store(key(Some("oidc")), tokens.clone()))
			.expect("Store should succeed.");

		let loaded = futures::executor::block_on(store.load(&key(Some("oidc"))))
			.expect("Load should succeed.");

		assert_eq!(loaded, Some(tokens));
		assert!(store.get(&key(None)).is_none());

		futures::executor::block_on(store.clear(&key(Some("oidc"))))
			.expect("Clear should succeed.");

		assert!(store.get(&key(Some("oidc"))).is_none());
	}
}

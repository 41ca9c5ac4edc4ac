//! Token lifecycle manager.
//!
//! [`TokenManager::get_access_token`] is the single entry point: it merges the owner's registered
//! defaults with the per-call parameters, normalizes the result into a cache key, and lets the
//! [`TokenCache`] decide between a cache hit and a (single-flight) acquisition. Acquisitions for
//! client owners run the `client_credentials` grant; acquisitions for user owners go through the
//! user's authentication session and the `refresh_token` grant.

mod client_credentials;
mod request;
mod user;

pub use request::*;

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	assertion::{ClientAssertionService, NoAssertions},
	auth::{AccessToken, ClientName, SchemeName, ScopeSet},
	cache::{CacheMetrics, OwnerKey, TokenCache},
	client::{ClientDescriptor, TokenManagerOptions},
	clock::{Clock, SystemClock},
	endpoint::{TokenEndpoint, TokenEndpointResponse},
	error::ConfigError,
	session::{MemorySessionStore, SessionKey, SessionStore},
};

/// Acquires, caches, and renews access tokens for clients and signed-in users.
///
/// Cloning is cheap; clones share registrations and the cache.
#[derive(Clone)]
pub struct TokenManager {
	inner: Arc<ManagerInner>,
}
impl TokenManager {
	/// Starts building a manager that acquires tokens through `endpoint`.
	pub fn builder(endpoint: impl 'static + TokenEndpoint) -> TokenManagerBuilder {
		TokenManagerBuilder::new(Arc::new(endpoint))
	}

	/// Returns an access token for `owner`, from cache when still fresh.
	///
	/// A token with an empty value is a success meaning "no token available" (for example a user
	/// without a session). Acquisition failures are returned as errors and never retried here.
	pub async fn get_access_token(
		&self,
		owner: &TokenOwner,
		params: &TokenRequestParameters,
	) -> Result<AccessToken> {
		self.dispatch(owner, params, None).await
	}

	/// Like [`TokenManager::get_access_token`], but gives up waiting once `cancel` fires.
	///
	/// Cancelling does not abort an acquisition other callers are waiting on.
	pub async fn get_access_token_with_cancellation(
		&self,
		owner: &TokenOwner,
		params: &TokenRequestParameters,
		cancel: &CancellationToken,
	) -> Result<AccessToken> {
		self.dispatch(owner, params, Some(cancel)).await
	}

	/// Evicts every cached token of a client registration.
	pub fn remove_client_token(&self, client: &ClientName) {
		self.inner.cache.invalidate_owner(&OwnerKey::Client(client.clone()));
	}

	/// Evicts the user's cached tokens and clears their session tokens (sign-out).
	///
	/// Covers every registered scheme, so tokens obtained through a challenge scheme override go
	/// too.
	pub async fn remove_user_token(&self, user: &UserContext) -> Result<()> {
		let mut schemes = self.inner.user_clients.keys().cloned().collect::<Vec<_>>();

		schemes.push(self.inner.effective_scheme(None, user));
		schemes.sort();
		schemes.dedup();

		self.inner.cache.invalidate_subject(&user.subject);

		for scheme in schemes {
			self.inner.sessions.clear(&SessionKey::new(user.subject.clone(), scheme)).await?;
		}

		Ok(())
	}

	/// Drops cached tokens that are no longer fresh and returns how many keys were removed.
	///
	/// Expired entries otherwise stay until renewed or evicted; long-running hosts with many
	/// distinct users should call this periodically.
	pub fn prune_expired_tokens(&self) -> usize {
		self.inner.cache.prune_expired()
	}

	/// Returns the registration for a client name.
	pub fn client(&self, name: &ClientName) -> Option<&ClientDescriptor> {
		self.inner.clients.get(name).map(Arc::as_ref)
	}

	/// Manager-wide options.
	pub fn options(&self) -> &TokenManagerOptions {
		&self.inner.options
	}

	/// Cache counters.
	pub fn cache_metrics(&self) -> &Arc<CacheMetrics> {
		self.inner.cache.metrics()
	}

	async fn dispatch(
		&self,
		owner: &TokenOwner,
		params: &TokenRequestParameters,
		cancel: Option<&CancellationToken>,
	) -> Result<AccessToken> {
		match owner {
			TokenOwner::Client(name) => self.client_token(name, params, cancel).await,
			TokenOwner::User(user) => self.user_token(user, params, cancel).await,
		}
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("clients", &self.inner.clients.keys().collect::<Vec<_>>())
			.field("user_schemes", &self.inner.user_clients.keys().collect::<Vec<_>>())
			.field("options", &self.inner.options)
			.field("cache", &self.inner.cache)
			.finish()
	}
}

/// Builder for [`TokenManager`].
pub struct TokenManagerBuilder {
	endpoint: Arc<dyn TokenEndpoint>,
	assertions: Arc<dyn ClientAssertionService>,
	sessions: Arc<dyn SessionStore>,
	clock: Arc<dyn Clock>,
	options: TokenManagerOptions,
	clients: HashMap<ClientName, Arc<ClientDescriptor>>,
	user_clients: HashMap<Option<SchemeName>, Arc<ClientDescriptor>>,
}
impl TokenManagerBuilder {
	/// Creates a builder with no registrations, no assertions, and an in-memory session store.
	pub fn new(endpoint: Arc<dyn TokenEndpoint>) -> Self {
		Self {
			endpoint,
			assertions: Arc::new(NoAssertions),
			sessions: Arc::new(MemorySessionStore::default()),
			clock: Arc::new(SystemClock),
			options: TokenManagerOptions::default(),
			clients: HashMap::new(),
			user_clients: HashMap::new(),
		}
	}

	/// Sets the assertion provider.
	pub fn assertions(mut self, assertions: Arc<dyn ClientAssertionService>) -> Self {
		self.assertions = assertions;

		self
	}

	/// Sets the session store used by user owners.
	pub fn sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
		self.sessions = sessions;

		self
	}

	/// Sets the clock used for freshness checks and expiry computation.
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Sets manager-wide options.
	pub fn options(mut self, options: TokenManagerOptions) -> Self {
		self.options = options;

		self
	}

	/// Registers a back-channel client under its descriptor name.
	pub fn client(mut self, descriptor: ClientDescriptor) -> Self {
		self.clients.insert(descriptor.name.clone(), Arc::new(descriptor));

		self
	}

	/// Registers the client that renews user tokens for `scheme` (`None` is the default scheme).
	pub fn user_client(mut self, scheme: Option<SchemeName>, descriptor: ClientDescriptor) -> Self {
		self.user_clients.insert(scheme, Arc::new(descriptor));

		self
	}

	/// Builds the manager.
	pub fn build(self) -> TokenManager {
		let cache = TokenCache::new(self.clock.clone(), self.options.clock_skew);

		TokenManager {
			inner: Arc::new(ManagerInner {
				endpoint: self.endpoint,
				assertions: self.assertions,
				sessions: self.sessions,
				clock: self.clock,
				options: self.options,
				clients: self.clients,
				user_clients: self.user_clients,
				cache,
			}),
		}
	}
}
impl Debug for TokenManagerBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManagerBuilder")
			.field("clients", &self.clients.keys().collect::<Vec<_>>())
			.field("user_schemes", &self.user_clients.keys().collect::<Vec<_>>())
			.field("options", &self.options)
			.finish()
	}
}

struct ManagerInner {
	endpoint: Arc<dyn TokenEndpoint>,
	assertions: Arc<dyn ClientAssertionService>,
	sessions: Arc<dyn SessionStore>,
	clock: Arc<dyn Clock>,
	options: TokenManagerOptions,
	clients: HashMap<ClientName, Arc<ClientDescriptor>>,
	user_clients: HashMap<Option<SchemeName>, Arc<ClientDescriptor>>,
	cache: TokenCache,
}
impl ManagerInner {
	fn client_descriptor(&self, name: &ClientName) -> Result<Arc<ClientDescriptor>> {
		self.clients
			.get(name)
			.cloned()
			.ok_or_else(|| ConfigError::UnknownClient { client: name.to_string() }.into())
	}

	fn user_descriptor(&self, scheme: Option<&SchemeName>) -> Result<Arc<ClientDescriptor>> {
		self.user_clients.get(&scheme.cloned()).cloned().ok_or_else(|| {
			ConfigError::UnknownScheme {
				scheme: scheme.map_or_else(|| "<default>".into(), ToString::to_string),
			}
			.into()
		})
	}

	/// Challenge scheme override, then the user's own scheme, then the configured default.
	fn effective_scheme(
		&self,
		challenge_scheme: Option<&SchemeName>,
		user: &UserContext,
	) -> Option<SchemeName> {
		challenge_scheme
			.or(user.scheme.as_ref())
			.or(self.options.default_scheme.as_ref())
			.cloned()
	}

	/// Converts an endpoint response into a token, defaulting the lifetime when none is reported.
	fn token_from_response(
		&self,
		response: &TokenEndpointResponse,
		requested_scope: Option<&ScopeSet>,
	) -> AccessToken {
		let lifetime = response.expires_in.unwrap_or(self.options.default_token_lifetime);
		let token = AccessToken::new(response.access_token.clone(), self.clock.now() + lifetime);

		match response.scope.as_ref().or(requested_scope) {
			Some(scope) => token.with_scope(scope.clone()),
			None => token,
		}
	}
}

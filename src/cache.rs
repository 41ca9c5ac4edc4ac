//! Token cache with per-key single-flight acquisition.
//!
//! Each [`CacheKey`] owns a slot holding the last good entry plus, while a renewal runs, a shared
//! handle to that renewal. Callers arriving during a renewal join the shared handle instead of
//! starting their own, so the token endpoint sees at most one request per key at a time. The
//! outer map lock is only held long enough to find or create a slot; different keys renew in
//! parallel. A slot that ends up with neither an entry nor an acquisition is pruned from the map.

mod metrics;

pub use metrics::CacheMetrics;

// std
use std::{any::Any, panic::AssertUnwindSafe, pin::pin, sync::Weak};
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use futures::{
	FutureExt,
	future::{self, BoxFuture, Either, Shared},
};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ClientName, SchemeName, ScopeSet, SubjectId},
	clock::Clock,
};

type SharedAcquisition = Shared<BoxFuture<'static, Result<AccessToken>>>;
type SlotMap = Mutex<HashMap<CacheKey, Arc<CacheSlot>>>;

/// Identity whose tokens a cache entry belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OwnerKey {
	/// Back-channel client registration.
	Client(ClientName),
	/// Signed-in user under an authentication scheme.
	User {
		/// User identity.
		subject: SubjectId,
		/// Effective challenge scheme.
		scheme: Option<SchemeName>,
	},
}
impl Display for OwnerKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			OwnerKey::Client(name) => write!(f, "client:{name}"),
			OwnerKey::User { subject, scheme: Some(scheme) } =>
				write!(f, "user:{subject}@{scheme}"),
			OwnerKey::User { subject, scheme: None } => write!(f, "user:{subject}"),
		}
	}
}

/// Normalized identity of one cached token.
///
/// Two requests share a key exactly when they have the same owner and the same normalized scope,
/// resource, and extra parameters. Empty scope sets normalize to "no scope".
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
	owner: OwnerKey,
	scope: Option<ScopeSet>,
	resource: Option<String>,
	parameters: BTreeMap<String, String>,
}
impl CacheKey {
	/// Builds a normalized key.
	pub fn new(
		owner: OwnerKey,
		scope: Option<ScopeSet>,
		resource: Option<String>,
		parameters: BTreeMap<String, String>,
	) -> Self {
		Self {
			owner,
			scope: scope.filter(|scope| !scope.is_empty()),
			resource: resource.filter(|resource| !resource.is_empty()),
			parameters,
		}
	}

	/// Owner component.
	pub fn owner(&self) -> &OwnerKey {
		&self.owner
	}

	/// Scope component.
	pub fn scope(&self) -> Option<&ScopeSet> {
		self.scope.as_ref()
	}

	/// Resource component.
	pub fn resource(&self) -> Option<&str> {
		self.resource.as_deref()
	}

	/// Extra parameter component.
	pub fn parameters(&self) -> &BTreeMap<String, String> {
		&self.parameters
	}

	/// Stable SHA-256 fingerprint suitable for log fields.
	pub fn fingerprint(&self) -> String {
		let mut hasher = Sha256::new();

		hasher.update(self.owner.to_string().as_bytes());
		hasher.update([0]);
		hasher.update(self.scope.as_ref().map(ScopeSet::normalized).unwrap_or_default().as_bytes());
		hasher.update([0]);
		hasher.update(self.resource.as_deref().unwrap_or_default().as_bytes());

		for (name, value) in &self.parameters {
			hasher.update([0]);
			hasher.update(name.as_bytes());
			hasher.update([b'=']);
			hasher.update(value.as_bytes());
		}

		URL_SAFE_NO_PAD.encode(hasher.finalize())
	}
}

/// Cached token together with the key it was issued for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
	/// Last successfully acquired token.
	pub token: AccessToken,
	/// Key the token belongs to.
	pub key: CacheKey,
}

#[derive(Default)]
struct SlotState {
	entry: Option<CacheEntry>,
	in_flight: Option<SharedAcquisition>,
}
impl SlotState {
	fn is_vacant(&self) -> bool {
		self.entry.is_none() && self.in_flight.is_none()
	}
}

#[derive(Default)]
struct CacheSlot {
	state: Mutex<SlotState>,
}

/// Single-flight token cache.
pub struct TokenCache {
	slots: Arc<SlotMap>,
	clock: Arc<dyn Clock>,
	clock_skew: Duration,
	metrics: Arc<CacheMetrics>,
}
impl TokenCache {
	/// Creates an empty cache judging freshness with `clock` and `clock_skew`.
	pub fn new(clock: Arc<dyn Clock>, clock_skew: Duration) -> Self {
		Self { slots: Default::default(), clock, clock_skew, metrics: Default::default() }
	}

	/// Counters describing cache behavior.
	pub fn metrics(&self) -> &Arc<CacheMetrics> {
		&self.metrics
	}

	/// Returns the cached token for `key` without judging freshness.
	pub fn cached(&self, key: &CacheKey) -> Option<AccessToken> {
		let slot = self.slots.lock().get(key).cloned()?;
		let state = slot.state.lock();

		state.entry.as_ref().map(|entry| entry.token.clone())
	}

	/// Number of keys currently tracked.
	pub fn len(&self) -> usize {
		self.slots.lock().len()
	}

	/// Whether no key is tracked.
	pub fn is_empty(&self) -> bool {
		self.slots.lock().is_empty()
	}

	/// Drops the cached entry for `key`; an acquisition already in flight still completes.
	pub fn invalidate(&self, key: &CacheKey) {
		self.invalidate_where(|candidate| candidate == key);
	}

	/// Drops every cached entry whose owner matches.
	pub fn invalidate_owner(&self, owner: &OwnerKey) {
		self.invalidate_where(|key| key.owner() == owner);
	}

	/// Drops every cached entry of a user, under any scheme.
	pub fn invalidate_subject(&self, subject: &SubjectId) {
		self.invalidate_where(
			|key| matches!(key.owner(), OwnerKey::User { subject: s, .. } if s == subject),
		);
	}

	/// Drops entries that are no longer fresh and have no acquisition in flight.
	///
	/// Returns the number of keys removed.
	pub fn prune_expired(&self) -> usize {
		let now = self.clock.now();
		let mut slots = self.slots.lock();
		let before = slots.len();

		slots.retain(|_, slot| {
			let mut state = slot.state.lock();
			let stale = state
				.entry
				.as_ref()
				.is_some_and(|entry| !entry.token.is_fresh_at(now, self.clock_skew));

			if stale {
				state.entry = None;
			}

			!state.is_vacant()
		});

		before - slots.len()
	}

	fn invalidate_where(&self, matches: impl Fn(&CacheKey) -> bool) {
		self.slots.lock().retain(|key, slot| {
			if !matches(key) {
				return true;
			}

			let mut state = slot.state.lock();

			state.entry = None;

			state.in_flight.is_some()
		});
	}

	/// Returns a fresh cached token or joins/starts the acquisition for `key`.
	///
	/// `acquire` is only invoked when this caller starts a new acquisition. Successful non-empty
	/// results replace the cached entry; failures and empty tokens leave it untouched. Every
	/// caller that joined the same acquisition receives the same result.
	pub async fn resolve<F, Fut>(
		&self,
		key: &CacheKey,
		force_renewal: bool,
		acquire: F,
	) -> Result<AccessToken>
	where
		F: Send + FnOnce() -> Fut,
		Fut: 'static + Send + Future<Output = Result<AccessToken>>,
	{
		self.resolve_with_cancellation(key, force_renewal, None, acquire).await
	}

	/// Like [`TokenCache::resolve`], but stops waiting once `cancel` fires.
	///
	/// Cancelling only abandons this caller's wait; the shared acquisition stays registered and
	/// keeps serving the other waiters.
	pub async fn resolve_with_cancellation<F, Fut>(
		&self,
		key: &CacheKey,
		force_renewal: bool,
		cancel: Option<&CancellationToken>,
		acquire: F,
	) -> Result<AccessToken>
	where
		F: Send + FnOnce() -> Fut,
		Fut: 'static + Send + Future<Output = Result<AccessToken>>,
	{
		if cancel.is_some_and(CancellationToken::is_cancelled) {
			return Err(Error::Cancelled);
		}

		let slot;
		let shared = {
			let mut state;

			{
				let mut slots = self.slots.lock();

				slot = slots.entry(key.clone()).or_default().clone();
				// Locked before the map guard is released so invalidation cannot orphan this slot.
				state = slot.state.lock();
			}

			if !force_renewal {
				let now = self.clock.now();

				let fresh = state
					.entry
					.as_ref()
					.filter(|entry| entry.token.is_fresh_at(now, self.clock_skew));

				if let Some(entry) = fresh {
					self.metrics.record_hit();

					return Ok(entry.token.clone());
				}
			}

			match &state.in_flight {
				Some(in_flight) => {
					self.metrics.record_join();

					in_flight.clone()
				},
				None => {
					self.metrics.record_acquisition();

					let acquisition = Self::acquisition(
						Arc::downgrade(&self.slots),
						Arc::downgrade(&slot),
						key.clone(),
						Arc::clone(&self.metrics),
						acquire(),
					)
					.boxed()
					.shared();

					state.in_flight = Some(acquisition.clone());

					acquisition
				},
			}
		};

		match cancel {
			Some(cancel) => match future::select(pin!(shared), pin!(cancel.cancelled())).await {
				Either::Left((result, _)) => result,
				Either::Right(_) => Err(Error::Cancelled),
			},
			None => shared.await,
		}
	}

	async fn acquisition<Fut>(
		slots: Weak<SlotMap>,
		slot: Weak<CacheSlot>,
		key: CacheKey,
		metrics: Arc<CacheMetrics>,
		work: Fut,
	) -> Result<AccessToken>
	where
		Fut: Future<Output = Result<AccessToken>>,
	{
		// A panic must not leave the shared future registered; every joined waiter gets an error.
		let result = AssertUnwindSafe(work).catch_unwind().await.unwrap_or_else(|payload| {
			Err(Error::AcquisitionFailed {
				error: "acquisition_panicked".into(),
				description: Some(panic_message(payload.as_ref())),
				status: None,
			})
		});

		if result.is_err() {
			metrics.record_failure();
		}

		let Some(slot) = slot.upgrade() else {
			return result;
		};
		let vacant = {
			let mut state = slot.state.lock();

			state.in_flight = None;

			match &result {
				Ok(token) if !token.is_empty() =>
					state.entry = Some(CacheEntry { token: token.clone(), key: key.clone() }),
				_ => (),
			}

			state.is_vacant()
		};

		if !vacant {
			return result;
		}
		if let Some(slots) = slots.upgrade() {
			let mut slots = slots.lock();
			let prunable = slots.get(&key).is_some_and(|current| {
				Arc::ptr_eq(current, &slot) && current.state.lock().is_vacant()
			});

			if prunable {
				slots.remove(&key);
			}
		}

		result
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("keys", &self.slots.lock().len())
			.field("clock_skew", &self.clock_skew)
			.field("metrics", &self.metrics)
			.finish()
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	payload
		.downcast_ref::<&str>()
		.map(|message| (*message).to_owned())
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "token acquisition panicked".into())
}

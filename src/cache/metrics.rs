// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for cache lookups.
#[derive(Debug, Default)]
pub struct CacheMetrics {
	hits: AtomicU64,
	joins: AtomicU64,
	acquisitions: AtomicU64,
	failures: AtomicU64,
}
impl CacheMetrics {
	/// Returns the number of lookups served from a fresh entry.
	pub fn hits(&self) -> u64 {
		self.hits.load(Ordering::Relaxed)
	}

	/// Returns the number of callers that joined an acquisition already in flight.
	pub fn joins(&self) -> u64 {
		self.joins.load(Ordering::Relaxed)
	}

	/// Returns the number of acquisitions started.
	pub fn acquisitions(&self) -> u64 {
		self.acquisitions.load(Ordering::Relaxed)
	}

	/// Returns the number of acquisitions that failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_join(&self) {
		self.joins.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_acquisition(&self) {
		self.acquisitions.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}

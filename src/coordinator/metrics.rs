// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for renewal and retry activity.
#[derive(Debug, Default)]
pub struct RenewalMetrics {
	started: AtomicU64,
	succeeded: AtomicU64,
	no_session: AtomicU64,
	failed: AtomicU64,
	retries: AtomicU64,
	queued: AtomicU64,
}
impl RenewalMetrics {
	/// Returns the number of network calls made to the refresh endpoint.
	pub fn renewals_started(&self) -> u64 {
		self.started.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals that produced a token.
	pub fn renewals_succeeded(&self) -> u64 {
		self.succeeded.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals that reported no active session.
	pub fn renewals_without_session(&self) -> u64 {
		self.no_session.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals that failed.
	pub fn renewals_failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that entered recovery after a 401.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that waited on a recovery started by another request.
	pub fn queued(&self) -> u64 {
		self.queued.load(Ordering::Relaxed)
	}

	pub(crate) fn record_started(&self) {
		self.started.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_succeeded(&self) {
		self.succeeded.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_no_session(&self) {
		self.no_session.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failed(&self) {
		self.failed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_queued(&self) {
		self.queued.fetch_add(1, Ordering::Relaxed);
	}
}

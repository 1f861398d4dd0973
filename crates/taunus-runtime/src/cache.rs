//! Two-tier view model cache.
//!
//! Lookups walk the tiers in order (memory, then persistent). Each tier gets
//! a bounded amount of time to answer; a tier that is slow, broken or holds
//! only stale data counts as a miss and the next tier is asked. The cache is
//! an optimization only: every storage failure degrades to a miss.
//!
//! Values handed out are independent copies of what was stored.

mod entry;
mod memory;
mod persistent;

pub use entry::CacheEntry;
pub use memory::MemoryStore;
pub use persistent::{MAX_BUFFERED_WRITES, PersistentStore, StoreCapability};

use crate::platform::Scheduler;
use futures::future::{self, Either, LocalBoxFuture};
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by cache storage backends. Never surfaced past [`Cache`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
	/// The backend cannot be used in this environment.
	#[error("Storage unavailable: {0}")]
	Unavailable(String),
	/// A read or write failed.
	#[error("Storage operation failed: {0}")]
	Backend(String),
	/// A stored record could not be converted.
	#[error("Stored record is malformed: {0}")]
	Malformed(String),
}

/// One tier of the cache.
///
/// Implementations may perform work eagerly when called; the returned future
/// only reports completion.
pub trait CacheStore {
	/// Reads the entry stored under `key`.
	fn get(&self, key: &str) -> LocalBoxFuture<'static, Result<Option<CacheEntry>, StoreError>>;

	/// Stores `entry` under `key`.
	fn set(&self, key: &str, entry: CacheEntry) -> LocalBoxFuture<'static, Result<(), StoreError>>;
}

struct Tier {
	name: &'static str,
	store: Rc<dyn CacheStore>,
	timeout: Duration,
}

/// The tiered cache used by fetch interception and prefetching.
pub struct Cache {
	scheduler: Rc<dyn Scheduler>,
	tiers: Vec<Tier>,
}

impl std::fmt::Debug for Cache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Cache")
			.field("tiers", &self.tiers.iter().map(|t| t.name).collect::<Vec<_>>())
			.finish()
	}
}

impl Cache {
	/// Creates a cache with no tiers; every lookup misses.
	pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
		Self {
			scheduler,
			tiers: Vec::new(),
		}
	}

	/// Appends a tier that is consulted after the existing ones.
	pub fn with_tier(mut self, name: &'static str, store: Rc<dyn CacheStore>, timeout: Duration) -> Self {
		self.tiers.push(Tier {
			name,
			store,
			timeout,
		});
		self
	}

	/// Looks `key` up, returning a fresh copy of the stored model or `None`.
	pub async fn get(&self, key: &str) -> Option<Value> {
		for tier in &self.tiers {
			let lookup = tier.store.get(key);
			let deadline = self.scheduler.sleep(tier.timeout);

			let entry = match future::select(lookup, deadline).await {
				Either::Left((Ok(entry), _)) => entry,
				Either::Left((Err(error), _)) => {
					tracing::debug!(target: "taunus::cache", tier = tier.name, %key, %error, "read failed");
					None
				}
				Either::Right(_) => {
					tracing::debug!(target: "taunus::cache", tier = tier.name, %key, "read timed out");
					None
				}
			};

			match entry {
				Some(entry) if entry.is_fresh(self.scheduler.now_ms()) => {
					tracing::trace!(target: "taunus::cache", tier = tier.name, %key, "hit");
					return Some(entry.data);
				}
				_ => continue,
			}
		}
		None
	}

	/// Stores a copy of `value` in every tier for `duration`.
	///
	/// Durations under one millisecond are ignored. Writes are fire-and-forget;
	/// a failing tier never affects the others.
	pub fn set(&self, key: &str, value: &Value, duration: Duration) {
		let ttl_ms = duration.as_millis() as u64;
		if ttl_ms < 1 {
			return;
		}

		let entry = CacheEntry::new(value.clone(), self.scheduler.now_ms(), ttl_ms);
		for tier in &self.tiers {
			let write = tier.store.set(key, entry.clone());
			let name = tier.name;
			let key = key.to_string();
			self.scheduler.spawn_local(Box::pin(async move {
				if let Err(error) = write.await {
					tracing::debug!(target: "taunus::cache", tier = name, %key, %error, "write failed");
				}
			}));
		}
	}
}

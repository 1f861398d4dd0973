//! Cache entry with absolute expiry

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored view model and the instant it stops being fresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
	/// The stored model.
	pub data: Value,
	/// Expiry in milliseconds since the Unix epoch.
	pub expires: u64,
}

impl CacheEntry {
	/// Creates an entry that stays fresh for `ttl_ms` from `now_ms`.
	pub fn new(data: Value, now_ms: u64, ttl_ms: u64) -> Self {
		Self {
			data,
			expires: now_ms.saturating_add(ttl_ms),
		}
	}

	/// Whether the entry may still be served at `now_ms`.
	pub fn is_fresh(&self, now_ms: u64) -> bool {
		now_ms < self.expires
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case(0, true)]
	#[case(999, true)]
	#[case(1000, false)]
	#[case(5000, false)]
	fn test_freshness_boundary(#[case] elapsed: u64, #[case] fresh: bool) {
		let entry = CacheEntry::new(json!({ "n": 1 }), 10_000, 1000);
		assert_eq!(entry.is_fresh(10_000 + elapsed), fresh);
	}
}

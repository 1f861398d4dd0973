//! In-memory cache tier.

use super::{CacheEntry, CacheStore, StoreError};
use futures::future::{self, LocalBoxFuture};
use std::cell::RefCell;
use std::collections::HashMap;

/// Process-lifetime key/value tier. Reads and writes complete immediately.
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: RefCell<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored entries, fresh or not.
	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	/// Whether the store holds no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.borrow().is_empty()
	}
}

impl CacheStore for MemoryStore {
	fn get(&self, key: &str) -> LocalBoxFuture<'static, Result<Option<CacheEntry>, StoreError>> {
		let entry = self.entries.borrow().get(key).cloned();
		Box::pin(future::ready(Ok(entry)))
	}

	fn set(&self, key: &str, entry: CacheEntry) -> LocalBoxFuture<'static, Result<(), StoreError>> {
		self.entries.borrow_mut().insert(key.to_string(), entry);
		Box::pin(future::ready(Ok(())))
	}
}

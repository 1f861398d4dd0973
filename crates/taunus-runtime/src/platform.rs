//! Platform abstraction.
//!
//! Everything the runtime needs from its host goes through the traits in this
//! module: timers and task spawning, the network, the History API, the DOM
//! container and the persistent key/value store. The browser implementations
//! live in [`browser`] (WASM only); the `testing` module, behind the
//! `testing` feature, provides in-memory stand-ins for native tests.

#[cfg(target_arch = "wasm32")]
pub mod browser;
#[cfg(not(target_arch = "wasm32"))]
pub mod native;

use crate::cache::CacheEntry;
use crate::cache::StoreError;
use crate::fetcher::FetchError;
use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;

/// Timers and cooperative task spawning.
pub trait Scheduler {
	/// Milliseconds since the Unix epoch.
	fn now_ms(&self) -> u64;

	/// Resolves after `duration` has elapsed.
	fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;

	/// Runs `task` to completion in the background on the current thread.
	fn spawn_local(&self, task: LocalBoxFuture<'static, ()>);
}

/// Fetches view models.
#[async_trait(?Send)]
pub trait Transport {
	/// Issues a GET for `url` and decodes the JSON body.
	///
	/// Dropping the returned future must cancel the underlying request.
	async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// How far the host's History API can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFlavor {
	/// `pushState` and `replaceState` both work.
	Standard,
	/// `replaceState` has been replaced by a non-native shim that corrupts
	/// history; only `pushState` is used.
	QuirkyReplaceState,
	/// No History API; every navigation is a full page load.
	Unsupported,
}

impl HistoryFlavor {
	/// Whether routed navigation is possible at all.
	pub fn supports_routing(self) -> bool {
		!matches!(self, Self::Unsupported)
	}

	/// Whether `replaceState` may be called.
	pub fn allows_replace(self) -> bool {
		matches!(self, Self::Standard)
	}
}

/// Browser history and location.
pub trait BrowserHistory {
	/// The History API flavor detected at startup.
	fn flavor(&self) -> HistoryFlavor;

	/// Pushes a new history entry carrying `model`.
	fn push_state(&self, model: &Value, title: Option<&str>, url: &str);

	/// Replaces the current history entry with one carrying `model`.
	fn replace_state(&self, model: &Value, title: Option<&str>, url: &str);

	/// The model stashed in the current history entry, if any.
	fn state_model(&self) -> Option<Value>;

	/// The current location as `pathname + search + hash`.
	fn location(&self) -> String;

	/// The current origin, e.g. `https://example.com`.
	fn origin(&self) -> String;

	/// Leaves the application with a full page load.
	fn assign(&self, url: &str);

	/// Sets `document.title`.
	fn set_title(&self, title: &str);

	/// Scrolls the element with the given id into view. Returns `false` if
	/// there is no such element.
	fn scroll_into(&self, id: &str) -> bool;

	/// Scrolls to the top of the document.
	fn scroll_to_top(&self);
}

/// Read access to the document outside the container.
pub trait Document {
	/// Text content of the `<script>` element with the given id.
	fn script_text(&self, id: &str) -> Option<String>;
}

/// The element views are rendered into.
pub trait Container {
	/// Replaces the container's contents.
	fn set_html(&self, html: &str);

	/// The `data-taunus` attribute naming the inline model script.
	fn bootstrap_id(&self) -> Option<String>;
}

/// What the `taunusReady` global held when it was inspected.
pub enum ReadySlot {
	/// Nothing has been assigned.
	Empty,
	/// A function is waiting to be called.
	Callback,
	/// External code already supplied the initial model.
	Model(Value),
}

/// Callback installed on the `taunusReady` global.
pub type ReadyCallback = Box<dyn Fn(Value)>;

/// The well-known global used by the manual bootstrap strategy.
pub trait ReadyGlobal {
	/// Inspects the global.
	fn inspect(&self) -> ReadySlot;

	/// Assigns `callback` to the global so that a later external call boots.
	fn install(&self, callback: ReadyCallback);
}

/// Durable key/value storage backing the persistent cache tier.
#[async_trait(?Send)]
pub trait PersistentBackend {
	/// Checks that the store can be opened and written to.
	async fn probe(&self) -> Result<(), StoreError>;

	/// Reads an entry.
	async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;

	/// Writes an entry, replacing any previous one.
	async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), StoreError>;
}

/// The set of host capabilities a mounted runtime uses.
#[derive(Clone)]
pub struct Platform {
	/// Timers and spawning.
	pub scheduler: Rc<dyn Scheduler>,
	/// Model fetches.
	pub transport: Rc<dyn Transport>,
	/// History and location.
	pub history: Rc<dyn BrowserHistory>,
	/// Document access for inline bootstrap.
	pub document: Rc<dyn Document>,
	/// Persistent cache storage.
	pub storage: Rc<dyn PersistentBackend>,
	/// The manual bootstrap global.
	pub ready: Rc<dyn ReadyGlobal>,
}

impl std::fmt::Debug for Platform {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Platform")
			.field("history", &self.history.flavor())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(HistoryFlavor::Standard, true, true)]
	#[case(HistoryFlavor::QuirkyReplaceState, true, false)]
	#[case(HistoryFlavor::Unsupported, false, false)]
	fn test_history_flavor_capabilities(
		#[case] flavor: HistoryFlavor,
		#[case] routing: bool,
		#[case] replace: bool,
	) {
		assert_eq!(flavor.supports_routing(), routing);
		assert_eq!(flavor.allows_replace(), replace);
	}
}

//! The navigation context shared by every runtime component.
//!
//! One [`NavigationState`] is created per mount and handed to the activator,
//! the link hijacker and the caching policy. All mutation happens on the
//! event-loop thread and never across an `.await`.

use crate::cache::{Cache, MemoryStore, PersistentStore};
use crate::config::MountOptions;
use crate::events::EventBus;
use crate::fetcher::Fetcher;
use crate::interceptor::InterceptorRegistry;
use crate::partial::PartialRenderer;
use crate::platform::{Container, Platform};
use crate::router::{Router, RouterError};
use crate::wiring::Wiring;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// Process-wide navigation state for one mounted container.
pub struct NavigationState {
	pub(crate) platform: Platform,
	pub(crate) container: Rc<dyn Container>,
	pub(crate) router: Router,
	pub(crate) events: Rc<EventBus>,
	pub(crate) interceptors: Rc<InterceptorRegistry>,
	pub(crate) cache: Rc<Cache>,
	pub(crate) persistent: PersistentStore,
	pub(crate) fetcher: Fetcher,
	pub(crate) renderer: PartialRenderer,
	pub(crate) freshness: Option<Duration>,
	pub(crate) prefetch: bool,
	pub(crate) model: RefCell<Value>,
	pub(crate) booted: Cell<bool>,
}

impl std::fmt::Debug for NavigationState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NavigationState")
			.field("routes", &self.router.route_count())
			.field("freshness", &self.freshness)
			.field("prefetch", &self.prefetch)
			.field("booted", &self.booted.get())
			.finish()
	}
}

impl NavigationState {
	/// Assembles the state for `container` from `wiring` and `options`.
	///
	/// Starts the persistent store's capability probe as a side effect.
	pub fn new(
		platform: Platform,
		container: Rc<dyn Container>,
		wiring: Wiring,
		options: &MountOptions,
	) -> Result<Self, RouterError> {
		let mut router = Router::new();
		router.setup(wiring.routes)?;

		let scheduler = Rc::clone(&platform.scheduler);
		let events = Rc::new(EventBus::new());
		let interceptors = Rc::new(InterceptorRegistry::new(
			Rc::clone(&scheduler),
			options.timeouts.interceptor,
		));

		let persistent = PersistentStore::new(
			Rc::clone(&platform.storage),
			Rc::clone(&scheduler),
			options.timeouts.store_probe,
		);
		let cache = Rc::new(
			Cache::new(Rc::clone(&scheduler))
				.with_tier("memory", Rc::new(MemoryStore::new()), options.timeouts.memory_read)
				.with_tier(
					"persistent",
					Rc::new(persistent.clone()),
					options.timeouts.persistent_read,
				),
		);

		let fetcher = Fetcher::new(
			Rc::clone(&platform.transport),
			Rc::clone(&interceptors),
			Rc::clone(&events),
		);
		let renderer = PartialRenderer::new(
			wiring.templates,
			wiring.controllers,
			Rc::clone(&platform.history),
			Rc::clone(&events),
		);

		Ok(Self {
			platform,
			container,
			router,
			events,
			interceptors,
			cache,
			persistent,
			fetcher,
			renderer,
			freshness: options.freshness(),
			prefetch: options.prefetch,
			model: RefCell::new(Value::Null),
			booted: Cell::new(false),
		})
	}

	/// Whether fetched models are cached.
	pub fn caching(&self) -> bool {
		self.freshness.is_some()
	}

	/// Whether hovering links prefetches; only meaningful while caching.
	pub fn prefetching(&self) -> bool {
		self.prefetch && self.caching()
	}

	/// The most recently rendered model.
	pub fn model(&self) -> Value {
		self.model.borrow().clone()
	}

	/// The route table.
	pub fn router(&self) -> &Router {
		&self.router
	}

	/// The event bus.
	pub fn events(&self) -> &Rc<EventBus> {
		&self.events
	}

	/// The interceptor registry.
	pub fn interceptors(&self) -> &Rc<InterceptorRegistry> {
		&self.interceptors
	}

	/// The model cache.
	pub fn cache(&self) -> &Rc<Cache> {
		&self.cache
	}

	/// The fetcher.
	pub fn fetcher(&self) -> &Fetcher {
		&self.fetcher
	}

	/// The mount container.
	pub fn container(&self) -> &Rc<dyn Container> {
		&self.container
	}
}

//! Typed navigation event bus.
//!
//! Every observable step of a navigation is published as a
//! [`NavigationEvent`]. Subscribers register for one [`EventKind`] (or all of
//! them) and receive events by reference, in subscription order.

use crate::fetcher::{FetchContext, FetchError};
use crate::platform::Container;
use crate::router::Route;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Discriminant used to subscribe to a single event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
	/// The first view was rendered from the bootstrap model.
	Start,
	/// A view was rendered into the container.
	Render,
	/// A model request went out over the network.
	FetchStart,
	/// A model was obtained, from the network or an interceptor.
	FetchDone,
	/// A model request was cancelled.
	FetchAbort,
	/// A model request failed.
	FetchError,
}

impl EventKind {
	/// The dotted event name.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Start => "start",
			Self::Render => "render",
			Self::FetchStart => "fetch.start",
			Self::FetchDone => "fetch.done",
			Self::FetchAbort => "fetch.abort",
			Self::FetchError => "fetch.error",
		}
	}
}

impl std::fmt::Display for EventKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// An event published by the runtime.
#[derive(Clone)]
pub enum NavigationEvent {
	/// Emitted once, when the bootstrap model is handed to the activator.
	Start {
		/// The mount container.
		container: Rc<dyn Container>,
		/// The bootstrap model.
		model: Value,
	},
	/// Emitted after each render.
	Render {
		/// The container rendered into.
		container: Rc<dyn Container>,
		/// The rendered model.
		model: Value,
	},
	/// Emitted when a network request starts.
	FetchStart {
		/// The route being fetched.
		route: Route,
		/// Why it is being fetched.
		context: FetchContext,
	},
	/// Emitted when a model arrives.
	FetchDone {
		/// The route fetched.
		route: Route,
		/// Why it was fetched.
		context: FetchContext,
		/// The model.
		data: Value,
	},
	/// Emitted when a request is cancelled.
	FetchAbort {
		/// The route whose fetch was cancelled.
		route: Route,
		/// Why it was being fetched.
		context: FetchContext,
	},
	/// Emitted when a request fails.
	FetchError {
		/// The route whose fetch failed.
		route: Route,
		/// Why it was being fetched.
		context: FetchContext,
		/// The failure.
		error: FetchError,
	},
}

impl NavigationEvent {
	/// The kind of this event.
	pub fn kind(&self) -> EventKind {
		match self {
			Self::Start { .. } => EventKind::Start,
			Self::Render { .. } => EventKind::Render,
			Self::FetchStart { .. } => EventKind::FetchStart,
			Self::FetchDone { .. } => EventKind::FetchDone,
			Self::FetchAbort { .. } => EventKind::FetchAbort,
			Self::FetchError { .. } => EventKind::FetchError,
		}
	}
}

impl std::fmt::Debug for NavigationEvent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut s = f.debug_struct("NavigationEvent");
		s.field("kind", &self.kind().as_str());
		match self {
			Self::Start { model, .. } | Self::Render { model, .. } => s.field("model", model),
			Self::FetchStart { route, context }
			| Self::FetchAbort { route, context }
			| Self::FetchDone { route, context, .. } => s.field("url", &route.url).field("context", context),
			Self::FetchError { route, context, error } => s
				.field("url", &route.url)
				.field("context", context)
				.field("error", error),
		};
		s.finish()
	}
}

/// Identifies a subscription for [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn(&NavigationEvent)>;

struct Subscriber {
	id: SubscriptionId,
	kind: Option<EventKind>,
	once: bool,
	handler: Handler,
}

/// Single-threaded publish/subscribe bus.
///
/// Handlers may subscribe or unsubscribe while an event is being delivered;
/// such changes take effect from the next emission.
#[derive(Default)]
pub struct EventBus {
	subscribers: RefCell<Vec<Subscriber>>,
	next_id: Cell<u64>,
}

impl std::fmt::Debug for EventBus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EventBus")
			.field("subscribers", &self.subscribers.borrow().len())
			.finish()
	}
}

impl EventBus {
	/// Creates a bus with no subscribers.
	pub fn new() -> Self {
		Self::default()
	}

	fn subscribe<F>(&self, kind: Option<EventKind>, once: bool, handler: F) -> SubscriptionId
	where
		F: Fn(&NavigationEvent) + 'static,
	{
		let id = SubscriptionId(self.next_id.get());
		self.next_id.set(id.0 + 1);
		self.subscribers.borrow_mut().push(Subscriber {
			id,
			kind,
			once,
			handler: Rc::new(handler),
		});
		id
	}

	/// Subscribes to every event of `kind`.
	pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
	where
		F: Fn(&NavigationEvent) + 'static,
	{
		self.subscribe(Some(kind), false, handler)
	}

	/// Subscribes to every event regardless of kind.
	pub fn on_any<F>(&self, handler: F) -> SubscriptionId
	where
		F: Fn(&NavigationEvent) + 'static,
	{
		self.subscribe(None, false, handler)
	}

	/// Subscribes to the next event of `kind` only.
	pub fn once<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
	where
		F: Fn(&NavigationEvent) + 'static,
	{
		self.subscribe(Some(kind), true, handler)
	}

	/// Removes a subscription. Returns `false` if it was already gone.
	pub fn off(&self, id: SubscriptionId) -> bool {
		let mut subscribers = self.subscribers.borrow_mut();
		let before = subscribers.len();
		subscribers.retain(|s| s.id != id);
		subscribers.len() != before
	}

	/// Removes every subscription.
	pub fn clear(&self) {
		self.subscribers.borrow_mut().clear();
	}

	/// Delivers `event` to every matching subscriber.
	pub fn emit(&self, event: &NavigationEvent) {
		let kind = event.kind();
		let handlers: Vec<Handler> = {
			let mut subscribers = self.subscribers.borrow_mut();
			let handlers = subscribers
				.iter()
				.filter(|s| s.kind.is_none_or(|k| k == kind))
				.map(|s| Rc::clone(&s.handler))
				.collect();
			subscribers.retain(|s| !(s.once && s.kind == Some(kind)));
			handlers
		};

		tracing::trace!(target: "taunus::events", event = kind.as_str(), listeners = handlers.len());
		for handler in handlers {
			handler(event);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fetcher::FetchSource;
	use crate::router::{RouteDefinition, Router};
	use rstest::rstest;
	use serde_json::json;

	fn route() -> Route {
		let mut router = Router::new();
		router.setup([("/a", RouteDefinition::action("a"))]).unwrap();
		router.resolve("/a").unwrap()
	}

	fn fetch_start() -> NavigationEvent {
		NavigationEvent::FetchStart {
			route: route(),
			context: FetchContext::new(FetchSource::Intent),
		}
	}

	fn fetch_done() -> NavigationEvent {
		NavigationEvent::FetchDone {
			route: route(),
			context: FetchContext::new(FetchSource::Intent),
			data: json!({ "n": 1 }),
		}
	}

	#[rstest]
	fn test_on_filters_by_kind() {
		let bus = EventBus::new();
		let seen = Rc::new(RefCell::new(Vec::new()));
		let sink = Rc::clone(&seen);
		bus.on(EventKind::FetchDone, move |e| sink.borrow_mut().push(e.kind()));

		bus.emit(&fetch_start());
		bus.emit(&fetch_done());

		assert_eq!(*seen.borrow(), vec![EventKind::FetchDone]);
	}

	#[rstest]
	fn test_once_fires_a_single_time() {
		let bus = EventBus::new();
		let count = Rc::new(Cell::new(0));
		let counter = Rc::clone(&count);
		bus.once(EventKind::FetchStart, move |_| counter.set(counter.get() + 1));

		bus.emit(&fetch_done());
		bus.emit(&fetch_start());
		bus.emit(&fetch_start());

		assert_eq!(count.get(), 1);
	}

	#[rstest]
	fn test_off_and_on_any() {
		let bus = EventBus::new();
		let count = Rc::new(Cell::new(0));
		let counter = Rc::clone(&count);
		let id = bus.on_any(move |_| counter.set(counter.get() + 1));

		bus.emit(&fetch_start());
		bus.emit(&fetch_done());
		assert!(bus.off(id));
		assert!(!bus.off(id));
		bus.emit(&fetch_done());

		assert_eq!(count.get(), 2);
	}

	#[rstest]
	fn test_handlers_may_subscribe_during_emit() {
		let bus = Rc::new(EventBus::new());
		let count = Rc::new(Cell::new(0));
		let inner_bus = Rc::clone(&bus);
		let counter = Rc::clone(&count);
		bus.on(EventKind::FetchStart, move |_| {
			let counter = Rc::clone(&counter);
			inner_bus.on(EventKind::FetchStart, move |_| counter.set(counter.get() + 1));
		});

		bus.emit(&fetch_start());
		assert_eq!(count.get(), 0);
		bus.emit(&fetch_start());
		assert_eq!(count.get(), 1);
	}

	#[rstest]
	fn test_event_names() {
		assert_eq!(EventKind::FetchAbort.as_str(), "fetch.abort");
		assert_eq!(fetch_done().kind().as_str(), "fetch.done");
	}
}

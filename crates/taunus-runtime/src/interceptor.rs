//! Fetch interceptors.
//!
//! Interceptors run before every model fetch and may supply the model
//! themselves by calling [`InterceptorEvent::prevent_default`], in which case
//! no network request is made. Handlers are invoked synchronously but may
//! keep the event and answer later; the fetch waits for an answer up to a
//! fixed ceiling and then proceeds without one.
//!
//! ```ignore
//! registry.add(Some("article"), |event| {
//!     if let Some(model) = offline_copy(event.url()) {
//!         event.prevent_default(model);
//!     }
//! });
//! ```

use crate::platform::Scheduler;
use crate::router::{Route, RouteParts};
use futures::channel::oneshot;
use futures::future::{self, Either};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

/// Action name that registers an interceptor for every route.
pub const ANY_ACTION: &str = "*";

/// Per-fetch interceptor event, shared between all handlers.
pub struct InterceptorEvent {
	route: Route,
	model: RefCell<Option<Value>>,
	can_prevent_default: Cell<bool>,
	default_prevented: Cell<bool>,
	wake: RefCell<Option<oneshot::Sender<()>>>,
}

impl std::fmt::Debug for InterceptorEvent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InterceptorEvent")
			.field("url", &self.route.url)
			.field("can_prevent_default", &self.can_prevent_default.get())
			.field("default_prevented", &self.default_prevented.get())
			.finish()
	}
}

impl InterceptorEvent {
	fn new(route: Route, wake: Option<oneshot::Sender<()>>) -> Self {
		Self {
			route,
			model: RefCell::new(None),
			can_prevent_default: Cell::new(wake.is_some()),
			default_prevented: Cell::new(false),
			wake: RefCell::new(wake),
		}
	}

	/// The URL being fetched.
	pub fn url(&self) -> &str {
		&self.route.url
	}

	/// The route being fetched.
	pub fn route(&self) -> &Route {
		&self.route
	}

	/// The parsed URL.
	pub fn parts(&self) -> &RouteParts {
		&self.route.parts
	}

	/// The model supplied by a handler, if any.
	pub fn model(&self) -> Option<Value> {
		self.model.borrow().clone()
	}

	/// Whether [`prevent_default`](Self::prevent_default) would still take effect.
	pub fn can_prevent_default(&self) -> bool {
		self.can_prevent_default.get()
	}

	/// Whether a handler supplied the model.
	pub fn default_prevented(&self) -> bool {
		self.default_prevented.get()
	}

	/// Supplies `model` and cancels the network fetch.
	///
	/// Only the first call made before the interceptor deadline counts;
	/// returns whether this call took effect.
	pub fn prevent_default(&self, model: Value) -> bool {
		if !self.can_prevent_default.replace(false) {
			return false;
		}
		*self.model.borrow_mut() = Some(model);
		self.default_prevented.set(true);
		if let Some(wake) = self.wake.borrow_mut().take() {
			let _ = wake.send(());
		}
		true
	}

	fn close(&self) {
		self.can_prevent_default.set(false);
		self.wake.borrow_mut().take();
	}
}

type Handler = Rc<dyn Fn(Rc<InterceptorEvent>)>;

struct Registration {
	action: Option<String>,
	handler: Handler,
}

/// Registered interceptors, global and per action.
pub struct InterceptorRegistry {
	scheduler: Rc<dyn Scheduler>,
	ceiling: Duration,
	registrations: RefCell<Vec<Registration>>,
}

impl std::fmt::Debug for InterceptorRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InterceptorRegistry")
			.field("ceiling", &self.ceiling)
			.field("registrations", &self.registrations.borrow().len())
			.finish()
	}
}

impl InterceptorRegistry {
	/// Creates an empty registry whose handlers get `ceiling` to answer.
	pub fn new(scheduler: Rc<dyn Scheduler>, ceiling: Duration) -> Self {
		Self {
			scheduler,
			ceiling,
			registrations: RefCell::new(Vec::new()),
		}
	}

	/// Registers `handler` for `action`, or for every route when `action` is
	/// `None` or [`ANY_ACTION`].
	pub fn add<F>(&self, action: Option<&str>, handler: F)
	where
		F: Fn(Rc<InterceptorEvent>) + 'static,
	{
		let action = action.filter(|a| *a != ANY_ACTION).map(str::to_string);
		self.registrations.borrow_mut().push(Registration {
			action,
			handler: Rc::new(handler),
		});
	}

	/// Removes every handler.
	pub fn clear(&self) {
		self.registrations.borrow_mut().clear();
	}

	fn handlers_for(&self, route: &Route) -> Vec<Handler> {
		let registrations = self.registrations.borrow();
		let global = registrations.iter().filter(|r| r.action.is_none());
		let specific = registrations
			.iter()
			.filter(|r| r.action.is_some() && r.action == route.action);
		global.chain(specific).map(|r| Rc::clone(&r.handler)).collect()
	}

	/// Runs the matching handlers for `route`.
	///
	/// Resolves as soon as a handler supplies a model, or when the ceiling
	/// elapses. With no matching handlers it resolves immediately.
	pub async fn execute(&self, route: &Route) -> Rc<InterceptorEvent> {
		let handlers = self.handlers_for(route);
		if handlers.is_empty() {
			return Rc::new(InterceptorEvent::new(route.clone(), None));
		}

		let (wake, woken) = oneshot::channel();
		let event = Rc::new(InterceptorEvent::new(route.clone(), Some(wake)));
		for handler in handlers {
			handler(Rc::clone(&event));
		}

		if !event.default_prevented() {
			let deadline = self.scheduler.sleep(self.ceiling);
			if let Either::Right(_) = future::select(woken, deadline).await {
				tracing::trace!(target: "taunus::interceptor", url = %route.url, "ceiling reached");
			}
		}

		event.close();
		event
	}
}

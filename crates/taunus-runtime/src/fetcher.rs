//! View model fetching.
//!
//! A fetch first gives interceptors a chance to supply the model, then falls
//! back to a `?json` request over the [`Transport`]. At most one fetch per
//! [`FetchSource`] is in flight: starting a new one cancels the previous one
//! for the same source, while fetches from different sources run side by side.

use crate::events::{EventBus, NavigationEvent};
use crate::interceptor::InterceptorRegistry;
use crate::links::AnchorKey;
use crate::platform::Transport;
use crate::router::Route;
use futures::future::{AbortHandle, Abortable};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Why a fetch is happening. Doubles as the cancellation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchSource {
	/// A navigation the user or code asked for.
	Intent,
	/// A speculative fetch triggered by hovering a link.
	Prefetch,
	/// The initial model at mount time.
	Boot,
}

/// Identifies the origin of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchContext {
	/// Cancellation key.
	pub source: FetchSource,
	/// The anchor that triggered the fetch, if any.
	pub element: Option<AnchorKey>,
}

impl FetchContext {
	/// A context without an originating element.
	pub fn new(source: FetchSource) -> Self {
		Self {
			source,
			element: None,
		}
	}

	/// A context originating from `anchor`.
	pub fn for_anchor(source: FetchSource, anchor: AnchorKey) -> Self {
		Self {
			source,
			element: Some(anchor),
		}
	}
}

/// Failure of a model fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
	/// The request was cancelled before it completed.
	#[error("Request aborted")]
	Aborted,
	/// The server answered with a non-success status.
	#[error("HTTP {status} while fetching view model")]
	Http {
		/// Response status code.
		status: u16,
	},
	/// The request never got a response.
	#[error("Network error: {0}")]
	Network(String),
	/// The response body was not valid JSON.
	#[error("Invalid view model JSON: {0}")]
	Decode(String),
}

impl FetchError {
	/// Whether this error is a cancellation rather than a failure.
	pub fn is_abort(&self) -> bool {
		matches!(self, Self::Aborted)
	}
}

struct Pending {
	ticket: u64,
	abort: AbortHandle,
}

/// Issues model fetches and tracks the in-flight one per source.
pub struct Fetcher {
	transport: Rc<dyn Transport>,
	interceptors: Rc<InterceptorRegistry>,
	events: Rc<EventBus>,
	pending: RefCell<HashMap<FetchSource, Pending>>,
	next_ticket: Cell<u64>,
}

impl std::fmt::Debug for Fetcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Fetcher")
			.field("pending", &self.pending.borrow().keys().collect::<Vec<_>>())
			.finish()
	}
}

impl Fetcher {
	/// Creates a fetcher.
	pub fn new(
		transport: Rc<dyn Transport>,
		interceptors: Rc<InterceptorRegistry>,
		events: Rc<EventBus>,
	) -> Self {
		Self {
			transport,
			interceptors,
			events,
			pending: RefCell::new(HashMap::new()),
			next_ticket: Cell::new(0),
		}
	}

	/// Fetches the model for `route`, cancelling any earlier fetch from the
	/// same source.
	pub async fn fetch(&self, route: &Route, context: FetchContext) -> Result<Value, FetchError> {
		let (abort, registration) = AbortHandle::new_pair();
		let ticket = self.next_ticket.get();
		self.next_ticket.set(ticket + 1);

		let previous = self
			.pending
			.borrow_mut()
			.insert(context.source, Pending { ticket, abort });
		if let Some(previous) = previous {
			tracing::debug!(target: "taunus::fetcher", source = ?context.source, "superseding in-flight fetch");
			previous.abort.abort();
		}

		let outcome = Abortable::new(self.run(route, context), registration).await;

		{
			let mut pending = self.pending.borrow_mut();
			if pending.get(&context.source).is_some_and(|p| p.ticket == ticket) {
				pending.remove(&context.source);
			}
		}

		match outcome {
			Ok(result) => result,
			Err(_aborted) => {
				self.emit_abort(route, context);
				Err(FetchError::Aborted)
			}
		}
	}

	async fn run(&self, route: &Route, context: FetchContext) -> Result<Value, FetchError> {
		let event = self.interceptors.execute(route).await;
		if event.default_prevented()
			&& let Some(data) = event.model()
		{
			tracing::debug!(target: "taunus::fetcher", url = %route.url, "model supplied by interceptor");
			self.events.emit(&NavigationEvent::FetchDone {
				route: route.clone(),
				context,
				data: data.clone(),
			});
			return Ok(data);
		}

		self.events.emit(&NavigationEvent::FetchStart {
			route: route.clone(),
			context,
		});

		let url = route.json_url();
		tracing::debug!(target: "taunus::fetcher", %url, source = ?context.source, "fetching view model");
		match self.transport.get_json(&url).await {
			Ok(data) => {
				self.events.emit(&NavigationEvent::FetchDone {
					route: route.clone(),
					context,
					data: data.clone(),
				});
				Ok(data)
			}
			Err(FetchError::Aborted) => {
				self.emit_abort(route, context);
				Err(FetchError::Aborted)
			}
			Err(error) => {
				tracing::warn!(target: "taunus::fetcher", %url, %error, "view model fetch failed");
				self.events.emit(&NavigationEvent::FetchError {
					route: route.clone(),
					context,
					error: error.clone(),
				});
				Err(error)
			}
		}
	}

	fn emit_abort(&self, route: &Route, context: FetchContext) {
		tracing::debug!(target: "taunus::fetcher", url = %route.url, source = ?context.source, "fetch aborted");
		self.events.emit(&NavigationEvent::FetchAbort {
			route: route.clone(),
			context,
		});
	}

	/// Cancels the in-flight fetch for `source`, if any.
	pub fn abort(&self, source: FetchSource) -> bool {
		match self.pending.borrow_mut().remove(&source) {
			Some(pending) => {
				pending.abort.abort();
				true
			}
			None => false,
		}
	}

	/// Cancels every in-flight fetch.
	pub fn abort_pending(&self) {
		let drained: Vec<Pending> = self.pending.borrow_mut().drain().map(|(_, p)| p).collect();
		for pending in drained {
			pending.abort.abort();
		}
	}

	/// Whether a fetch for `source` is in flight.
	pub fn is_pending(&self, source: FetchSource) -> bool {
		self.pending.borrow().contains_key(&source)
	}
}

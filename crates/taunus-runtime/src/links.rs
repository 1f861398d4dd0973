//! Link hijacking and hover prefetching.
//!
//! The DOM listeners installed by the browser platform translate anchor
//! events into [`LinkClick`] and [`LinkHover`] values and hand them to
//! [`Links`]. An anchor is *prefetching* while a speculative fetch for it is
//! in flight; a click on such an anchor is put *on hold* and replayed once
//! the prefetch settles, so the navigation is served from the cache instead
//! of a second request.

use crate::activator::{Activator, GoOptions};
use crate::fetcher::{FetchContext, FetchSource};
use crate::router::{Route, RouteParts};
use crate::state::NavigationState;
use futures::FutureExt;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Stable identity of an anchor element for the lifetime of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorKey(pub u64);

/// A click on an anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkClick {
	/// The anchor clicked.
	pub anchor: AnchorKey,
	/// The anchor's resolved `href`.
	pub href: String,
	/// Origin of the anchor's `href`.
	pub origin: String,
	/// `MouseEvent.button`; `0` is the primary button.
	pub button: i16,
	/// Whether any of ctrl, meta, shift or alt was held.
	pub modifier: bool,
}

impl LinkClick {
	/// A plain left click without modifiers.
	pub fn primary(anchor: AnchorKey, href: impl Into<String>, origin: impl Into<String>) -> Self {
		Self {
			anchor,
			href: href.into(),
			origin: origin.into(),
			button: 0,
			modifier: false,
		}
	}

	fn is_plain(&self) -> bool {
		self.button == 0 && !self.modifier
	}
}

/// A `mouseover` or `touchstart` on an anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkHover {
	/// The anchor hovered.
	pub anchor: AnchorKey,
	/// The anchor's resolved `href`.
	pub href: String,
	/// Origin of the anchor's `href`.
	pub origin: String,
}

/// What the runtime did with a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
	/// Not ours; the browser follows the link.
	Ignored,
	/// Same page, different fragment; the browser scrolls in place.
	InPage,
	/// The anchor is prefetching; navigation resumes when it settles.
	Queued,
	/// A routed navigation was started.
	Navigating,
}

impl ClickOutcome {
	/// Whether the click event's default action must be prevented.
	pub fn prevents_default(self) -> bool {
		matches!(self, Self::Queued | Self::Navigating)
	}
}

/// How a link relates to the current location.
enum SamePage {
	/// Same path, query and fragment.
	Exact,
	/// Same path and query, another fragment.
	Fragment,
}

/// Anchor event handling for one mounted runtime.
#[derive(Debug)]
pub struct Links {
	state: Rc<NavigationState>,
	activator: Activator,
	prefetching: RefCell<HashSet<AnchorKey>>,
	on_hold: RefCell<HashSet<AnchorKey>>,
}

impl Links {
	/// Creates the link handler.
	pub fn new(state: Rc<NavigationState>, activator: Activator) -> Rc<Self> {
		Rc::new(Self {
			state,
			activator,
			prefetching: RefCell::new(HashSet::new()),
			on_hold: RefCell::new(HashSet::new()),
		})
	}

	/// Resolves `href` to a route the runtime handles, if it is one.
	fn routable(&self, href: &str, origin: &str) -> Option<Route> {
		if origin != self.state.platform.history.origin() {
			return None;
		}
		self.state.router.resolve(href).filter(|route| !route.ignore)
	}

	fn same_page(&self, route: &Route) -> Option<SamePage> {
		let current = RouteParts::parse(&self.state.platform.history.location())?;
		if route.parts.pathname != current.pathname || route.parts.search != current.search {
			return None;
		}
		if route.parts.hash == current.hash {
			Some(SamePage::Exact)
		} else if !route.parts.hash.is_empty() {
			Some(SamePage::Fragment)
		} else {
			None
		}
	}

	/// Handles a click on an anchor.
	///
	/// Before the first model has booted every click is left to the browser.
	pub fn on_click(self: &Rc<Self>, click: &LinkClick) -> ClickOutcome {
		if !self.state.booted.get() || !click.is_plain() {
			return ClickOutcome::Ignored;
		}
		let Some(route) = self.routable(&click.href, &click.origin) else {
			return ClickOutcome::Ignored;
		};
		match self.same_page(&route) {
			Some(SamePage::Exact) => return ClickOutcome::Ignored,
			Some(SamePage::Fragment) => return ClickOutcome::InPage,
			None => {}
		}

		if self.prefetching.borrow().contains(&click.anchor) {
			tracing::debug!(target: "taunus::links", href = %click.href, "click held until prefetch settles");
			self.on_hold.borrow_mut().insert(click.anchor);
			return ClickOutcome::Queued;
		}

		self.navigate(click.href.clone(), click.anchor);
		ClickOutcome::Navigating
	}

	/// Handles a hover or touch on an anchor. Returns whether a prefetch started.
	pub fn on_hover(self: &Rc<Self>, hover: &LinkHover) -> bool {
		if !self.state.booted.get() || !self.state.prefetching() {
			return false;
		}
		let Some(route) = self.routable(&hover.href, &hover.origin) else {
			return false;
		};
		if !self.prefetching.borrow_mut().insert(hover.anchor) {
			return false;
		}

		tracing::trace!(target: "taunus::links", href = %hover.href, "prefetching");
		let links = Rc::clone(self);
		let anchor = hover.anchor;
		let href = hover.href.clone();
		self.state.platform.scheduler.spawn_local(
			async move {
				let context = FetchContext::for_anchor(FetchSource::Prefetch, anchor);
				if let Err(error) = links.state.fetcher.fetch(&route, context).await {
					tracing::trace!(target: "taunus::links", %href, %error, "prefetch settled without a model");
				}
				links.prefetching.borrow_mut().remove(&anchor);
				if links.on_hold.borrow_mut().remove(&anchor) {
					links.navigate(href, anchor);
				}
			}
			.boxed_local(),
		);
		true
	}

	fn navigate(&self, href: String, anchor: AnchorKey) {
		let activator = self.activator.clone();
		self.state.platform.scheduler.spawn_local(
			async move {
				let options = GoOptions {
					context: Some(anchor),
					..GoOptions::default()
				};
				if let Err(error) = activator.go(&href, options).await {
					tracing::error!(target: "taunus::links", %href, %error, "navigation failed to render");
				}
			}
			.boxed_local(),
		);
	}

	/// Whether a prefetch for `anchor` is in flight.
	pub fn is_prefetching(&self, anchor: AnchorKey) -> bool {
		self.prefetching.borrow().contains(&anchor)
	}

	/// Whether a click on `anchor` is waiting for its prefetch.
	pub fn is_on_hold(&self, anchor: AnchorKey) -> bool {
		self.on_hold.borrow().contains(&anchor)
	}
}

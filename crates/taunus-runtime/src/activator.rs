//! Navigation orchestration.
//!
//! The activator ties a navigation together: it fetches the target's model,
//! records it in browser history, and renders the partial view. It also owns
//! the first paint ([`Activator::start`]) and back/forward handling
//! ([`Activator::on_popstate`]).

use crate::events::NavigationEvent;
use crate::fetcher::{FetchContext, FetchError, FetchSource};
use crate::links::AnchorKey;
use crate::partial::{PartialOptions, RenderError};
use crate::router::Route;
use crate::state::NavigationState;
use serde_json::Value;
use std::rc::Rc;

/// Redirect chains longer than this end in a full page load.
const MAX_REDIRECTS: usize = 8;

/// Options for [`Activator::go`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoOptions {
	/// The anchor that triggered the navigation.
	pub context: Option<AnchorKey>,
	/// Replace the current history entry instead of pushing a new one.
	pub replace_state: bool,
}

/// What a call to [`Activator::go`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
	/// The view was rendered in place.
	Rendered {
		/// The URL that was rendered, after redirects.
		url: String,
	},
	/// The browser was sent to the URL with a full page load.
	FullLoad {
		/// The URL loaded.
		url: String,
	},
	/// A newer navigation superseded this one.
	Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
	Push,
	Replace,
}

/// A redirect instruction embedded in a view model.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Redirect {
	href: String,
	hard: bool,
}

impl Redirect {
	fn from_model(model: &Value) -> Option<Self> {
		let redirect = model.get("redirect")?;
		let href = redirect.get("href")?.as_str()?.to_string();
		let hard = redirect.get("hard").and_then(Value::as_bool).unwrap_or(false);
		Some(Self { href, hard })
	}
}

/// Drives navigations for one mounted runtime.
#[derive(Debug, Clone)]
pub struct Activator {
	state: Rc<NavigationState>,
}

impl Activator {
	/// Creates an activator over `state`.
	pub fn new(state: Rc<NavigationState>) -> Self {
		Self { state }
	}

	/// Renders the first view from the bootstrap model.
	///
	/// The server already produced the markup, so the container is left
	/// untouched; the `render` event fires and the view's controller runs.
	pub fn start(&self, model: Value) -> Result<(), RenderError> {
		let history = &self.state.platform.history;
		let url = history.location();
		let route = self.state.router.resolve(&url);

		self.record(&url, &model, Direction::Replace);
		self.state.events.emit(&NavigationEvent::Start {
			container: Rc::clone(&self.state.container),
			model: model.clone(),
		});
		self.state.renderer.render(
			&self.state.container,
			None,
			&model,
			route.as_ref(),
			PartialOptions {
				render: false,
				scroll: false,
			},
		)
	}

	/// Navigates to `url`.
	///
	/// Falls back to a full page load when the History API is unusable, the
	/// URL matches no route (or an ignored one), or the model fetch fails.
	///
	/// # Errors
	///
	/// Only rendering failures are returned; everything else degrades.
	pub async fn go(&self, url: &str, options: GoOptions) -> Result<Navigation, RenderError> {
		let history = &self.state.platform.history;
		if !history.flavor().supports_routing() {
			return Ok(self.full_load(url));
		}

		let mut url = url.to_string();
		for _ in 0..MAX_REDIRECTS {
			let Some(route) = self.state.router.resolve(&url).filter(|r| !r.ignore) else {
				return Ok(self.full_load(&url));
			};

			self.state.fetcher.abort_pending();
			let context = FetchContext {
				source: FetchSource::Intent,
				element: options.context,
			};
			let model = match self.state.fetcher.fetch(&route, context).await {
				Ok(model) => model,
				Err(FetchError::Aborted) => return Ok(Navigation::Aborted),
				Err(error) => {
					tracing::warn!(target: "taunus::activator", %url, %error, "falling back to a full page load");
					return Ok(self.full_load(&url));
				}
			};

			match Redirect::from_model(&model) {
				Some(redirect) if redirect.hard => return Ok(self.full_load(&redirect.href)),
				Some(redirect) => {
					tracing::debug!(target: "taunus::activator", from = %url, to = %redirect.href, "redirect");
					url = redirect.href;
					continue;
				}
				None => {}
			}

			let direction = if options.replace_state {
				Direction::Replace
			} else {
				Direction::Push
			};
			self.render_route(&route, model, direction)?;
			return Ok(Navigation::Rendered { url });
		}

		tracing::warn!(target: "taunus::activator", %url, "too many redirects");
		Ok(self.full_load(&url))
	}

	/// Handles a `popstate` carrying `state_model`.
	///
	/// Entries created before this session carry no model and are ignored.
	pub fn on_popstate(&self, state_model: Option<Value>) -> Result<(), RenderError> {
		let Some(model) = state_model else {
			return Ok(());
		};
		let url = self.state.platform.history.location();
		let route = self.state.router.resolve(&url);

		self.apply_model(&model);
		self.state.renderer.render(
			&self.state.container,
			None,
			&model,
			route.as_ref(),
			PartialOptions::default(),
		)
	}

	fn render_route(&self, route: &Route, model: Value, direction: Direction) -> Result<(), RenderError> {
		self.record(&route.url, &model, direction);
		self.state.renderer.render(
			&self.state.container,
			None,
			&model,
			Some(route),
			PartialOptions::default(),
		)
	}

	/// Stores the model as current, updates the title, and writes history.
	fn record(&self, url: &str, model: &Value, direction: Direction) {
		self.apply_model(model);

		let history = &self.state.platform.history;
		let flavor = history.flavor();
		let title = model.get("title").and_then(Value::as_str);
		match direction {
			Direction::Push if flavor.supports_routing() => history.push_state(model, title, url),
			Direction::Replace if flavor.allows_replace() => history.replace_state(model, title, url),
			_ => tracing::debug!(target: "taunus::activator", ?direction, ?flavor, "history left untouched"),
		}
	}

	fn apply_model(&self, model: &Value) {
		*self.state.model.borrow_mut() = model.clone();
		if let Some(title) = model.get("title").and_then(Value::as_str) {
			self.state.platform.history.set_title(title);
		}
	}

	fn full_load(&self, url: &str) -> Navigation {
		tracing::debug!(target: "taunus::activator", %url, "full page load");
		self.state.platform.history.assign(url);
		Navigation::FullLoad {
			url: url.to_string(),
		}
	}
}

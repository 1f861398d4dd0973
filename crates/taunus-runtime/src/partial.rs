//! Partial view rendering.

use crate::events::{EventBus, NavigationEvent};
use crate::platform::{BrowserHistory, Container};
use crate::router::Route;
use crate::wiring::{BoxError, Controller, Template};
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Failure to render a view.
#[derive(Debug, Error)]
pub enum RenderError {
	/// Neither the caller, the model nor the route named an action.
	#[error("Unable to resolve an action for the view model")]
	NoAction,
	/// No template is registered for the action.
	#[error("No template registered for action '{action}'")]
	MissingTemplate {
		/// The resolved action.
		action: String,
	},
	/// The template itself failed.
	#[error("Error rendering \"{action}\" view template")]
	Template {
		/// The resolved action.
		action: String,
		/// The template's error.
		#[source]
		source: BoxError,
	},
}

/// Per-call switches for [`PartialRenderer::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialOptions {
	/// Replace the container's contents. `false` only fires events and runs the controller.
	pub render: bool,
	/// Restore scroll position after rendering.
	pub scroll: bool,
}

impl Default for PartialOptions {
	fn default() -> Self {
		Self {
			render: true,
			scroll: true,
		}
	}
}

/// Renders views into a container and runs their controllers.
pub struct PartialRenderer {
	templates: HashMap<String, Template>,
	controllers: HashMap<String, Controller>,
	history: Rc<dyn BrowserHistory>,
	events: Rc<EventBus>,
}

impl std::fmt::Debug for PartialRenderer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PartialRenderer")
			.field("templates", &self.templates.len())
			.field("controllers", &self.controllers.len())
			.finish()
	}
}

impl PartialRenderer {
	/// Creates a renderer over the given templates and controllers.
	pub fn new(
		templates: HashMap<String, Template>,
		controllers: HashMap<String, Controller>,
		history: Rc<dyn BrowserHistory>,
		events: Rc<EventBus>,
	) -> Self {
		Self {
			templates,
			controllers,
			history,
			events,
		}
	}

	/// Picks the action: explicit override, then `model.action`, then the route's.
	pub fn resolve_action(
		action: Option<&str>,
		model: &Value,
		route: Option<&Route>,
	) -> Option<String> {
		action
			.map(str::to_string)
			.or_else(|| model.get("action").and_then(Value::as_str).map(str::to_string))
			.or_else(|| route.and_then(|r| r.action.clone()))
	}

	/// Renders `model` into `container`.
	///
	/// # Errors
	///
	/// Returns a [`RenderError`] naming the action when no template exists
	/// or the template fails. Nothing is emitted in that case.
	pub fn render(
		&self,
		container: &Rc<dyn Container>,
		action: Option<&str>,
		model: &Value,
		route: Option<&Route>,
		options: PartialOptions,
	) -> Result<(), RenderError> {
		let action = Self::resolve_action(action, model, route).ok_or(RenderError::NoAction)?;

		if options.render {
			let template = self
				.templates
				.get(&action)
				.ok_or_else(|| RenderError::MissingTemplate {
					action: action.clone(),
				})?;
			let html = template(model).map_err(|source| RenderError::Template {
				action: action.clone(),
				source,
			})?;
			container.set_html(&html);
			tracing::debug!(target: "taunus::partial", %action, "view rendered");
		}

		if options.scroll {
			self.restore_scroll(route);
		}

		self.events.emit(&NavigationEvent::Render {
			container: Rc::clone(container),
			model: model.clone(),
		});

		if let Some(controller) = self.controllers.get(&action) {
			controller(model, container, route);
		}
		Ok(())
	}

	fn restore_scroll(&self, route: Option<&Route>) {
		let scrolled = route
			.and_then(|r| r.parts.fragment())
			.is_some_and(|id| self.history.scroll_into(id));
		if !scrolled {
			self.history.scroll_to_top();
		}
	}
}

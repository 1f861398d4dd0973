//! The wiring bundle: templates, controllers and the route table.
//!
//! Wiring is produced by the application's build step and handed to `mount`
//! as-is. Templates turn a view model into HTML; controllers run after a view
//! has been rendered.
//!
//! ```
//! use taunus_runtime::router::RouteDefinition;
//! use taunus_runtime::wiring::Wiring;
//!
//! let wiring = Wiring::new()
//!     .route("/", RouteDefinition::action("home"))
//!     .template("home", |model| Ok(format!("<h1>{}</h1>", model["title"].as_str().unwrap_or(""))))
//!     .controller("home", |_model, _container, _route| {});
//!
//! assert!(wiring.has_template("home"));
//! ```

use crate::platform::Container;
use crate::router::{Route, RouteDefinition};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Error type returned by templates.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Renders a view model into HTML.
pub type Template = Rc<dyn Fn(&Value) -> Result<String, BoxError>>;

/// Runs after a view has been rendered into its container.
pub type Controller = Rc<dyn Fn(&Value, &Rc<dyn Container>, Option<&Route>)>;

#[derive(Deserialize)]
struct RouteEntry {
	route: String,
	#[serde(flatten)]
	definition: RouteDefinition,
}

/// Templates, controllers and routes for one application.
#[derive(Clone, Default)]
pub struct Wiring {
	pub(crate) templates: HashMap<String, Template>,
	pub(crate) controllers: HashMap<String, Controller>,
	pub(crate) routes: Vec<(String, RouteDefinition)>,
}

impl std::fmt::Debug for Wiring {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Wiring")
			.field("templates", &self.templates.keys().collect::<Vec<_>>())
			.field("controllers", &self.controllers.keys().collect::<Vec<_>>())
			.field("routes", &self.routes.iter().map(|(p, _)| p).collect::<Vec<_>>())
			.finish()
	}
}

impl Wiring {
	/// Creates empty wiring.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a route. Order matters: the first matching pattern wins.
	pub fn route(mut self, pattern: impl Into<String>, definition: RouteDefinition) -> Self {
		self.routes.push((pattern.into(), definition));
		self
	}

	/// Appends routes from a JSON array of `{ "route": pattern, ...definition }`.
	pub fn routes_from_json(mut self, json: &str) -> Result<Self, serde_json::Error> {
		let entries: Vec<RouteEntry> = serde_json::from_str(json)?;
		self.routes
			.extend(entries.into_iter().map(|e| (e.route, e.definition)));
		Ok(self)
	}

	/// Registers the template for `action`.
	pub fn template<F>(mut self, action: impl Into<String>, render: F) -> Self
	where
		F: Fn(&Value) -> Result<String, BoxError> + 'static,
	{
		self.templates.insert(action.into(), Rc::new(render));
		self
	}

	/// Registers the controller for `action`.
	pub fn controller<F>(mut self, action: impl Into<String>, controller: F) -> Self
	where
		F: Fn(&Value, &Rc<dyn Container>, Option<&Route>) + 'static,
	{
		self.controllers.insert(action.into(), Rc::new(controller));
		self
	}

	/// Whether a template is registered for `action`.
	pub fn has_template(&self, action: &str) -> bool {
		self.templates.contains_key(action)
	}

	/// Whether a controller is registered for `action`.
	pub fn has_controller(&self, action: &str) -> bool {
		self.controllers.contains_key(action)
	}

	/// The route table in registration order.
	pub fn routes(&self) -> &[(String, RouteDefinition)] {
		&self.routes
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::CacheSetting;
	use rstest::rstest;

	#[rstest]
	fn test_routes_from_json_preserves_order() {
		let wiring = Wiring::new()
			.route("/", RouteDefinition::action("home"))
			.routes_from_json(
				r#"[
					{ "route": "/a/:id", "action": "article", "cache": 30 },
					{ "route": "/admin/*", "ignore": true }
				]"#,
			)
			.unwrap();

		let patterns: Vec<&str> = wiring.routes().iter().map(|(p, _)| p.as_str()).collect();
		assert_eq!(patterns, vec!["/", "/a/:id", "/admin/*"]);
		assert_eq!(wiring.routes()[1].1.cache, Some(CacheSetting::Seconds(30)));
		assert!(wiring.routes()[2].1.ignore);
	}

	#[rstest]
	fn test_templates_and_controllers_are_keyed_by_action() {
		let wiring = Wiring::new()
			.template("home", |_| Ok(String::new()))
			.controller("article", |_, _, _| {});

		assert!(wiring.has_template("home"));
		assert!(!wiring.has_template("article"));
		assert!(wiring.has_controller("article"));
	}

	#[rstest]
	fn test_malformed_route_json_is_rejected() {
		assert!(Wiring::new().routes_from_json(r#"[{ "action": "x" }]"#).is_err());
	}
}

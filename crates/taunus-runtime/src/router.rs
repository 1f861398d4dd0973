//! Route table and URL matching.
//!
//! The router turns a raw URL into a [`Route`]: the parsed URL parts plus the
//! first registered definition whose pattern matches the pathname.
//!
//! ```
//! use taunus_runtime::router::{RouteDefinition, Router};
//!
//! let mut router = Router::new();
//! router
//!     .setup([
//!         ("/", RouteDefinition::action("home")),
//!         ("/a/:id", RouteDefinition::action("article")),
//!     ])
//!     .unwrap();
//!
//! let route = router.resolve("/a/42?x=1").unwrap();
//! assert_eq!(route.action.as_deref(), Some("article"));
//! assert_eq!(route.params["id"], "42");
//! assert_eq!(route.parts.search, "?x=1");
//! ```

mod error;
mod pattern;

pub use error::RouterError;
pub use pattern::{Captures, RoutePattern};

use crate::config::CacheSetting;
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

/// Base used to resolve relative URLs; only the path, query and fragment survive.
const PARSE_BASE: &str = "http://taunus.localhost/";

/// A route table entry as it appears in the wiring bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouteDefinition {
	/// Which template/controller pair renders the route.
	pub action: Option<String>,
	/// Ignored routes are never hijacked; the browser loads them normally.
	pub ignore: bool,
	/// Per-route cache override.
	pub cache: Option<CacheSetting>,
}

impl RouteDefinition {
	/// Creates a definition rendered by `action`.
	pub fn action(action: impl Into<String>) -> Self {
		Self {
			action: Some(action.into()),
			..Self::default()
		}
	}

	/// Creates a definition the runtime never handles.
	pub fn ignored() -> Self {
		Self {
			ignore: true,
			..Self::default()
		}
	}

	/// Sets the per-route cache override.
	pub fn with_cache(mut self, cache: CacheSetting) -> Self {
		self.cache = Some(cache);
		self
	}
}

/// The parsed components of a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParts {
	/// Percent-encoded path, always starting with `/`.
	pub pathname: String,
	/// Raw query string including the leading `?`, or empty.
	pub search: String,
	/// Fragment including the leading `#`, or empty.
	pub hash: String,
	/// Decoded query pairs; later duplicates win.
	pub query: HashMap<String, String>,
}

impl RouteParts {
	/// Parses an absolute or root-relative URL.
	pub fn parse(raw: &str) -> Option<Self> {
		let url = match Url::parse(raw) {
			Ok(url) => url,
			Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(PARSE_BASE).ok()?.join(raw).ok()?,
			Err(_) => return None,
		};

		Some(Self {
			pathname: url.path().to_string(),
			search: url.query().map(|q| format!("?{q}")).unwrap_or_default(),
			hash: url.fragment().map(|f| format!("#{f}")).unwrap_or_default(),
			query: url.query_pairs().into_owned().collect(),
		})
	}

	/// The key models are cached under: pathname plus query string.
	pub fn cache_key(&self) -> String {
		format!("{}{}", self.pathname, self.search)
	}

	/// The fragment without its leading `#`, if any.
	pub fn fragment(&self) -> Option<&str> {
		self.hash.strip_prefix('#').filter(|id| !id.is_empty())
	}
}

/// The result of matching a URL against the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
	/// The pattern that matched.
	pub route: String,
	/// The action rendering this route, if the definition names one.
	pub action: Option<String>,
	/// Named parameters captured from the pathname.
	pub params: HashMap<String, String>,
	/// Splat captures in pattern order.
	pub splats: Vec<String>,
	/// Whether the runtime should leave this route to the browser.
	pub ignore: bool,
	/// Per-route cache override.
	pub cache: Option<CacheSetting>,
	/// The raw URL as given.
	pub url: String,
	/// Parsed URL components.
	pub parts: RouteParts,
}

impl Route {
	/// The key the route's model is cached under.
	pub fn cache_key(&self) -> String {
		self.parts.cache_key()
	}

	/// The URL used to request this route's model as JSON.
	pub fn json_url(&self) -> String {
		json_url(&self.url)
	}
}

/// Converts a route URL into the equivalent `?json` model request, dropping any fragment.
pub fn json_url(url: &str) -> String {
	let without_hash = url.split('#').next().unwrap_or(url);
	if without_hash.contains('?') {
		format!("{without_hash}&json")
	} else {
		format!("{without_hash}?json")
	}
}

#[derive(Debug, Clone)]
struct Entry {
	pattern: RoutePattern,
	definition: RouteDefinition,
}

/// Ordered route table. First match wins, so catch-all patterns go last.
#[derive(Debug, Clone, Default)]
pub struct Router {
	entries: Vec<Entry>,
}

impl Router {
	/// Creates an empty router. Every URL resolves to `None` until [`setup`](Self::setup).
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers the route table, replacing any previous one.
	///
	/// # Errors
	///
	/// Fails on the first pattern that does not compile; the previous table is kept.
	pub fn setup<I, P>(&mut self, definitions: I) -> Result<(), RouterError>
	where
		I: IntoIterator<Item = (P, RouteDefinition)>,
		P: AsRef<str>,
	{
		let entries = definitions
			.into_iter()
			.map(|(pattern, definition)| {
				Ok(Entry {
					pattern: RoutePattern::new(pattern.as_ref())?,
					definition,
				})
			})
			.collect::<Result<Vec<_>, RouterError>>()?;

		tracing::debug!(target: "taunus::router", routes = entries.len(), "route table registered");
		self.entries = entries;
		Ok(())
	}

	/// Matches a raw URL against the table.
	pub fn resolve(&self, raw: &str) -> Option<Route> {
		let parts = RouteParts::parse(raw)?;

		self.entries.iter().find_map(|entry| {
			let captures = entry.pattern.matches(&parts.pathname)?;
			Some(Route {
				route: entry.pattern.pattern().to_string(),
				action: entry.definition.action.clone(),
				params: captures.params,
				splats: captures.splats,
				ignore: entry.definition.ignore,
				cache: entry.definition.cache,
				url: raw.to_string(),
				parts: parts.clone(),
			})
		})
	}

	/// Returns the number of registered routes.
	pub fn route_count(&self) -> usize {
		self.entries.len()
	}
}

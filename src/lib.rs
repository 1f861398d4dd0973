//! # Taunus
//!
//! Client-side navigation for web applications whose first page is rendered
//! on the server.
//!
//! Once mounted on a container element, Taunus hijacks same-origin link
//! clicks, fetches the target's view model as JSON, renders it with the
//! application's templates and keeps browser history in step. View models can
//! be cached and prefetched while the user hovers a link.
//!
//! ## Feature Flags
//!
//! - `console_error_panic_hook` - readable panics in the browser console
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use taunus::prelude::*;
//!
//! let wiring = Wiring::new()
//!     .route("/", RouteDefinition::action("home"))
//!     .route("/articles/:slug", RouteDefinition::action("article"))
//!     .template("home", render_home)
//!     .template("article", render_article);
//!
//! let taunus = Taunus::new(Platform::browser()?);
//! let runtime = taunus
//!     .mount(container, wiring, MountOptions::new().cache(CacheSetting::Toggle(true)).prefetch(true))
//!     .await?;
//! runtime.on(EventKind::Render, |event| tracing::debug!(kind = %event.kind(), "rendered"));
//! ```

pub mod navigation;

pub use taunus_runtime::{
	Bootstrap, CacheSetting, EventKind, FetchError, GoOptions, MountError, MountOptions, Navigation,
	NavigationEvent, Platform, RenderError, Route, RouteDefinition, Runtime, Taunus, Timeouts,
	Wiring,
};

/// Commonly used items.
pub mod prelude {
	pub use taunus_runtime::prelude::*;
}

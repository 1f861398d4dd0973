//! # taunus-runtime
//!
//! Client-side navigation runtime for shared-rendering web applications.
//!
//! After the server renders the first page, the runtime takes over link
//! navigation: it matches URLs against the application's route table,
//! fetches view models as JSON, renders them with the application's
//! templates and keeps browser history in step. Models can be cached in
//! memory and IndexedDB and prefetched when a link is hovered.
//!
//! ## Architecture
//!
//! - [`router`]: URL parsing and route matching
//! - [`fetcher`]: model fetches with per-source cancellation
//! - [`interceptor`]: hooks that may answer a fetch without the network
//! - [`cache`]: two-tier model cache with freshness
//! - [`links`]: anchor click hijacking and hover prefetch
//! - [`activator`]: navigation, history and back/forward
//! - [`partial`]: view rendering and controllers
//! - [`mount`]: bootstrap and lifecycle
//! - [`platform`]: the host capabilities everything above runs on
//!
//! ## Example
//!
//! ```ignore
//! use taunus_runtime::prelude::*;
//!
//! let taunus = Taunus::new(Platform::browser()?);
//! let wiring = Wiring::new()
//!     .route("/", RouteDefinition::action("home"))
//!     .template("home", |model| Ok(format!("<h1>{}</h1>", model["title"])));
//! let container = ElementContainer::from_js(app_element.into())?;
//! let runtime = taunus
//!     .mount(Rc::new(container), wiring, MountOptions::new().cache(CacheSetting::Toggle(true)))
//!     .await?;
//! ```

pub mod activator;
pub mod cache;
pub mod caching;
pub mod config;
pub mod events;
pub mod fetcher;
pub mod html;
pub mod interceptor;
pub mod links;
pub mod mount;
pub mod partial;
pub mod platform;
pub mod router;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod wiring;

pub use activator::{Activator, GoOptions, Navigation};
pub use config::{Bootstrap, CacheSetting, MountOptions, Timeouts};
pub use events::{EventBus, EventKind, NavigationEvent, SubscriptionId};
pub use fetcher::{FetchContext, FetchError, FetchSource};
pub use interceptor::InterceptorEvent;
pub use mount::{BootError, MountError, Runtime, Taunus};
pub use partial::RenderError;
pub use platform::Platform;
pub use router::{Route, RouteDefinition, Router, RouterError};
pub use wiring::Wiring;

/// Commonly used items.
pub mod prelude {
	pub use crate::activator::{GoOptions, Navigation};
	pub use crate::config::{Bootstrap, CacheSetting, MountOptions};
	pub use crate::events::{EventKind, NavigationEvent};
	pub use crate::mount::{MountError, Runtime, Taunus};
	#[cfg(target_arch = "wasm32")]
	pub use crate::platform::browser::ElementContainer;
	pub use crate::platform::Platform;
	pub use crate::router::RouteDefinition;
	pub use crate::wiring::Wiring;
}

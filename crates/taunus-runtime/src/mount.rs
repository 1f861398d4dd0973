//! Mounting and bootstrap.
//!
//! [`Taunus::mount`] assembles a [`NavigationState`] for a container,
//! obtains the first view's model with the configured [`Bootstrap`]
//! strategy and hands it to the activator. A [`Taunus`] instance can be
//! mounted once at a time.

use crate::activator::{Activator, GoOptions, Navigation};
use crate::caching;
use crate::config::{Bootstrap, MountOptions, ParseBootstrapError};
use crate::events::{EventBus, EventKind, NavigationEvent, SubscriptionId};
use crate::fetcher::{FetchContext, FetchError, FetchSource};
use crate::html;
use crate::interceptor::InterceptorEvent;
use crate::links::Links;
use crate::partial::RenderError;
use crate::platform::{Container, Platform, ReadySlot};
use crate::router::RouterError;
use crate::state::NavigationState;
use crate::wiring::Wiring;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use thiserror::Error;

/// Failure to hand the first model to the activator.
#[derive(Debug, Error)]
pub enum BootError {
	/// The model is not a JSON object.
	#[error("View model must be a JSON object, got {kind}")]
	InvalidModel {
		/// The JSON type received.
		kind: &'static str,
	},
	/// The first view failed to render.
	#[error(transparent)]
	Render(#[from] RenderError),
}

/// Failure to mount the runtime.
#[derive(Debug, Error)]
pub enum MountError {
	/// `mount` was called while a runtime is already mounted.
	#[error("Taunus is already mounted")]
	AlreadyMounted,
	/// The container handed to `mount` is not an element.
	#[error("Container must be a DOM element")]
	InvalidContainer,
	/// The bootstrap mode string was not recognized.
	#[error(transparent)]
	InvalidBootstrap(#[from] ParseBootstrapError),
	/// Mount options read from JSON are malformed.
	#[error("Invalid mount options")]
	InvalidOptions(#[source] serde_json::Error),
	/// A route pattern in the wiring does not compile.
	#[error(transparent)]
	Router(#[from] RouterError),
	/// Inline bootstrap without a `data-taunus` attribute on the container.
	#[error("Container has no data-taunus attribute naming the model script")]
	MissingBootstrapId,
	/// Inline bootstrap named a script that does not exist.
	#[error("No <script> element with id '{0}' holds the view model")]
	MissingBootstrapScript(String),
	/// The inline model is not valid JSON.
	#[error("Inline view model is not valid JSON")]
	InlineModel(#[source] serde_json::Error),
	/// Automatic bootstrap could not match the current location.
	#[error("No route matches the current location '{0}'")]
	Unroutable(String),
	/// Automatic bootstrap could not fetch the model.
	#[error("Failed to fetch the initial view model")]
	Fetch(#[source] FetchError),
	/// The first model was rejected.
	#[error(transparent)]
	Boot(#[from] BootError),
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

/// Hands `model` to the activator, once per mount.
fn boot(state: &NavigationState, activator: &Activator, model: Value) -> Result<(), BootError> {
	if state.booted.replace(true) {
		tracing::debug!(target: "taunus::mount", "already booted; ignoring model");
		return Ok(());
	}
	if !model.is_object() {
		state.booted.set(false);
		return Err(BootError::InvalidModel {
			kind: json_kind(&model),
		});
	}

	let location = state.platform.history.location();
	if let Some(route) = state.router.resolve(&location) {
		caching::persist(state, &route, &model);
	}
	activator.start(model)?;
	tracing::info!(target: "taunus::mount", %location, "booted");
	Ok(())
}

/// A mounted runtime.
///
/// Cheap to clone; every clone drives the same navigation state.
#[derive(Debug, Clone)]
pub struct Runtime {
	state: Rc<NavigationState>,
	activator: Activator,
	links: Rc<Links>,
}

impl Runtime {
	/// Navigates to `url`.
	pub async fn go(&self, url: &str, options: GoOptions) -> Result<Navigation, RenderError> {
		self.activator.go(url, options).await
	}

	/// Subscribes to events of `kind`.
	pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
	where
		F: Fn(&NavigationEvent) + 'static,
	{
		self.state.events.on(kind, handler)
	}

	/// Subscribes to the next event of `kind`.
	pub fn once<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
	where
		F: Fn(&NavigationEvent) + 'static,
	{
		self.state.events.once(kind, handler)
	}

	/// Removes a subscription.
	pub fn off(&self, id: SubscriptionId) -> bool {
		self.state.events.off(id)
	}

	/// Registers a fetch interceptor for `action`, or every route with `None`.
	pub fn intercept<F>(&self, action: Option<&str>, handler: F)
	where
		F: Fn(Rc<InterceptorEvent>) + 'static,
	{
		self.state.interceptors.add(action, handler);
	}

	/// Whether the first model has been rendered.
	pub fn is_booted(&self) -> bool {
		self.state.booted.get()
	}

	/// The navigation state.
	pub fn state(&self) -> &Rc<NavigationState> {
		&self.state
	}

	/// The event bus.
	pub fn events(&self) -> &Rc<EventBus> {
		&self.state.events
	}

	/// The activator.
	pub fn activator(&self) -> &Activator {
		&self.activator
	}

	/// The link handler.
	pub fn links(&self) -> &Rc<Links> {
		&self.links
	}
}

struct Mounted {
	runtime: Runtime,
	#[cfg(target_arch = "wasm32")]
	listeners: Option<crate::platform::browser::Listeners>,
}

/// Entry point owning the mount guard.
pub struct Taunus {
	platform: Platform,
	mounted: RefCell<Option<Mounted>>,
}

impl std::fmt::Debug for Taunus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Taunus")
			.field("platform", &self.platform)
			.field("mounted", &self.is_mounted())
			.finish()
	}
}

impl Taunus {
	/// Creates an unmounted instance over `platform`.
	pub fn new(platform: Platform) -> Self {
		Self {
			platform,
			mounted: RefCell::new(None),
		}
	}

	/// Whether a runtime is currently mounted.
	pub fn is_mounted(&self) -> bool {
		self.mounted.borrow().is_some()
	}

	/// The mounted runtime, if any.
	pub fn runtime(&self) -> Option<Runtime> {
		self.mounted.borrow().as_ref().map(|m| m.runtime.clone())
	}

	/// Mounts the runtime on `container`.
	///
	/// Resolves once the first view has booted, except under manual
	/// bootstrap with no model available yet, where it resolves as soon as
	/// the `taunusReady` hook is installed.
	///
	/// # Errors
	///
	/// Fails if already mounted, if the wiring's routes do not compile, or if
	/// the selected bootstrap strategy cannot produce a valid first model. A
	/// failed mount releases the guard.
	pub async fn mount(
		&self,
		container: Rc<dyn Container>,
		wiring: Wiring,
		options: MountOptions,
	) -> Result<Runtime, MountError> {
		if self.is_mounted() {
			return Err(MountError::AlreadyMounted);
		}

		let state = Rc::new(NavigationState::new(
			self.platform.clone(),
			container,
			wiring,
			&options,
		)?);
		let activator = Activator::new(Rc::clone(&state));
		let links = Links::new(Rc::clone(&state), activator.clone());
		let runtime = Runtime {
			state: Rc::clone(&state),
			activator: activator.clone(),
			links,
		};

		caching::install(&state);

		*self.mounted.borrow_mut() = Some(Mounted {
			runtime: runtime.clone(),
			#[cfg(target_arch = "wasm32")]
			listeners: None,
		});
		tracing::debug!(target: "taunus::mount", bootstrap = %options.bootstrap, caching = state.caching(), "mounting");

		let capability = state.persistent.negotiated().await;
		tracing::debug!(target: "taunus::mount", ?capability, "persistent store negotiated");

		if let Err(error) = self.bootstrap(&state, &activator, options.bootstrap).await {
			self.unmount();
			return Err(error);
		}

		// Manual bootstrap may still be waiting; `Links` ignores anchors until boot.
		#[cfg(target_arch = "wasm32")]
		if let Some(mounted) = self.mounted.borrow_mut().as_mut() {
			mounted.listeners = Some(crate::platform::browser::Listeners::attach(&runtime));
		}
		Ok(runtime)
	}

	async fn bootstrap(
		&self,
		state: &Rc<NavigationState>,
		activator: &Activator,
		strategy: Bootstrap,
	) -> Result<(), MountError> {
		match strategy {
			Bootstrap::Auto => {
				let location = state.platform.history.location();
				let route = state
					.router
					.resolve(&location)
					.ok_or_else(|| MountError::Unroutable(location.clone()))?;
				let model = state
					.fetcher
					.fetch(&route, FetchContext::new(FetchSource::Boot))
					.await
					.map_err(MountError::Fetch)?;
				boot(state, activator, model)?;
			}
			Bootstrap::Inline => {
				let id = state
					.container
					.bootstrap_id()
					.ok_or(MountError::MissingBootstrapId)?;
				let text = state
					.platform
					.document
					.script_text(&id)
					.ok_or_else(|| MountError::MissingBootstrapScript(id.clone()))?;
				let model =
					serde_json::from_str(&html::unescape(&text)).map_err(MountError::InlineModel)?;
				boot(state, activator, model)?;
			}
			Bootstrap::Manual => match state.platform.ready.inspect() {
				ReadySlot::Model(model) => boot(state, activator, model)?,
				ReadySlot::Callback | ReadySlot::Empty => {
					let weak: Weak<NavigationState> = Rc::downgrade(state);
					state.platform.ready.install(Box::new(move |model| {
						let Some(state) = weak.upgrade() else {
							return;
						};
						let activator = Activator::new(Rc::clone(&state));
						if let Err(error) = boot(&state, &activator, model) {
							tracing::error!(target: "taunus::mount", %error, "manual bootstrap failed");
						}
					}));
					tracing::debug!(target: "taunus::mount", "waiting for taunusReady");
				}
			},
		}
		Ok(())
	}

	/// Tears the mounted runtime down. Returns `false` if nothing was mounted.
	///
	/// Pending fetches are aborted, subscribers and interceptors are dropped
	/// and DOM listeners are removed. The instance may be mounted again.
	pub fn unmount(&self) -> bool {
		let Some(mounted) = self.mounted.borrow_mut().take() else {
			return false;
		};
		let state = &mounted.runtime.state;
		state.fetcher.abort_pending();
		state.events.clear();
		state.interceptors.clear();
		tracing::debug!(target: "taunus::mount", "unmounted");
		true
	}
}

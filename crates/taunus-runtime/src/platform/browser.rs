//! Browser platform on top of `web-sys`.
//!
//! Only compiled for `wasm32`. DOM listeners are held by [`Listeners`] and
//! removed when it is dropped, which happens on unmount.

use super::{
	BrowserHistory, Container, Document, HistoryFlavor, PersistentBackend, Platform, ReadyCallback,
	ReadyGlobal, ReadySlot, Scheduler, Transport,
};
use crate::cache::{CacheEntry, StoreError};
use crate::fetcher::FetchError;
use crate::links::{AnchorKey, LinkClick, LinkHover};
use crate::mount::{MountError, Runtime};
use async_trait::async_trait;
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use gloo_net::http::Request;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
	AbortController, Element, Event, EventTarget, HtmlAnchorElement, IdbDatabase, IdbObjectStoreParameters,
	IdbOpenDbRequest, IdbRequest, IdbTransactionMode, MouseEvent, PopStateEvent, Window,
};

/// Name of the global used by manual bootstrap.
pub const READY_GLOBAL: &str = "taunusReady";

const DATABASE: &str = "taunus-cache";
const OBJECT_STORE: &str = "wildstore";
const KEY_PATH: &str = "key";
const PROBE_DATABASE: &str = "taunus-probe";

fn js_message(value: &JsValue) -> String {
	value
		.dyn_ref::<js_sys::Error>()
		.map(|e| String::from(e.message()))
		.or_else(|| value.as_string())
		.unwrap_or_else(|| format!("{value:?}"))
}

fn to_js(value: &Value) -> Result<JsValue, serde_wasm_bindgen::Error> {
	value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

impl Platform {
	/// The platform backed by the current window.
	///
	/// # Errors
	///
	/// Fails outside a window context, e.g. in a worker.
	pub fn browser() -> Result<Self, JsValue> {
		#[cfg(feature = "console_error_panic_hook")]
		console_error_panic_hook::set_once();

		let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window object"))?;
		let document = window
			.document()
			.ok_or_else(|| JsValue::from_str("No document object"))?;

		Ok(Self {
			scheduler: Rc::new(BrowserScheduler),
			transport: Rc::new(FetchTransport),
			history: Rc::new(WindowHistory::new(window.clone(), document.clone())),
			document: Rc::new(DomDocument { document }),
			storage: Rc::new(IndexedDbBackend::new(window.clone())),
			ready: Rc::new(WindowReadyGlobal { window }),
		})
	}
}

/// Timers from `gloo-timers`, tasks from `wasm-bindgen-futures`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserScheduler;

impl Scheduler for BrowserScheduler {
	fn now_ms(&self) -> u64 {
		js_sys::Date::now() as u64
	}

	fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
		gloo_timers::future::sleep(duration).boxed_local()
	}

	fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
		wasm_bindgen_futures::spawn_local(task);
	}
}

/// Aborts the request unless it finished.
struct AbortOnDrop {
	controller: AbortController,
	finished: bool,
}

impl Drop for AbortOnDrop {
	fn drop(&mut self) {
		if !self.finished {
			self.controller.abort();
		}
	}
}

/// `gloo-net` requests with an `AbortController` per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTransport;

fn fetch_failure(error: gloo_net::Error) -> FetchError {
	match error {
		gloo_net::Error::JsError(e) if e.name == "AbortError" => FetchError::Aborted,
		gloo_net::Error::SerdeError(e) => FetchError::Decode(e.to_string()),
		other => FetchError::Network(other.to_string()),
	}
}

#[async_trait(?Send)]
impl Transport for FetchTransport {
	async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
		let controller = AbortController::new().map_err(|e| FetchError::Network(js_message(&e)))?;
		let signal = controller.signal();
		let mut guard = AbortOnDrop {
			controller,
			finished: false,
		};

		let response = Request::get(url)
			.header("Accept", "application/json")
			.abort_signal(Some(&signal))
			.send()
			.await
			.map_err(fetch_failure)?;
		if !response.ok() {
			guard.finished = true;
			return Err(FetchError::Http {
				status: response.status(),
			});
		}

		let model = response.json::<Value>().await.map_err(|e| match fetch_failure(e) {
			FetchError::Network(message) => FetchError::Decode(message),
			other => other,
		});
		guard.finished = true;
		model
	}
}

/// `window.history` and `window.location`.
pub struct WindowHistory {
	window: Window,
	document: web_sys::Document,
	flavor: HistoryFlavor,
}

impl WindowHistory {
	/// Wraps the window's history, detecting its flavor once.
	pub fn new(window: Window, document: web_sys::Document) -> Self {
		let flavor = detect_flavor(&window);
		tracing::debug!(target: "taunus::platform", ?flavor, "history flavor detected");
		Self {
			window,
			document,
			flavor,
		}
	}

	fn write(&self, push: bool, model: &Value, title: Option<&str>, url: &str) {
		let Ok(history) = self.window.history() else {
			return;
		};
		let state = match to_js(&serde_json::json!({ "model": model })) {
			Ok(state) => state,
			Err(error) => {
				tracing::warn!(target: "taunus::platform", %error, "model not representable in history state");
				return;
			}
		};
		let title = title.unwrap_or_default();
		let result = if push {
			history.push_state_with_url(&state, title, Some(url))
		} else {
			history.replace_state_with_url(&state, title, Some(url))
		};
		if let Err(error) = result {
			tracing::warn!(target: "taunus::platform", error = %js_message(&error), "history write failed");
		}
	}
}

/// Classifies `history` by checking whether `replaceState` is still the
/// browser's own function.
fn detect_flavor(window: &Window) -> HistoryFlavor {
	let Ok(history) = window.history() else {
		return HistoryFlavor::Unsupported;
	};
	let replace = js_sys::Reflect::get(&history, &JsValue::from_str("replaceState"))
		.ok()
		.and_then(|f| f.dyn_into::<js_sys::Function>().ok());
	match replace {
		None => HistoryFlavor::Unsupported,
		Some(f) if String::from(f.to_string()).contains("[native code]") => HistoryFlavor::Standard,
		Some(_) => HistoryFlavor::QuirkyReplaceState,
	}
}

/// Extracts `{ model }` from a history state object.
fn model_from_state(state: JsValue) -> Option<Value> {
	if state.is_undefined() || state.is_null() {
		return None;
	}
	let state: Value = serde_wasm_bindgen::from_value(state).ok()?;
	state.get("model").filter(|m| !m.is_null()).cloned()
}

impl BrowserHistory for WindowHistory {
	fn flavor(&self) -> HistoryFlavor {
		self.flavor
	}

	fn push_state(&self, model: &Value, title: Option<&str>, url: &str) {
		self.write(true, model, title, url);
	}

	fn replace_state(&self, model: &Value, title: Option<&str>, url: &str) {
		self.write(false, model, title, url);
	}

	fn state_model(&self) -> Option<Value> {
		let state = self.window.history().ok()?.state().ok()?;
		model_from_state(state)
	}

	fn location(&self) -> String {
		let location = self.window.location();
		let pathname = location.pathname().unwrap_or_else(|_| "/".to_string());
		let search = location.search().unwrap_or_default();
		let hash = location.hash().unwrap_or_default();
		format!("{pathname}{search}{hash}")
	}

	fn origin(&self) -> String {
		self.window.location().origin().unwrap_or_default()
	}

	fn assign(&self, url: &str) {
		if let Err(error) = self.window.location().assign(url) {
			tracing::error!(target: "taunus::platform", %url, error = %js_message(&error), "full page load failed");
		}
	}

	fn set_title(&self, title: &str) {
		self.document.set_title(title);
	}

	fn scroll_into(&self, id: &str) -> bool {
		match self.document.get_element_by_id(id) {
			Some(element) => {
				element.scroll_into_view();
				true
			}
			None => false,
		}
	}

	fn scroll_to_top(&self) {
		self.window.scroll_to_with_x_and_y(0.0, 0.0);
	}
}

/// Script lookup by id.
pub struct DomDocument {
	document: web_sys::Document,
}

impl Document for DomDocument {
	fn script_text(&self, id: &str) -> Option<String> {
		self.document.get_element_by_id(id)?.text_content()
	}
}

/// A DOM element used as the mount container.
#[derive(Debug, Clone)]
pub struct ElementContainer {
	element: Element,
}

impl ElementContainer {
	/// Wraps `element`.
	pub fn new(element: Element) -> Self {
		Self { element }
	}

	/// Accepts any JS value that is an element.
	///
	/// # Errors
	///
	/// Returns [`MountError::InvalidContainer`] for anything else.
	pub fn from_js(value: JsValue) -> Result<Self, MountError> {
		value
			.dyn_into::<Element>()
			.map(Self::new)
			.map_err(|_| MountError::InvalidContainer)
	}

	/// The wrapped element.
	pub fn element(&self) -> &Element {
		&self.element
	}
}

impl Container for ElementContainer {
	fn set_html(&self, html: &str) {
		self.element.set_inner_html(html);
	}

	fn bootstrap_id(&self) -> Option<String> {
		self.element.get_attribute("data-taunus")
	}
}

/// `window.taunusReady`.
pub struct WindowReadyGlobal {
	window: Window,
}

impl ReadyGlobal for WindowReadyGlobal {
	fn inspect(&self) -> ReadySlot {
		let value = js_sys::Reflect::get(&self.window, &JsValue::from_str(READY_GLOBAL))
			.unwrap_or(JsValue::UNDEFINED);
		if value.is_undefined() || value.is_null() {
			return ReadySlot::Empty;
		}
		if value.is_function() {
			return ReadySlot::Callback;
		}
		match serde_wasm_bindgen::from_value(value) {
			Ok(model) => ReadySlot::Model(model),
			Err(error) => {
				tracing::warn!(target: "taunus::platform", %error, "taunusReady holds a value that is not JSON");
				ReadySlot::Empty
			}
		}
	}

	fn install(&self, callback: ReadyCallback) {
		let closure = Closure::wrap(Box::new(move |value: JsValue| {
			match serde_wasm_bindgen::from_value::<Value>(value) {
				Ok(model) => callback(model),
				Err(error) => {
					tracing::error!(target: "taunus::platform", %error, "taunusReady called with a non-JSON model")
				}
			}
		}) as Box<dyn FnMut(JsValue)>);

		if let Err(error) = js_sys::Reflect::set(
			&self.window,
			&JsValue::from_str(READY_GLOBAL),
			closure.as_ref().unchecked_ref(),
		) {
			tracing::error!(target: "taunus::platform", error = %js_message(&error), "failed to install taunusReady");
		}
		// The global owns the callback from here on.
		closure.forget();
	}
}

#[derive(Serialize, Deserialize)]
struct Record {
	key: String,
	#[serde(flatten)]
	entry: CacheEntry,
}

/// Resolves with the request's result once it succeeds or fails.
async fn settle(request: &IdbRequest) -> Result<JsValue, StoreError> {
	let (sender, receiver) = oneshot::channel::<Result<JsValue, StoreError>>();
	let sender = Rc::new(RefCell::new(Some(sender)));

	let ok_sender = Rc::clone(&sender);
	let ok_request = request.clone();
	let on_success = Closure::<dyn FnMut(Event)>::once(move |_: Event| {
		if let Some(sender) = ok_sender.borrow_mut().take() {
			let result = ok_request
				.result()
				.map_err(|e| StoreError::Backend(js_message(&e)));
			let _ = sender.send(result);
		}
	});
	let err_request = request.clone();
	let on_error = Closure::<dyn FnMut(Event)>::once(move |_: Event| {
		if let Some(sender) = sender.borrow_mut().take() {
			let message = err_request
				.error()
				.ok()
				.flatten()
				.map(|e| e.message())
				.unwrap_or_else(|| "request failed".to_string());
			let _ = sender.send(Err(StoreError::Backend(message)));
		}
	});
	request.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
	request.set_onerror(Some(on_error.as_ref().unchecked_ref()));

	let result = receiver
		.await
		.unwrap_or_else(|_| Err(StoreError::Backend("request dropped".to_string())));
	request.set_onsuccess(None);
	request.set_onerror(None);
	result
}

/// Opens `name`, creating `store` (keyed by `key`) on first use.
async fn open_database(window: &Window, name: &str, store: &'static str) -> Result<IdbDatabase, StoreError> {
	let factory = window
		.indexed_db()
		.map_err(|e| StoreError::Unavailable(js_message(&e)))?
		.ok_or_else(|| StoreError::Unavailable("indexedDB is not available".to_string()))?;
	let request: IdbOpenDbRequest = factory
		.open_with_u32(name, 1)
		.map_err(|e| StoreError::Unavailable(js_message(&e)))?;

	let upgrade_request = request.clone();
	let on_upgrade = Closure::<dyn FnMut(Event)>::once(move |_: Event| {
		let Some(db) = upgrade_request
			.result()
			.ok()
			.and_then(|r| r.dyn_into::<IdbDatabase>().ok())
		else {
			return;
		};
		let parameters = IdbObjectStoreParameters::new();
		parameters.set_key_path(&JsValue::from_str(KEY_PATH));
		if let Err(error) = db.create_object_store_with_optional_parameters(store, &parameters) {
			tracing::debug!(target: "taunus::cache", error = %js_message(&error), "object store creation failed");
		}
	});
	request.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));

	let result = settle(&request).await;
	request.set_onupgradeneeded(None);
	result?
		.dyn_into::<IdbDatabase>()
		.map_err(|_| StoreError::Malformed("open request did not yield a database".to_string()))
}

/// IndexedDB database `taunus-cache`, object store `wildstore`.
pub struct IndexedDbBackend {
	window: Window,
	database: RefCell<Option<IdbDatabase>>,
}

impl IndexedDbBackend {
	fn new(window: Window) -> Self {
		Self {
			window,
			database: RefCell::new(None),
		}
	}

	async fn database(&self) -> Result<IdbDatabase, StoreError> {
		if let Some(db) = self.database.borrow().as_ref() {
			return Ok(db.clone());
		}
		let db = open_database(&self.window, DATABASE, OBJECT_STORE).await?;
		*self.database.borrow_mut() = Some(db.clone());
		Ok(db)
	}

	async fn object_store(&self, mode: IdbTransactionMode) -> Result<web_sys::IdbObjectStore, StoreError> {
		let db = self.database().await?;
		db.transaction_with_str_and_mode(OBJECT_STORE, mode)
			.and_then(|tx| tx.object_store(OBJECT_STORE))
			.map_err(|e| StoreError::Backend(js_message(&e)))
	}
}

#[async_trait(?Send)]
impl PersistentBackend for IndexedDbBackend {
	/// Writes a blob into a throwaway database and deletes it again.
	async fn probe(&self) -> Result<(), StoreError> {
		let db = open_database(&self.window, PROBE_DATABASE, OBJECT_STORE).await?;
		let blob = web_sys::Blob::new_with_str_sequence(&js_sys::Array::of1(&JsValue::from_str("probe")))
			.map_err(|e| StoreError::Unavailable(js_message(&e)))?;
		let record = js_sys::Object::new();
		js_sys::Reflect::set(&record, &JsValue::from_str(KEY_PATH), &JsValue::from_str("probe"))
			.and_then(|_| js_sys::Reflect::set(&record, &JsValue::from_str("data"), &blob))
			.map_err(|e| StoreError::Unavailable(js_message(&e)))?;

		let written = match db
			.transaction_with_str_and_mode(OBJECT_STORE, IdbTransactionMode::Readwrite)
			.and_then(|tx| tx.object_store(OBJECT_STORE))
			.and_then(|store| store.put(&record))
		{
			Ok(request) => settle(&request).await.map(|_| ()),
			Err(error) => Err(StoreError::Unavailable(js_message(&error))),
		};

		db.close();
		if let Ok(Some(factory)) = self.window.indexed_db() {
			let _ = factory.delete_database(PROBE_DATABASE);
		}
		written
	}

	async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
		let store = self.object_store(IdbTransactionMode::Readonly).await?;
		let request = store
			.get(&JsValue::from_str(key))
			.map_err(|e| StoreError::Backend(js_message(&e)))?;
		let value = settle(&request).await?;
		if value.is_undefined() || value.is_null() {
			return Ok(None);
		}
		let record: Record =
			serde_wasm_bindgen::from_value(value).map_err(|e| StoreError::Malformed(e.to_string()))?;
		Ok(Some(record.entry))
	}

	async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), StoreError> {
		let record = Record {
			key: key.to_string(),
			entry: entry.clone(),
		};
		let value = record
			.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
			.map_err(|e| StoreError::Malformed(e.to_string()))?;
		let store = self.object_store(IdbTransactionMode::Readwrite).await?;
		let request = store
			.put(&value)
			.map_err(|e| StoreError::Backend(js_message(&e)))?;
		settle(&request).await.map(|_| ())
	}
}

/// Gives every anchor element a stable key.
struct AnchorKeys {
	keys: js_sys::WeakMap,
	next: Cell<u64>,
}

impl AnchorKeys {
	fn key(&self, anchor: &HtmlAnchorElement) -> AnchorKey {
		let existing = self.keys.get(anchor).as_f64();
		if let Some(key) = existing {
			return AnchorKey(key as u64);
		}
		let key = self.next.get();
		self.next.set(key + 1);
		self.keys.set(anchor, &JsValue::from_f64(key as f64));
		AnchorKey(key)
	}
}

fn anchor_of(event: &Event) -> Option<HtmlAnchorElement> {
	event
		.target()?
		.dyn_into::<Element>()
		.ok()?
		.closest("a")
		.ok()??
		.dyn_into::<HtmlAnchorElement>()
		.ok()
}

type Listener = Closure<dyn FnMut(Event)>;

/// DOM listeners feeding a mounted runtime; removed on drop.
pub struct Listeners {
	attached: Vec<(EventTarget, &'static str, Listener)>,
}

impl Listeners {
	/// Listens for anchor clicks, hovers and touches on the document and
	/// for `popstate` on the window.
	///
	/// Attaches nothing outside a window context.
	pub fn attach(runtime: &Runtime) -> Self {
		let mut listeners = Self {
			attached: Vec::new(),
		};
		let Some(window) = web_sys::window() else {
			return listeners;
		};
		let Some(document) = window.document() else {
			return listeners;
		};
		let keys = Rc::new(AnchorKeys {
			keys: js_sys::WeakMap::new(),
			next: Cell::new(0),
		});

		let links = Rc::clone(runtime.links());
		let click_keys = Rc::clone(&keys);
		listeners.add(&document, "click", move |event| {
			let (Some(anchor), Some(mouse)) = (anchor_of(&event), event.dyn_ref::<MouseEvent>()) else {
				return;
			};
			let click = LinkClick {
				anchor: click_keys.key(&anchor),
				href: anchor.href(),
				origin: anchor.origin(),
				button: mouse.button(),
				modifier: mouse.ctrl_key() || mouse.meta_key() || mouse.shift_key() || mouse.alt_key(),
			};
			if links.on_click(&click).prevents_default() {
				event.prevent_default();
			}
		});

		for kind in ["mouseover", "touchstart"] {
			let links = Rc::clone(runtime.links());
			let hover_keys = Rc::clone(&keys);
			listeners.add(&document, kind, move |event| {
				let Some(anchor) = anchor_of(&event) else {
					return;
				};
				links.on_hover(&LinkHover {
					anchor: hover_keys.key(&anchor),
					href: anchor.href(),
					origin: anchor.origin(),
				});
			});
		}

		let activator = runtime.activator().clone();
		listeners.add(&window, "popstate", move |event| {
			let model = event
				.dyn_ref::<PopStateEvent>()
				.and_then(|e| model_from_state(e.state()));
			if let Err(error) = activator.on_popstate(model) {
				tracing::error!(target: "taunus::platform", %error, "popstate render failed");
			}
		});

		listeners
	}

	fn add<F>(&mut self, target: &EventTarget, kind: &'static str, handler: F)
	where
		F: FnMut(Event) + 'static,
	{
		let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
		match target.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref()) {
			Ok(()) => self.attached.push((target.clone(), kind, closure)),
			Err(error) => {
				tracing::warn!(target: "taunus::platform", event = kind, error = %js_message(&error), "listener not attached")
			}
		}
	}
}

impl Drop for Listeners {
	fn drop(&mut self) {
		for (target, kind, closure) in self.attached.drain(..) {
			let _ = target.remove_event_listener_with_callback(kind, closure.as_ref().unchecked_ref());
		}
	}
}

//! In-memory platform implementations for tests.
//!
//! [`TestPlatform`] bundles one of each fake and exposes typed handles so a
//! test can script responses and inspect what the runtime did:
//!
//! ```ignore
//! let test = TestPlatform::new("/a/1");
//! test.transport.respond("/a/1?json", json!({ "title": "One" }));
//! let taunus = Taunus::new(test.platform());
//! ```

use crate::cache::{CacheEntry, StoreError};
use crate::fetcher::FetchError;
use crate::platform::{
	BrowserHistory, Container, Document, HistoryFlavor, PersistentBackend, Platform, ReadyCallback,
	ReadyGlobal, ReadySlot, Scheduler,
};
use async_trait::async_trait;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

/// Origin every fake reports.
pub const TEST_ORIGIN: &str = "https://taunus.test";

struct Scripted {
	result: Result<Value, FetchError>,
	delay: Duration,
}

/// Marks a request as cancelled unless it completes first.
struct InFlight<'a> {
	url: &'a str,
	cancelled: &'a RefCell<Vec<String>>,
	done: bool,
}

impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		if !self.done {
			self.cancelled.borrow_mut().push(self.url.to_string());
		}
	}
}

/// A [`Transport`](crate::platform::Transport) answering from scripted responses.
///
/// Unscripted URLs fail with HTTP 404.
pub struct FakeTransport {
	scheduler: Rc<dyn Scheduler>,
	responses: RefCell<HashMap<String, Scripted>>,
	requests: RefCell<Vec<String>>,
	cancelled: RefCell<Vec<String>>,
}

impl FakeTransport {
	/// Creates a transport whose delays run on `scheduler`.
	pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
		Self {
			scheduler,
			responses: RefCell::new(HashMap::new()),
			requests: RefCell::new(Vec::new()),
			cancelled: RefCell::new(Vec::new()),
		}
	}

	/// Answers `url` with `model` immediately.
	pub fn respond(&self, url: &str, model: Value) {
		self.script(url, Ok(model), Duration::ZERO);
	}

	/// Answers `url` with `model` after `delay`.
	pub fn respond_after(&self, url: &str, model: Value, delay: Duration) {
		self.script(url, Ok(model), delay);
	}

	/// Fails `url` with `error`.
	pub fn fail(&self, url: &str, error: FetchError) {
		self.script(url, Err(error), Duration::ZERO);
	}

	fn script(&self, url: &str, result: Result<Value, FetchError>, delay: Duration) {
		self.responses
			.borrow_mut()
			.insert(url.to_string(), Scripted { result, delay });
	}

	/// Every URL requested, in order.
	pub fn requests(&self) -> Vec<String> {
		self.requests.borrow().clone()
	}

	/// URLs whose request was dropped before completing.
	pub fn cancelled(&self) -> Vec<String> {
		self.cancelled.borrow().clone()
	}
}

#[async_trait(?Send)]
impl crate::platform::Transport for FakeTransport {
	async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
		self.requests.borrow_mut().push(url.to_string());
		let (result, delay) = match self.responses.borrow().get(url) {
			Some(scripted) => (scripted.result.clone(), scripted.delay),
			None => (Err(FetchError::Http { status: 404 }), Duration::ZERO),
		};

		let mut in_flight = InFlight {
			url,
			cancelled: &self.cancelled,
			done: false,
		};
		if !delay.is_zero() {
			self.scheduler.sleep(delay).await;
		}
		in_flight.done = true;
		result
	}
}

/// A history entry written by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
	/// The stashed model.
	pub model: Value,
	/// The title passed along.
	pub title: Option<String>,
	/// The entry's URL.
	pub url: String,
}

/// An in-memory [`BrowserHistory`].
pub struct MemoryHistory {
	flavor: HistoryFlavor,
	entries: RefCell<Vec<HistoryEntry>>,
	index: Cell<usize>,
	location: RefCell<String>,
	assigned: RefCell<Vec<String>>,
	title: RefCell<String>,
	anchors: RefCell<Vec<String>>,
	scrolls: RefCell<Vec<String>>,
	pushes: Cell<usize>,
	replaces: Cell<usize>,
}

impl MemoryHistory {
	/// Creates a history positioned at `location` with no stashed state.
	pub fn new(location: &str, flavor: HistoryFlavor) -> Self {
		Self {
			flavor,
			entries: RefCell::new(vec![HistoryEntry {
				model: Value::Null,
				title: None,
				url: location.to_string(),
			}]),
			index: Cell::new(0),
			location: RefCell::new(location.to_string()),
			assigned: RefCell::new(Vec::new()),
			title: RefCell::new(String::new()),
			anchors: RefCell::new(Vec::new()),
			scrolls: RefCell::new(Vec::new()),
			pushes: Cell::new(0),
			replaces: Cell::new(0),
		}
	}

	/// Declares an element id that [`scroll_into`](BrowserHistory::scroll_into) can find.
	pub fn add_anchor(&self, id: &str) {
		self.anchors.borrow_mut().push(id.to_string());
	}

	/// Steps back one entry, as the back button would, and returns its state.
	pub fn back(&self) -> Option<Value> {
		let index = self.index.get().checked_sub(1)?;
		self.index.set(index);
		let entry = self.entries.borrow()[index].clone();
		*self.location.borrow_mut() = entry.url;
		Some(entry.model).filter(|m| !m.is_null())
	}

	/// Every entry up to and including the current one.
	pub fn entries(&self) -> Vec<HistoryEntry> {
		self.entries.borrow()[..=self.index.get()].to_vec()
	}

	/// URLs loaded with a full page load.
	pub fn assigned(&self) -> Vec<String> {
		self.assigned.borrow().clone()
	}

	/// The document title.
	pub fn title(&self) -> String {
		self.title.borrow().clone()
	}

	/// Scroll targets, `"top"` for the document root.
	pub fn scrolls(&self) -> Vec<String> {
		self.scrolls.borrow().clone()
	}

	/// How many times `pushState` and `replaceState` were called.
	pub fn writes(&self) -> (usize, usize) {
		(self.pushes.get(), self.replaces.get())
	}
}

impl BrowserHistory for MemoryHistory {
	fn flavor(&self) -> HistoryFlavor {
		self.flavor
	}

	fn push_state(&self, model: &Value, title: Option<&str>, url: &str) {
		let mut entries = self.entries.borrow_mut();
		let index = self.index.get() + 1;
		entries.truncate(index);
		entries.push(HistoryEntry {
			model: model.clone(),
			title: title.map(str::to_string),
			url: url.to_string(),
		});
		self.index.set(index);
		self.pushes.set(self.pushes.get() + 1);
		*self.location.borrow_mut() = url.to_string();
	}

	fn replace_state(&self, model: &Value, title: Option<&str>, url: &str) {
		self.entries.borrow_mut()[self.index.get()] = HistoryEntry {
			model: model.clone(),
			title: title.map(str::to_string),
			url: url.to_string(),
		};
		self.replaces.set(self.replaces.get() + 1);
		*self.location.borrow_mut() = url.to_string();
	}

	fn state_model(&self) -> Option<Value> {
		Some(self.entries.borrow()[self.index.get()].model.clone()).filter(|m| !m.is_null())
	}

	fn location(&self) -> String {
		self.location.borrow().clone()
	}

	fn origin(&self) -> String {
		TEST_ORIGIN.to_string()
	}

	fn assign(&self, url: &str) {
		self.assigned.borrow_mut().push(url.to_string());
	}

	fn set_title(&self, title: &str) {
		*self.title.borrow_mut() = title.to_string();
	}

	fn scroll_into(&self, id: &str) -> bool {
		let found = self.anchors.borrow().iter().any(|a| a == id);
		if found {
			self.scrolls.borrow_mut().push(id.to_string());
		}
		found
	}

	fn scroll_to_top(&self) {
		self.scrolls.borrow_mut().push("top".to_string());
	}
}

/// A [`Document`] holding `<script>` texts by id.
#[derive(Debug, Default)]
pub struct FakeDocument {
	scripts: RefCell<HashMap<String, String>>,
}

impl FakeDocument {
	/// Adds a `<script id="{id}">` with `text`.
	pub fn add_script(&self, id: &str, text: &str) {
		self.scripts
			.borrow_mut()
			.insert(id.to_string(), text.to_string());
	}
}

impl Document for FakeDocument {
	fn script_text(&self, id: &str) -> Option<String> {
		self.scripts.borrow().get(id).cloned()
	}
}

/// A [`Container`] that remembers what was rendered into it.
#[derive(Debug, Default)]
pub struct RecordingContainer {
	bootstrap_id: Option<String>,
	html: RefCell<String>,
	renders: Cell<usize>,
}

impl RecordingContainer {
	/// A container with a `data-taunus` attribute.
	pub fn with_bootstrap_id(id: &str) -> Self {
		Self {
			bootstrap_id: Some(id.to_string()),
			..Self::default()
		}
	}

	/// The current contents.
	pub fn html(&self) -> String {
		self.html.borrow().clone()
	}

	/// How many times the contents were replaced.
	pub fn renders(&self) -> usize {
		self.renders.get()
	}
}

impl Container for RecordingContainer {
	fn set_html(&self, html: &str) {
		*self.html.borrow_mut() = html.to_string();
		self.renders.set(self.renders.get() + 1);
	}

	fn bootstrap_id(&self) -> Option<String> {
		self.bootstrap_id.clone()
	}
}

/// A [`PersistentBackend`] over a hash map.
pub struct MemoryBackend {
	scheduler: Rc<dyn Scheduler>,
	entries: RefCell<HashMap<String, CacheEntry>>,
	probe: RefCell<Result<(), StoreError>>,
	probe_delay: Cell<Duration>,
	read_delay: Cell<Duration>,
}

impl std::fmt::Debug for MemoryBackend {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemoryBackend")
			.field("entries", &self.entries.borrow().len())
			.finish_non_exhaustive()
	}
}

impl MemoryBackend {
	/// A backend whose probe succeeds immediately.
	pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
		Self {
			scheduler,
			entries: RefCell::new(HashMap::new()),
			probe: RefCell::new(Ok(())),
			probe_delay: Cell::new(Duration::ZERO),
			read_delay: Cell::new(Duration::ZERO),
		}
	}

	/// Makes the probe fail with `error`.
	pub fn fail_probe(&self, error: StoreError) {
		*self.probe.borrow_mut() = Err(error);
	}

	/// Delays the probe's answer.
	pub fn delay_probe(&self, delay: Duration) {
		self.probe_delay.set(delay);
	}

	/// Delays every read.
	pub fn delay_reads(&self, delay: Duration) {
		self.read_delay.set(delay);
	}

	/// The stored entry for `key`.
	pub fn entry(&self, key: &str) -> Option<CacheEntry> {
		self.entries.borrow().get(key).cloned()
	}

	/// Number of stored entries.
	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	/// Whether nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.borrow().is_empty()
	}
}

#[async_trait(?Send)]
impl PersistentBackend for MemoryBackend {
	async fn probe(&self) -> Result<(), StoreError> {
		let delay = self.probe_delay.get();
		if !delay.is_zero() {
			self.scheduler.sleep(delay).await;
		}
		self.probe.borrow().clone()
	}

	async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
		let delay = self.read_delay.get();
		if !delay.is_zero() {
			self.scheduler.sleep(delay).await;
		}
		Ok(self.entry(key))
	}

	async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), StoreError> {
		self.entries
			.borrow_mut()
			.insert(key.to_string(), entry.clone());
		Ok(())
	}
}

enum ReadyState {
	Empty,
	Callback(ReadyCallback),
	Model(Value),
}

/// The `taunusReady` global.
pub struct FakeReadyGlobal {
	state: RefCell<ReadyState>,
}

impl Default for FakeReadyGlobal {
	fn default() -> Self {
		Self {
			state: RefCell::new(ReadyState::Empty),
		}
	}
}

impl FakeReadyGlobal {
	/// Pre-assigns a model, as a page that loaded its data early would.
	pub fn assign_model(&self, model: Value) {
		*self.state.borrow_mut() = ReadyState::Model(model);
	}

	/// Pre-assigns a placeholder function.
	pub fn assign_callback(&self) {
		*self.state.borrow_mut() = ReadyState::Callback(Box::new(|_| {}));
	}

	/// Calls the global with `model`, as external code would.
	///
	/// Returns `false` when the global is not a function.
	pub fn call(&self, model: Value) -> bool {
		match self.state.replace(ReadyState::Empty) {
			ReadyState::Callback(callback) => {
				callback(model);
				self.state.replace(ReadyState::Callback(callback));
				true
			}
			other => {
				self.state.replace(other);
				false
			}
		}
	}
}

impl ReadyGlobal for FakeReadyGlobal {
	fn inspect(&self) -> ReadySlot {
		match &*self.state.borrow() {
			ReadyState::Empty => ReadySlot::Empty,
			ReadyState::Callback(_) => ReadySlot::Callback,
			ReadyState::Model(model) => ReadySlot::Model(model.clone()),
		}
	}

	fn install(&self, callback: ReadyCallback) {
		*self.state.borrow_mut() = ReadyState::Callback(callback);
	}
}

/// One of each fake, plus a tokio scheduler.
#[cfg(not(target_arch = "wasm32"))]
pub struct TestPlatform {
	/// The scheduler shared by every fake.
	pub scheduler: Rc<crate::platform::native::TokioScheduler>,
	/// Scripted model responses.
	pub transport: Rc<FakeTransport>,
	/// History and location.
	pub history: Rc<MemoryHistory>,
	/// Inline bootstrap scripts.
	pub document: Rc<FakeDocument>,
	/// Persistent cache storage.
	pub storage: Rc<MemoryBackend>,
	/// The manual bootstrap global.
	pub ready: Rc<FakeReadyGlobal>,
}

#[cfg(not(target_arch = "wasm32"))]
impl TestPlatform {
	/// Fakes positioned at `location` with a standard History API.
	///
	/// Must be called inside a tokio runtime.
	pub fn new(location: &str) -> Self {
		Self::with_flavor(location, HistoryFlavor::Standard)
	}

	/// Fakes with the given History API flavor.
	pub fn with_flavor(location: &str, flavor: HistoryFlavor) -> Self {
		let scheduler = Rc::new(crate::platform::native::TokioScheduler::new());
		let shared: Rc<dyn Scheduler> = scheduler.clone();
		Self {
			transport: Rc::new(FakeTransport::new(Rc::clone(&shared))),
			history: Rc::new(MemoryHistory::new(location, flavor)),
			document: Rc::new(FakeDocument::default()),
			storage: Rc::new(MemoryBackend::new(shared)),
			ready: Rc::new(FakeReadyGlobal::default()),
			scheduler,
		}
	}

	/// The [`Platform`] handed to the runtime.
	pub fn platform(&self) -> Platform {
		Platform {
			scheduler: self.scheduler.clone(),
			transport: self.transport.clone(),
			history: self.history.clone(),
			document: self.document.clone(),
			storage: self.storage.clone(),
			ready: self.ready.clone(),
		}
	}
}

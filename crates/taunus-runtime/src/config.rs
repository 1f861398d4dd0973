//! Mount configuration.
//!
//! [`MountOptions`] and the per-route [`CacheSetting`] deserialize from the
//! same JSON shapes the wiring bundle uses:
//!
//! ```
//! use taunus_runtime::config::{Bootstrap, CacheSetting, MountOptions};
//!
//! let options: MountOptions =
//!     serde_json::from_str(r#"{ "bootstrap": "inline", "cache": 30, "prefetch": true }"#).unwrap();
//!
//! assert_eq!(options.bootstrap, Bootstrap::Inline);
//! assert_eq!(options.cache, CacheSetting::Seconds(30));
//! assert!(options.prefetch);
//! ```

use crate::mount::MountError;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Freshness window applied when caching is enabled without an explicit duration.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(15);

/// `false | true | seconds`, used both for the mount-wide cache switch and
/// for per-route overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CacheSetting {
	/// `true` uses the default window, `false` disables caching.
	Toggle(bool),
	/// An explicit freshness window in seconds.
	Seconds(u64),
}

impl Default for CacheSetting {
	fn default() -> Self {
		Self::Toggle(false)
	}
}

impl CacheSetting {
	/// Resolves the setting to a freshness window, `None` meaning "do not cache".
	///
	/// A zero-second window is treated as disabled.
	pub fn window(self, default: Duration) -> Option<Duration> {
		match self {
			Self::Toggle(false) | Self::Seconds(0) => None,
			Self::Toggle(true) => Some(default),
			Self::Seconds(secs) => Some(Duration::from_secs(secs)),
		}
	}

	/// Whether this setting turns caching off.
	pub fn is_disabled(self) -> bool {
		matches!(self, Self::Toggle(false) | Self::Seconds(0))
	}
}

/// Error returned when a bootstrap mode string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown bootstrap mode '{0}'; expected 'auto', 'inline' or 'manual'")]
pub struct ParseBootstrapError(pub String);

/// Strategy used to obtain the first view's model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Bootstrap {
	/// Fetch the model for the current URL over the network.
	#[default]
	Auto,
	/// Read the model from a `<script type="text/taunus">` element.
	Inline,
	/// Wait for external code to hand over the model through `taunusReady`.
	Manual,
}

impl FromStr for Bootstrap {
	type Err = ParseBootstrapError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"auto" => Ok(Self::Auto),
			"inline" => Ok(Self::Inline),
			"manual" => Ok(Self::Manual),
			other => Err(ParseBootstrapError(other.to_string())),
		}
	}
}

impl TryFrom<String> for Bootstrap {
	type Error = ParseBootstrapError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl std::fmt::Display for Bootstrap {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Self::Auto => "auto",
			Self::Inline => "inline",
			Self::Manual => "manual",
		};
		f.write_str(name)
	}
}

/// Latency ceilings used by the runtime.
///
/// The defaults are the values the runtime has always shipped with; they are
/// exposed so embedders on unusually slow storage can widen them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timeouts {
	/// How long interceptors may take before the network fetch proceeds.
	#[serde(with = "millis")]
	pub interceptor: Duration,
	/// Read ceiling for the in-memory cache store.
	#[serde(with = "millis")]
	pub memory_read: Duration,
	/// Read ceiling for the persistent cache store.
	#[serde(with = "millis")]
	pub persistent_read: Duration,
	/// How long the persistent store capability probe may run.
	#[serde(with = "millis")]
	pub store_probe: Duration,
}

impl Default for Timeouts {
	fn default() -> Self {
		Self {
			interceptor: Duration::from_millis(200),
			memory_read: Duration::from_millis(50),
			persistent_read: Duration::from_millis(100),
			store_probe: Duration::from_millis(600),
		}
	}
}

mod millis {
	use serde::{Deserialize, Deserializer};
	use std::time::Duration;

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}

/// Options accepted by `mount`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MountOptions {
	/// How the initial model is obtained.
	pub bootstrap: Bootstrap,
	/// Whether (and for how long) fetched models are cached.
	pub cache: CacheSetting,
	/// Whether hovering a link prefetches its model. Requires caching.
	pub prefetch: bool,
	/// Latency ceilings.
	pub timeouts: Timeouts,
}

impl MountOptions {
	/// Creates options with every default applied.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the bootstrap strategy.
	pub fn bootstrap(mut self, bootstrap: Bootstrap) -> Self {
		self.bootstrap = bootstrap;
		self
	}

	/// Sets the cache setting.
	pub fn cache(mut self, cache: CacheSetting) -> Self {
		self.cache = cache;
		self
	}

	/// Enables or disables hover prefetching.
	pub fn prefetch(mut self, prefetch: bool) -> Self {
		self.prefetch = prefetch;
		self
	}

	/// Overrides the latency ceilings.
	pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
		self.timeouts = timeouts;
		self
	}

	/// Reads options from the wiring JSON.
	///
	/// # Errors
	///
	/// [`MountError::InvalidBootstrap`] names an unknown bootstrap mode;
	/// any other malformed field is [`MountError::InvalidOptions`].
	pub fn from_json(value: Value) -> Result<Self, MountError> {
		if let Some(mode) = value.get("bootstrap").and_then(Value::as_str) {
			mode.parse::<Bootstrap>()?;
		}
		serde_json::from_value(value).map_err(MountError::InvalidOptions)
	}

	/// The default freshness window, or `None` when caching is off.
	pub fn freshness(&self) -> Option<Duration> {
		self.cache.window(DEFAULT_FRESHNESS)
	}
}

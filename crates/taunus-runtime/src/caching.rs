//! Caching policy.
//!
//! Caching plugs into the fetch pipeline from the outside: a global
//! interceptor answers fetches from the cache, and a `fetch.done` subscriber
//! stores every model that arrives. Routes declaring `cache: false` are left
//! alone in both directions.

use crate::config::CacheSetting;
use crate::events::{EventKind, NavigationEvent};
use crate::router::Route;
use crate::state::NavigationState;
use futures::FutureExt;
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;

/// How long `route`'s model stays fresh given the mount-wide `baseline`.
pub fn freshness_for(route: &Route, baseline: Duration) -> Option<Duration> {
	match route.cache {
		Some(CacheSetting::Toggle(true)) | None => Some(baseline),
		Some(setting) => setting.window(baseline),
	}
}

/// Stores `data` as `route`'s model if caching applies to it.
pub(crate) fn persist(state: &NavigationState, route: &Route, data: &Value) {
	let Some(baseline) = state.freshness else {
		return;
	};
	if let Some(duration) = freshness_for(route, baseline) {
		state.cache.set(&route.cache_key(), data, duration);
	}
}

/// Wires the cache into `state`'s interceptors and events. No-op when caching is off.
pub(crate) fn install(state: &Rc<NavigationState>) {
	let Some(baseline) = state.freshness else {
		return;
	};
	tracing::debug!(target: "taunus::cache", ?baseline, "caching enabled");

	let cache = Rc::clone(&state.cache);
	let scheduler = Rc::clone(&state.platform.scheduler);
	state.interceptors.add(None, move |event| {
		if matches!(event.route().cache, Some(setting) if setting.is_disabled()) {
			return;
		}
		let cache = Rc::clone(&cache);
		let key = event.route().cache_key();
		scheduler.spawn_local(
			async move {
				if let Some(data) = cache.get(&key).await {
					event.prevent_default(data);
				}
			}
			.boxed_local(),
		);
	});

	let weak = Rc::downgrade(state);
	state.events.on(EventKind::FetchDone, move |event| {
		if let (Some(state), NavigationEvent::FetchDone { route, data, .. }) = (weak.upgrade(), event) {
			persist(&state, route, data);
		}
	});
}

//! Capability-negotiated persistent cache tier.
//!
//! The store is usable immediately: until the backend's capability probe
//! settles, reads miss and a handful of writes are buffered. The probe result
//! is computed once and shared by every caller of [`PersistentStore::negotiated`].
//!
//! ```text
//! untested ──probe ok──────────────▶ supported   (buffered writes flushed)
//!    │
//!    └──probe error / timeout──────▶ unsupported (reads miss, writes dropped)
//! ```

use super::{CacheEntry, CacheStore, StoreError};
use crate::platform::{PersistentBackend, Scheduler};
use futures::future::{self, Either, LocalBoxFuture, Shared};
use futures::FutureExt;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Writes buffered while the probe is still running; later ones are dropped.
pub const MAX_BUFFERED_WRITES: usize = 4;

/// Outcome of capability negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCapability {
	/// The backend answered the probe in time.
	Supported,
	/// The backend failed the probe or did not answer in time.
	Unsupported,
}

enum State {
	Untested { buffered: Vec<(String, CacheEntry)> },
	Supported,
	Unsupported,
}

struct Inner {
	backend: Rc<dyn PersistentBackend>,
	state: RefCell<State>,
	negotiated: Shared<LocalBoxFuture<'static, StoreCapability>>,
}

impl Inner {
	async fn settle(&self, capability: StoreCapability) {
		let previous = self.state.replace(match capability {
			StoreCapability::Supported => State::Supported,
			StoreCapability::Unsupported => State::Unsupported,
		});

		let State::Untested { buffered } = previous else {
			return;
		};
		if capability == StoreCapability::Unsupported {
			tracing::debug!(
				target: "taunus::cache",
				dropped = buffered.len(),
				"persistent store unsupported"
			);
			return;
		}
		for (key, entry) in buffered {
			if let Err(error) = self.backend.put(&key, &entry).await {
				tracing::debug!(target: "taunus::cache", %key, %error, "buffered write failed");
			}
		}
	}
}

/// The persistent cache tier.
#[derive(Clone)]
pub struct PersistentStore {
	inner: Rc<Inner>,
}

impl std::fmt::Debug for PersistentStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = match &*self.inner.state.borrow() {
			State::Untested { .. } => "untested",
			State::Supported => "supported",
			State::Unsupported => "unsupported",
		};
		f.debug_struct("PersistentStore").field("state", &state).finish()
	}
}

impl PersistentStore {
	/// Wraps `backend` and starts its capability probe on `scheduler`.
	///
	/// The probe is abandoned as unsupported after `probe_timeout`.
	pub fn new(
		backend: Rc<dyn PersistentBackend>,
		scheduler: Rc<dyn Scheduler>,
		probe_timeout: Duration,
	) -> Self {
		let inner = Rc::new_cyclic(|weak: &Weak<Inner>| {
			let weak = weak.clone();
			let probe_backend = Rc::clone(&backend);
			let deadline = scheduler.sleep(probe_timeout);

			let negotiation = async move {
				let capability = match future::select(probe_backend.probe(), deadline).await {
					Either::Left((Ok(()), _)) => StoreCapability::Supported,
					Either::Left((Err(error), _)) => {
						tracing::debug!(target: "taunus::cache", %error, "persistent store probe failed");
						StoreCapability::Unsupported
					}
					Either::Right(_) => {
						tracing::debug!(target: "taunus::cache", "persistent store probe timed out");
						StoreCapability::Unsupported
					}
				};
				if let Some(inner) = weak.upgrade() {
					inner.settle(capability).await;
				}
				capability
			};

			Inner {
				backend,
				state: RefCell::new(State::Untested {
					buffered: Vec::new(),
				}),
				negotiated: negotiation.boxed_local().shared(),
			}
		});

		let driver = inner.negotiated.clone();
		scheduler.spawn_local(
			async move {
				driver.await;
			}
			.boxed_local(),
		);

		Self { inner }
	}

	/// Resolves once negotiation has settled and buffered writes were flushed.
	pub async fn negotiated(&self) -> StoreCapability {
		self.inner.negotiated.clone().await
	}

	/// The capability, if negotiation has already settled.
	pub fn capability(&self) -> Option<StoreCapability> {
		match &*self.inner.state.borrow() {
			State::Untested { .. } => None,
			State::Supported => Some(StoreCapability::Supported),
			State::Unsupported => Some(StoreCapability::Unsupported),
		}
	}
}

impl CacheStore for PersistentStore {
	fn get(&self, key: &str) -> LocalBoxFuture<'static, Result<Option<CacheEntry>, StoreError>> {
		let inner = Rc::clone(&self.inner);
		let key = key.to_string();
		async move {
			let supported = matches!(&*inner.state.borrow(), State::Supported);
			if !supported {
				return Ok(None);
			}
			inner.backend.get(&key).await
		}
		.boxed_local()
	}

	fn set(&self, key: &str, entry: CacheEntry) -> LocalBoxFuture<'static, Result<(), StoreError>> {
		{
			let mut state = self.inner.state.borrow_mut();
			match &mut *state {
				State::Untested { buffered } => {
					if buffered.len() < MAX_BUFFERED_WRITES {
						buffered.push((key.to_string(), entry));
					} else {
						tracing::debug!(target: "taunus::cache", %key, "write buffer full; dropping");
					}
					return future::ready(Ok(())).boxed_local();
				}
				State::Unsupported => return future::ready(Ok(())).boxed_local(),
				State::Supported => {}
			}
		}

		let inner = Rc::clone(&self.inner);
		let key = key.to_string();
		async move { inner.backend.put(&key, &entry).await }.boxed_local()
	}
}

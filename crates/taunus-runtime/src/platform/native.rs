//! Tokio-backed scheduler for native hosts and tests.

use super::Scheduler;
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A [`Scheduler`] driven by tokio's timer and `spawn_local`.
///
/// Must be used from within a [`tokio::task::LocalSet`]. Wall-clock time is
/// derived from tokio's [`Instant`](tokio::time::Instant) so that paused test
/// clocks also govern cache freshness.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
	epoch_ms: u64,
	started: tokio::time::Instant,
}

impl Default for TokioScheduler {
	fn default() -> Self {
		Self::new()
	}
}

impl TokioScheduler {
	/// Creates a scheduler anchored at the current wall-clock time.
	pub fn new() -> Self {
		let epoch_ms = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_millis() as u64)
			.unwrap_or(0);
		Self {
			epoch_ms,
			started: tokio::time::Instant::now(),
		}
	}
}

impl Scheduler for TokioScheduler {
	fn now_ms(&self) -> u64 {
		self.epoch_ms + self.started.elapsed().as_millis() as u64
	}

	fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
		tokio::time::sleep(duration).boxed_local()
	}

	fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
		tokio::task::spawn_local(task);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::cell::Cell;
	use std::rc::Rc;

	#[rstest]
	#[tokio::test(start_paused = true)]
	async fn test_clock_follows_paused_time() {
		let scheduler = TokioScheduler::new();
		let before = scheduler.now_ms();

		scheduler.sleep(Duration::from_millis(1500)).await;

		assert!(scheduler.now_ms() >= before + 1500);
	}

	#[rstest]
	#[tokio::test(start_paused = true)]
	async fn test_spawned_task_runs() {
		let local = tokio::task::LocalSet::new();
		local
			.run_until(async {
				let scheduler = TokioScheduler::new();
				let ran = Rc::new(Cell::new(false));
				let flag = Rc::clone(&ran);

				scheduler.spawn_local(async move { flag.set(true) }.boxed_local());
				scheduler.sleep(Duration::from_millis(1)).await;

				assert!(ran.get());
			})
			.await;
	}
}

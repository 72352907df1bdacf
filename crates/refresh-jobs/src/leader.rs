// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Leader election over an advisory lock backend.

use futures::FutureExt;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use refresh_core::{LockBackend, LockError};

/// How lock backend failures are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderMode {
	/// Skip the work on any acquisition failure. Used by the scheduler loop.
	Strict,
	/// Run without the lock if the backend is broken or lacks lock support.
	/// A lock cleanly held elsewhere still skips. Used by the startup warm-up.
	BestEffort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderOutcome<T> {
	Ran(T),
	/// Another instance holds the lock.
	Skipped,
}

impl<T> LeaderOutcome<T> {
	pub fn into_option(self) -> Option<T> {
		match self {
			LeaderOutcome::Ran(value) => Some(value),
			LeaderOutcome::Skipped => None,
		}
	}
}

/// How often a held lock is renewed while the work runs.
pub const DEFAULT_RENEW_INTERVAL: Duration = Duration::from_secs(60);

pub struct LeaderCoordinator<L: ?Sized> {
	backend: Arc<L>,
	renew_every: Duration,
}

impl<L: ?Sized> Clone for LeaderCoordinator<L> {
	fn clone(&self) -> Self {
		Self {
			backend: Arc::clone(&self.backend),
			renew_every: self.renew_every,
		}
	}
}

impl<L: LockBackend + ?Sized + 'static> LeaderCoordinator<L> {
	pub fn new(backend: Arc<L>) -> Self {
		Self {
			backend,
			renew_every: DEFAULT_RENEW_INTERVAL,
		}
	}

	pub fn with_renew_interval(mut self, renew_every: Duration) -> Self {
		self.renew_every = renew_every;
		self
	}

	/// Run `work` while holding `lock_key`.
	///
	/// The lock is released before this returns, including when `work`
	/// panics (the panic is re-raised after release). If the returned future
	/// is dropped mid-work the release is handed to the runtime.
	#[tracing::instrument(skip(self, work))]
	pub async fn run_exclusive<F, T>(
		&self,
		lock_key: i64,
		mode: LeaderMode,
		work: F,
	) -> Result<LeaderOutcome<T>, LockError>
	where
		F: Future<Output = T>,
	{
		let held = match self.backend.try_acquire_lock(lock_key).await {
			Ok(true) => true,
			Ok(false) => {
				info!(lock_key, "advisory lock held by another instance, skipping");
				return Ok(LeaderOutcome::Skipped);
			}
			Err(e) => match mode {
				LeaderMode::Strict => {
					warn!(lock_key, error = %e, "acquire advisory lock failed");
					return Err(e);
				}
				LeaderMode::BestEffort => {
					warn!(lock_key, error = %e, "advisory lock unavailable, proceeding without it");
					false
				}
			},
		};

		let mut guard = ReleaseGuard {
			backend: Arc::clone(&self.backend),
			lock_key,
			armed: held,
		};

		let work = AssertUnwindSafe(work).catch_unwind();
		let result = if held {
			let keep_alive = self.keep_alive(lock_key);
			tokio::pin!(work, keep_alive);
			tokio::select! {
				result = &mut work => result,
				never = &mut keep_alive => match never {},
			}
		} else {
			work.await
		};

		if guard.armed {
			guard.armed = false;
			release(self.backend.as_ref(), lock_key).await;
		}

		match result {
			Ok(value) => Ok(LeaderOutcome::Ran(value)),
			Err(panic) => std::panic::resume_unwind(panic),
		}
	}
}

impl<L: LockBackend + ?Sized + 'static> LeaderCoordinator<L> {
	/// Renew `lock_key` on every interval until dropped.
	async fn keep_alive(&self, lock_key: i64) -> Infallible {
		let mut ticker = tokio::time::interval_at(Instant::now() + self.renew_every, self.renew_every);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		loop {
			ticker.tick().await;
			match self.backend.renew_lock(lock_key).await {
				Ok(true) => trace!(lock_key, "renewed advisory lock"),
				Ok(false) => warn!(lock_key, "advisory lock lost while running"),
				Err(e) => warn!(lock_key, error = %e, "renew advisory lock failed"),
			}
		}
	}
}

async fn release<L: LockBackend + ?Sized>(backend: &L, lock_key: i64) {
	match backend.release_lock(lock_key).await {
		Ok(()) => debug!(lock_key, "released advisory lock"),
		Err(e) => warn!(lock_key, error = %e, "release advisory lock failed"),
	}
}

struct ReleaseGuard<L: LockBackend + ?Sized + 'static> {
	backend: Arc<L>,
	lock_key: i64,
	armed: bool,
}

impl<L: LockBackend + ?Sized + 'static> Drop for ReleaseGuard<L> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		let Ok(handle) = tokio::runtime::Handle::try_current() else {
			warn!(lock_key = self.lock_key, "no runtime to release advisory lock");
			return;
		};
		let backend = Arc::clone(&self.backend);
		let lock_key = self.lock_key;
		handle.spawn(async move {
			release(backend.as_ref(), lock_key).await;
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	#[derive(Default)]
	struct FakeLock {
		acquire: Mutex<Option<Result<bool, LockError>>>,
		releases: AtomicUsize,
		renewals: AtomicUsize,
	}

	impl FakeLock {
		fn answering(result: Result<bool, LockError>) -> Arc<Self> {
			Arc::new(Self {
				acquire: Mutex::new(Some(result)),
				..Default::default()
			})
		}

		fn releases(&self) -> usize {
			self.releases.load(Ordering::SeqCst)
		}

		fn renewals(&self) -> usize {
			self.renewals.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl LockBackend for FakeLock {
		async fn try_acquire_lock(&self, _key: i64) -> Result<bool, LockError> {
			self.acquire.lock().unwrap().clone().unwrap_or(Ok(true))
		}

		async fn release_lock(&self, _key: i64) -> Result<(), LockError> {
			self.releases.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}

		async fn renew_lock(&self, _key: i64) -> Result<bool, LockError> {
			self.renewals.fetch_add(1, Ordering::SeqCst);
			Ok(true)
		}
	}

	#[tokio::test]
	async fn test_runs_and_releases() {
		let lock = FakeLock::answering(Ok(true));
		let leader = LeaderCoordinator::new(Arc::clone(&lock));

		let outcome = leader
			.run_exclusive(42, LeaderMode::Strict, async { 7 })
			.await
			.unwrap();

		assert_eq!(outcome, LeaderOutcome::Ran(7));
		assert_eq!(lock.releases(), 1);
	}

	#[tokio::test]
	async fn test_held_lock_skips_in_both_modes() {
		for mode in [LeaderMode::Strict, LeaderMode::BestEffort] {
			let lock = FakeLock::answering(Ok(false));
			let leader = LeaderCoordinator::new(Arc::clone(&lock));
			let ran = AtomicUsize::new(0);

			let outcome = leader
				.run_exclusive(42, mode, async {
					ran.fetch_add(1, Ordering::SeqCst);
				})
				.await
				.unwrap();

			assert_eq!(outcome, LeaderOutcome::Skipped);
			assert_eq!(ran.load(Ordering::SeqCst), 0);
			assert_eq!(lock.releases(), 0);
		}
	}

	#[tokio::test]
	async fn test_strict_mode_surfaces_backend_error() {
		let lock = FakeLock::answering(Err(LockError::Backend("connection refused".into())));
		let leader = LeaderCoordinator::new(Arc::clone(&lock));

		let err = leader
			.run_exclusive(42, LeaderMode::Strict, async { 0 })
			.await
			.unwrap_err();

		assert_eq!(err, LockError::Backend("connection refused".into()));
	}

	#[tokio::test]
	async fn test_best_effort_proceeds_without_lock_support() {
		let lock = FakeLock::answering(Err(LockError::Unsupported));
		let leader = LeaderCoordinator::new(Arc::clone(&lock));

		let outcome = leader
			.run_exclusive(42, LeaderMode::BestEffort, async { "warm" })
			.await
			.unwrap();

		assert_eq!(outcome.into_option(), Some("warm"));
		assert_eq!(lock.releases(), 0);
	}

	#[tokio::test]
	async fn test_releases_when_work_panics() {
		let lock = FakeLock::answering(Ok(true));
		let leader = LeaderCoordinator::new(Arc::clone(&lock));

		let handle = tokio::spawn(async move {
			leader
				.run_exclusive(42, LeaderMode::Strict, async {
					if std::hint::black_box(true) {
						panic!("refresh blew up");
					}
				})
				.await
		});

		let err = handle.await.unwrap_err();
		assert!(err.is_panic());
		assert_eq!(lock.releases(), 1);
	}

	#[tokio::test]
	async fn test_held_lock_is_renewed_during_long_work() {
		let lock = FakeLock::answering(Ok(true));
		let leader = LeaderCoordinator::new(Arc::clone(&lock)).with_renew_interval(Duration::from_millis(20));

		let outcome = leader
			.run_exclusive(42, LeaderMode::Strict, async {
				tokio::time::sleep(Duration::from_millis(110)).await;
				"done"
			})
			.await
			.unwrap();

		assert_eq!(outcome, LeaderOutcome::Ran("done"));
		assert!(lock.renewals() >= 3, "renewed {} times", lock.renewals());
		assert_eq!(lock.releases(), 1);

		// No renewals once the work has finished.
		let after = lock.renewals();
		tokio::time::sleep(Duration::from_millis(60)).await;
		assert_eq!(lock.renewals(), after);
	}

	#[tokio::test]
	async fn test_unheld_lock_is_not_renewed() {
		let lock = FakeLock::answering(Err(LockError::Unsupported));
		let leader = LeaderCoordinator::new(Arc::clone(&lock)).with_renew_interval(Duration::from_millis(10));

		leader
			.run_exclusive(42, LeaderMode::BestEffort, tokio::time::sleep(Duration::from_millis(50)))
			.await
			.unwrap();

		assert_eq!(lock.renewals(), 0);
	}

	#[tokio::test]
	async fn test_releases_when_dropped_mid_work() {
		let lock = FakeLock::answering(Ok(true));
		let leader = LeaderCoordinator::new(Arc::clone(&lock));

		let run = leader.run_exclusive(42, LeaderMode::Strict, std::future::pending::<()>());
		let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), run).await;
		assert!(timed_out.is_err());

		for _ in 0..50 {
			if lock.releases() == 1 {
				break;
			}
			tokio::time::sleep(std::time::Duration::from_millis(5)).await;
		}
		assert_eq!(lock.releases(), 1);
	}
}

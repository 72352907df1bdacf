// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded-retry execution of a single unit refresh.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use refresh_core::{ProviderUnit, UnitRefresher};

use crate::error::UnitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Deadline for each individual attempt.
	pub timeout: Duration,
	/// Extra attempts after the first. `0` means a single attempt.
	pub retry_attempts: u32,
	/// Fixed pause between attempts.
	pub delay: Duration,
}

impl RetryPolicy {
	pub fn max_attempts(&self) -> u32 {
		self.retry_attempts.saturating_add(1)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome {
	pub success: bool,
	/// Refresher invocations actually made.
	pub attempts: u32,
	pub last_error: Option<UnitError>,
}

impl RetryOutcome {
	fn succeeded(attempts: u32) -> Self {
		Self {
			success: true,
			attempts,
			last_error: None,
		}
	}

	fn failed(attempts: u32, error: UnitError) -> Self {
		Self {
			success: false,
			attempts,
			last_error: Some(error),
		}
	}

	pub fn error_message(&self) -> Option<String> {
		self.last_error.as_ref().map(ToString::to_string)
	}
}

/// Refresh `unit` up to `policy.max_attempts()` times.
///
/// Each attempt runs under its own deadline and a child of `cancel`, so a
/// timed out attempt is told to stop. Cancellation of `cancel` ends the loop
/// immediately, including during the delay, and is never retried.
pub async fn attempt(
	refresher: &dyn UnitRefresher,
	unit: &ProviderUnit,
	policy: &RetryPolicy,
	cancel: &CancellationToken,
) -> RetryOutcome {
	let max_attempts = policy.max_attempts();
	let mut attempts = 0u32;

	loop {
		if cancel.is_cancelled() {
			return RetryOutcome::failed(attempts, UnitError::Cancelled);
		}

		attempts += 1;
		let attempt_token = cancel.child_token();
		let result = tokio::time::timeout(policy.timeout, refresher.refresh(unit, &attempt_token)).await;
		attempt_token.cancel();

		let error = match result {
			Ok(Ok(())) => {
				debug!(unit = %unit.key, attempts, "refresh succeeded");
				return RetryOutcome::succeeded(attempts);
			}
			Ok(Err(e)) => UnitError::Failed(format!("{e:#}")),
			Err(_) => UnitError::Timeout(policy.timeout),
		};

		if cancel.is_cancelled() {
			return RetryOutcome::failed(attempts, UnitError::Cancelled);
		}

		if attempts >= max_attempts {
			warn!(unit = %unit.key, attempts, error = %error, "refresh failed, retries exhausted");
			return RetryOutcome::failed(attempts, error);
		}

		warn!(
			unit = %unit.key,
			attempt = attempts,
			max_attempts,
			delay_ms = policy.delay.as_millis() as u64,
			error = %error,
			"refresh failed, retrying"
		);

		tokio::select! {
			_ = cancel.cancelled() => {
				return RetryOutcome::failed(attempts, UnitError::Cancelled);
			}
			_ = tokio::time::sleep(policy.delay) => {}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use refresh_core::UnitKind;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;
	use std::time::Instant;

	/// Fails the first `failures` calls, then succeeds.
	struct Flaky {
		failures: u32,
		calls: AtomicU32,
		hang: bool,
	}

	impl Flaky {
		fn new(failures: u32) -> Self {
			Self {
				failures,
				calls: AtomicU32::new(0),
				hang: false,
			}
		}

		fn calls(&self) -> u32 {
			self.calls.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl UnitRefresher for Flaky {
		async fn refresh(&self, _unit: &ProviderUnit, cancel: &CancellationToken) -> anyhow::Result<()> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
			if self.hang {
				cancel.cancelled().await;
				anyhow::bail!("aborted");
			}
			if call <= self.failures {
				anyhow::bail!("HTTP 503 on call {call}");
			}
			Ok(())
		}
	}

	fn policy(retry_attempts: u32, delay_ms: u64) -> RetryPolicy {
		RetryPolicy {
			timeout: Duration::from_secs(5),
			retry_attempts,
			delay: Duration::from_millis(delay_ms),
		}
	}

	fn unit() -> ProviderUnit {
		ProviderUnit::new("kub", UnitKind::Electric)
	}

	#[tokio::test]
	async fn test_first_attempt_success() {
		let refresher = Flaky::new(0);
		let outcome = attempt(&refresher, &unit(), &policy(2, 1), &CancellationToken::new()).await;
		assert_eq!(outcome, RetryOutcome::succeeded(1));
	}

	#[tokio::test]
	async fn test_retries_until_success() {
		let refresher = Flaky::new(2);
		let outcome = attempt(&refresher, &unit(), &policy(2, 1), &CancellationToken::new()).await;
		assert!(outcome.success);
		assert_eq!(outcome.attempts, 3);
		assert_eq!(refresher.calls(), 3);
	}

	#[tokio::test]
	async fn test_exhausts_retries() {
		let refresher = Flaky::new(u32::MAX);
		let outcome = attempt(&refresher, &unit(), &policy(2, 1), &CancellationToken::new()).await;
		assert!(!outcome.success);
		assert_eq!(outcome.attempts, 3);
		assert_eq!(outcome.error_message().as_deref(), Some("HTTP 503 on call 3"));
	}

	#[tokio::test]
	async fn test_zero_retries_is_single_attempt() {
		let refresher = Flaky::new(u32::MAX);
		let outcome = attempt(&refresher, &unit(), &policy(0, 1), &CancellationToken::new()).await;
		assert_eq!(outcome.attempts, 1);
		assert_eq!(refresher.calls(), 1);
	}

	#[tokio::test]
	async fn test_timeout_is_retried_and_cancels_attempt() {
		let refresher = Flaky {
			hang: true,
			..Flaky::new(0)
		};
		let policy = RetryPolicy {
			timeout: Duration::from_millis(20),
			retry_attempts: 1,
			delay: Duration::from_millis(1),
		};
		let outcome = attempt(&refresher, &unit(), &policy, &CancellationToken::new()).await;
		assert_eq!(outcome.attempts, 2);
		assert_eq!(
			outcome.last_error,
			Some(UnitError::Timeout(Duration::from_millis(20)))
		);
	}

	#[tokio::test]
	async fn test_cancel_during_delay_stops_quickly() {
		let refresher = Arc::new(Flaky::new(u32::MAX));
		let cancel = CancellationToken::new();

		let task = {
			let refresher = Arc::clone(&refresher);
			let cancel = cancel.clone();
			tokio::spawn(async move { attempt(refresher.as_ref(), &unit(), &policy(5, 10_000), &cancel).await })
		};

		tokio::time::sleep(Duration::from_millis(50)).await;
		let cancelled_at = Instant::now();
		cancel.cancel();
		let outcome = task.await.unwrap();

		assert!(cancelled_at.elapsed() < Duration::from_secs(1));
		assert_eq!(outcome.attempts, 1);
		assert_eq!(outcome.last_error, Some(UnitError::Cancelled));
		assert_eq!(refresher.calls(), 1);
	}

	#[tokio::test]
	async fn test_already_cancelled_makes_no_call() {
		let refresher = Flaky::new(0);
		let cancel = CancellationToken::new();
		cancel.cancel();
		let outcome = attempt(&refresher, &unit(), &policy(2, 1), &cancel).await;
		assert_eq!(outcome.attempts, 0);
		assert_eq!(refresher.calls(), 0);
	}
}

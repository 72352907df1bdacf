// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded, rate-limited dispatch of batch work.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
	/// Maximum in-flight items. `0` and `1` both mean sequential.
	pub max_concurrency: usize,
	/// Minimum spacing between two consecutive starts.
	pub rate_limit: Duration,
}

impl DispatchPolicy {
	pub fn is_sequential(&self) -> bool {
		self.max_concurrency <= 1
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched<R> {
	Completed(R),
	/// Cancellation fired before the item was started.
	NotStarted,
	/// The work future panicked.
	Panicked,
}

/// Run `work` over `items`, returning one entry per item in input order.
///
/// Starts happen in input order. Cancellation stops new starts; work
/// already started is awaited and sees the cancellation through its own
/// token.
pub async fn dispatch<T, R, F, Fut>(
	items: Vec<T>,
	policy: DispatchPolicy,
	cancel: &CancellationToken,
	work: F,
) -> Vec<Dispatched<R>>
where
	T: Send + 'static,
	R: Send + 'static,
	F: Fn(T) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = R> + Send + 'static,
{
	if policy.is_sequential() {
		dispatch_sequential(items, policy.rate_limit, cancel, work).await
	} else {
		dispatch_parallel(items, policy, cancel, work).await
	}
}

async fn dispatch_sequential<T, R, F, Fut>(
	items: Vec<T>,
	rate_limit: Duration,
	cancel: &CancellationToken,
	work: F,
) -> Vec<Dispatched<R>>
where
	F: Fn(T) -> Fut,
	Fut: Future<Output = R>,
{
	let total = items.len();
	let mut results: Vec<Dispatched<R>> = Vec::with_capacity(total);

	for (index, item) in items.into_iter().enumerate() {
		if cancel.is_cancelled() {
			break;
		}

		let outcome = AssertUnwindSafe(work(item)).catch_unwind().await;
		results.push(match outcome {
			Ok(value) => Dispatched::Completed(value),
			Err(_) => {
				error!(index, "batch work panicked");
				Dispatched::Panicked
			}
		});

		if index + 1 < total && !rate_limit.is_zero() {
			tokio::select! {
				_ = cancel.cancelled() => break,
				_ = tokio::time::sleep(rate_limit) => {}
			}
		}
	}

	results.resize_with(total, || Dispatched::NotStarted);
	results
}

async fn dispatch_parallel<T, R, F, Fut>(
	items: Vec<T>,
	policy: DispatchPolicy,
	cancel: &CancellationToken,
	work: F,
) -> Vec<Dispatched<R>>
where
	T: Send + 'static,
	R: Send + 'static,
	F: Fn(T) -> Fut + Send + Sync + 'static,
	Fut: Future<Output = R> + Send + 'static,
{
	let total = items.len();
	let work = Arc::new(work);
	let semaphore = Arc::new(Semaphore::new(policy.max_concurrency));
	let mut tasks = JoinSet::new();
	let mut next_start: Option<Instant> = None;

	for (index, item) in items.into_iter().enumerate() {
		let permit = tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			permit = Arc::clone(&semaphore).acquire_owned() => match permit {
				Ok(permit) => permit,
				Err(_) => break,
			},
		};

		if let Some(at) = next_start {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				_ = tokio::time::sleep_until(at) => {}
			}
		}
		next_start = Some(Instant::now() + policy.rate_limit);

		debug!(index, in_flight = policy.max_concurrency - semaphore.available_permits(), "dispatching");
		let work = Arc::clone(&work);
		tasks.spawn(async move {
			let _permit = permit;
			let outcome = AssertUnwindSafe(work(item)).catch_unwind().await;
			(index, outcome)
		});
	}

	let mut results: Vec<Dispatched<R>> = Vec::with_capacity(total);
	results.resize_with(total, || Dispatched::NotStarted);

	while let Some(joined) = tasks.join_next().await {
		match joined {
			Ok((index, Ok(value))) => results[index] = Dispatched::Completed(value),
			Ok((index, Err(_))) => {
				error!(index, "batch work panicked");
				results[index] = Dispatched::Panicked;
			}
			Err(e) => error!(error = %e, "batch worker task failed"),
		}
	}

	results
}

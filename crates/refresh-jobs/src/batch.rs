// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The batch orchestrator: freshness and resume filtering, tracked dispatch,
//! aggregation, metrics and alerting for one batch over every registered unit.

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use refresh_config::{AlertConfig, BatchSettings};
use refresh_core::{BatchRun, BatchSummary, Storage, UnitResult};

use crate::alert::{AlertSink, BatchAlert, NoopAlertSink};
use crate::context::JobContext;
use crate::error::{JobError, Result};
use crate::freshness::FreshnessGate;
use crate::leader::{LeaderCoordinator, LeaderMode};
use crate::metrics::{MetricsSink, NoopMetrics, UnitOutcome};
use crate::pool::{self, DispatchPolicy, Dispatched};
use crate::progress::ProgressTracker;
use crate::registry::{RegisteredUnit, UnitRegistry};
use crate::retry::{self, RetryPolicy};

pub const DEFAULT_BATCH_JOB_NAME: &str = "batch_refresh";

const SKIP_ALREADY_COMPLETED: &str = "already completed this batch";
const ERR_NOT_DISPATCHED: &str = "cancelled before dispatch";
const ERR_PANICKED: &str = "refresh panicked";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
	/// Label used for metrics and alerts.
	pub job_name: String,
	pub max_concurrency: usize,
	pub unit_timeout: Duration,
	pub retry_attempts: u32,
	pub retry_delay: Duration,
	pub rate_limit: Duration,
	/// Zero disables the freshness gate.
	pub cache_ttl: Duration,
	pub resume_enabled: bool,
	/// `None` generates `batch_<unix seconds>` at run time.
	pub batch_id: Option<String>,
	pub min_failures_before_alert: usize,
}

impl Default for BatchConfig {
	fn default() -> Self {
		Self::from_settings(&BatchSettings::default(), &AlertConfig::default())
	}
}

impl BatchConfig {
	pub fn from_settings(settings: &BatchSettings, alert: &AlertConfig) -> Self {
		Self {
			job_name: DEFAULT_BATCH_JOB_NAME.to_string(),
			max_concurrency: settings.max_concurrency,
			unit_timeout: settings.unit_timeout(),
			retry_attempts: settings.retry_attempts,
			retry_delay: settings.retry_delay(),
			rate_limit: settings.rate_limit(),
			cache_ttl: settings.cache_ttl(),
			resume_enabled: settings.resume_enabled,
			batch_id: settings.batch_id.clone(),
			min_failures_before_alert: alert.min_failures,
		}
	}

	pub fn with_job_name(mut self, job_name: impl Into<String>) -> Self {
		self.job_name = job_name.into();
		self
	}

	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy {
			timeout: self.unit_timeout,
			retry_attempts: self.retry_attempts,
			delay: self.retry_delay,
		}
	}

	pub fn dispatch_policy(&self) -> DispatchPolicy {
		DispatchPolicy {
			max_concurrency: self.max_concurrency,
			rate_limit: self.rate_limit,
		}
	}
}

pub struct BatchOrchestrator {
	registry: Arc<UnitRegistry>,
	storage: Arc<dyn Storage>,
	leader: LeaderCoordinator<dyn Storage>,
	alerts: Arc<dyn AlertSink>,
	metrics: Arc<dyn MetricsSink>,
}

impl BatchOrchestrator {
	pub fn new(registry: Arc<UnitRegistry>, storage: Arc<dyn Storage>) -> Self {
		Self {
			registry,
			leader: LeaderCoordinator::new(Arc::clone(&storage)),
			storage,
			alerts: Arc::new(NoopAlertSink),
			metrics: Arc::new(NoopMetrics),
		}
	}

	pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
		self.alerts = alerts;
		self
	}

	pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
		self.metrics = metrics;
		self
	}

	pub fn registry(&self) -> &UnitRegistry {
		&self.registry
	}

	pub fn storage(&self) -> &Arc<dyn Storage> {
		&self.storage
	}

	pub fn leader(&self) -> &LeaderCoordinator<dyn Storage> {
		&self.leader
	}

	pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
		&self.metrics
	}

	/// Run one batch over every registered unit and return its summary.
	///
	/// Per-unit failures never abort the batch. Metrics are always emitted;
	/// an alert is sent when at least `min_failures_before_alert` units failed.
	#[instrument(skip(self, ctx, config), fields(job = %config.job_name, run_id = %ctx.run_id, trigger = %ctx.triggered_by))]
	pub async fn run_batch(&self, ctx: &JobContext, config: &BatchConfig) -> BatchSummary {
		let run = BatchRun::new(config.batch_id.clone());
		let clock = Instant::now();
		info!(batch_id = %run.id, units = self.registry.len(), "starting batch");

		let gate = FreshnessGate::new(Arc::clone(&self.storage), config.cache_ttl);
		let tracker = ProgressTracker::new(Arc::clone(&self.storage), run.id.as_str());

		let mut results: Vec<Option<UnitResult>> = (0..self.registry.len()).map(|_| None).collect();
		let mut queued: Vec<(usize, RegisteredUnit)> = Vec::new();

		for (index, registered) in self.registry.iter().enumerate() {
			let key = registered.key();

			if let Some(reason) = gate.check(key, Utc::now()).await {
				info!(unit = %key, %reason, "skipping unit");
				results[index] = Some(UnitResult::skipped(key, reason));
				continue;
			}

			if config.resume_enabled && tracker.is_completed(key).await {
				info!(unit = %key, batch_id = %run.id, "skipping unit, already completed");
				results[index] = Some(UnitResult::skipped(key, SKIP_ALREADY_COMPLETED));
				continue;
			}

			tracker.mark_pending(key).await;
			queued.push((index, registered.clone()));
		}

		let (positions, units): (Vec<usize>, Vec<RegisteredUnit>) = queued.into_iter().unzip();
		let keys: Vec<String> = units.iter().map(|u| u.key().to_string()).collect();

		let policy = config.retry_policy();
		let work_tracker = tracker.clone();
		let cancel = ctx.cancellation_token.clone();
		let dispatched = pool::dispatch(
			units,
			config.dispatch_policy(),
			&ctx.cancellation_token,
			move |registered: RegisteredUnit| {
				let tracker = work_tracker.clone();
				let cancel = cancel.clone();
				async move { refresh_tracked(&tracker, &registered, &policy, &cancel).await }
			},
		)
		.await;

		for ((index, key), outcome) in positions.into_iter().zip(keys).zip(dispatched) {
			let result = match outcome {
				Dispatched::Completed(result) => result,
				Dispatched::NotStarted => {
					UnitResult::processed(key, Duration::ZERO, 0, Some(ERR_NOT_DISPATCHED.to_string()))
				}
				Dispatched::Panicked => {
					tracker
						.mark_finished(&key, Utc::now(), 0, Some(ERR_PANICKED.to_string()))
						.await;
					UnitResult::processed(key, Duration::ZERO, 0, Some(ERR_PANICKED.to_string()))
				}
			};
			results[index] = Some(result);
		}

		let summary = BatchSummary {
			job_name: config.job_name.clone(),
			batch_id: run.id,
			started_at: run.started_at,
			duration: clock.elapsed(),
			results: results.into_iter().flatten().collect(),
		};

		self.finish(&summary, config).await;
		summary
	}

	async fn finish(&self, summary: &BatchSummary, config: &BatchConfig) {
		let failure = summary.failure_message();

		info!(
			batch_id = %summary.batch_id,
			total = summary.total(),
			skipped = summary.skipped_count(),
			succeeded = summary.success_count(),
			failed = summary.failed_count(),
			duration_ms = summary.duration.as_millis() as u64,
			"batch finished"
		);

		self
			.metrics
			.record_job_run(&summary.job_name, summary.started_at, failure.as_deref());
		for result in &summary.results {
			let outcome = if result.skipped {
				UnitOutcome::Skipped
			} else if result.is_failure() {
				UnitOutcome::Failure
			} else {
				UnitOutcome::Success
			};
			self.metrics.record_unit_outcome(&summary.job_name, outcome);
		}

		let failed = summary.failed_count();
		if failed > 0 && failed >= config.min_failures_before_alert && self.alerts.is_enabled() {
			let alert = BatchAlert::from_summary(summary);
			if let Err(e) = self.alerts.send(&alert).await {
				warn!(batch_id = %summary.batch_id, error = %e, "failed to deliver batch alert");
			}
		}
	}

	/// Single execution for an external trigger. Any failed unit turns into
	/// [`JobError::BatchFailed`].
	pub async fn run_batch_once(&self, ctx: &JobContext, config: &BatchConfig) -> Result<BatchSummary> {
		let summary = self.run_batch(ctx, config).await;
		let failed = summary.failed_count();
		if failed > 0 {
			return Err(JobError::BatchFailed {
				failed,
				total: summary.total(),
			});
		}
		Ok(summary)
	}

	/// Startup warm-up under best-effort leadership. `None` when another
	/// instance holds the lock.
	#[instrument(skip(self, ctx, config), fields(job = %config.job_name))]
	pub async fn run_warmup(
		&self,
		ctx: &JobContext,
		config: &BatchConfig,
		lock_key: i64,
	) -> Result<Option<BatchSummary>> {
		let outcome = self
			.leader
			.run_exclusive(lock_key, LeaderMode::BestEffort, self.run_batch(ctx, config))
			.await?;
		Ok(outcome.into_option())
	}

	/// Refresh one unit now, bypassing the freshness gate and progress
	/// tracking.
	#[instrument(skip(self, ctx, config))]
	pub async fn force_refresh_unit(
		&self,
		ctx: &JobContext,
		config: &BatchConfig,
		unit_key: &str,
	) -> Result<UnitResult> {
		let registered = self
			.registry
			.get(unit_key)
			.ok_or_else(|| JobError::UnknownUnit(unit_key.to_string()))?;

		let clock = Instant::now();
		let outcome = retry::attempt(
			registered.refresher.as_ref(),
			&registered.unit,
			&config.retry_policy(),
			&ctx.cancellation_token,
		)
		.await;

		let error = outcome.error_message();
		match &error {
			None => info!(unit = %unit_key, attempts = outcome.attempts, "forced refresh succeeded"),
			Some(e) => warn!(unit = %unit_key, attempts = outcome.attempts, error = %e, "forced refresh failed"),
		}
		Ok(UnitResult::processed(unit_key, clock.elapsed(), outcome.attempts, error))
	}
}

async fn refresh_tracked(
	tracker: &ProgressTracker<dyn Storage>,
	registered: &RegisteredUnit,
	policy: &RetryPolicy,
	cancel: &CancellationToken,
) -> UnitResult {
	let key = registered.key();
	let started_at = Utc::now();
	let clock = Instant::now();

	tracker.mark_in_progress(key, started_at).await;
	let outcome = retry::attempt(registered.refresher.as_ref(), &registered.unit, policy, cancel).await;
	let error = outcome.error_message();
	tracker
		.mark_finished(key, started_at, outcome.attempts, error.clone())
		.await;

	match &error {
		None => info!(unit = %key, attempts = outcome.attempts, "unit refreshed"),
		Some(e) => warn!(unit = %key, attempts = outcome.attempts, error = %e, "unit failed"),
	}
	UnitResult::processed(key, clock.elapsed(), outcome.attempts, error)
}

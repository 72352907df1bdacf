// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};

use refresh_config::SchedulerConfig;
use refresh_core::{BatchSummary, ScheduledJobRecord, ScheduledJobStore, SettingsStore};

use crate::batch::{BatchConfig, BatchOrchestrator};
use crate::context::{JobContext, TriggerSource};
use crate::error::Result;
use crate::leader::{LeaderMode, LeaderOutcome};
use crate::schedule::Schedule;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
	/// Settings row consulted on every tick for a schedule override.
	pub setting_name: String,
	/// Used until the settings row holds a non-empty value.
	pub default_schedule: String,
	/// Control loop resolution, independent of the schedule itself.
	pub tick: Duration,
}

impl SchedulerOptions {
	pub fn from_config(config: &SchedulerConfig) -> Self {
		Self {
			setting_name: config.setting_name.clone(),
			default_schedule: config.schedule.clone(),
			tick: config.tick(),
		}
	}
}

pub struct Scheduler {
	orchestrator: Arc<BatchOrchestrator>,
	batch: BatchConfig,
	options: SchedulerOptions,
}

impl Scheduler {
	pub fn new(orchestrator: Arc<BatchOrchestrator>, batch: BatchConfig, options: SchedulerOptions) -> Self {
		Self {
			orchestrator,
			batch,
			options,
		}
	}

	/// Run batches on the configured schedule until `ctx` is cancelled.
	///
	/// The first cycle runs on the first tick. Every cycle gets a fresh batch
	/// id, and the next run is always computed from the current time.
	#[instrument(skip(self, ctx), fields(run_id = %ctx.run_id))]
	pub async fn run_scheduled_loop(&self, ctx: &JobContext, job_name: &str, lock_key: i64) -> Result<()> {
		let mut config = self.batch.clone().with_job_name(job_name);
		config.batch_id = None;

		let mut setting = self
			.read_setting()
			.await
			.unwrap_or_else(|| self.options.default_schedule.clone());
		let mut schedule = Schedule::parse(&setting);
		let mut next_run: DateTime<Utc> = Utc::now();

		let tick = self.options.tick;
		let mut ticker = tokio::time::interval_at(Instant::now() + tick, tick);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		info!(job = %job_name, lock_key, %schedule, tick_ms = tick.as_millis() as u64, "scheduler started");

		loop {
			tokio::select! {
				_ = ctx.cancellation_token.cancelled() => {
					info!(job = %job_name, "scheduler stopping");
					return Ok(());
				}
				_ = ticker.tick() => {}
			}

			if let Some(current) = self.read_setting().await {
				if current != setting {
					info!(from = %setting, to = %current, "schedule setting changed");
					setting = current;
					schedule = Schedule::parse(&setting);
					next_run = schedule.next_after(Utc::now());
				}
			}

			if Utc::now() < next_run {
				trace!(%next_run, "not due");
				continue;
			}

			self
				.run_cycle(&ctx.next_run(TriggerSource::Schedule), &config, lock_key)
				.await;

			next_run = schedule.next_after(Utc::now());
			debug!(%next_run, "next run scheduled");
		}
	}

	/// One strict-leader cycle. `None` when the lock could not be taken.
	pub async fn run_cycle(
		&self,
		ctx: &JobContext,
		config: &BatchConfig,
		lock_key: i64,
	) -> Option<BatchSummary> {
		let started_at = Utc::now();
		let outcome = self
			.orchestrator
			.leader()
			.run_exclusive(
				lock_key,
				LeaderMode::Strict,
				self.orchestrator.run_batch(ctx, config),
			)
			.await;

		match outcome {
			Err(e) => {
				let message = e.to_string();
				self
					.orchestrator
					.metrics()
					.record_job_run(&config.job_name, started_at, Some(&message));
				None
			}
			Ok(LeaderOutcome::Skipped) => None,
			Ok(LeaderOutcome::Ran(summary)) => {
				let record = ScheduledJobRecord::from_run(
					config.job_name.as_str(),
					started_at,
					summary.duration,
					summary.failure_message(),
				);
				if let Err(e) = self.orchestrator.storage().update_scheduled_job(&record).await {
					warn!(job = %config.job_name, error = %e, "update scheduled job failed");
				}
				Some(summary)
			}
		}
	}

	async fn read_setting(&self) -> Option<String> {
		match self
			.orchestrator
			.storage()
			.get_setting(&self.options.setting_name)
			.await
		{
			Ok(value) => value.filter(|v| !v.trim().is_empty()),
			Err(e) => {
				debug!(setting = %self.options.setting_name, error = %e, "read schedule setting failed");
				None
			}
		}
	}
}

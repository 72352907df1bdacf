// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch refresh orchestrator binary.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use refresh_config::{LogFormat, LoggingConfig, OrchestratorConfig};
use refresh_core::{SettingsStore, Storage};
use refresh_jobs::{
	summarize_progress, AlertSink, BatchConfig, BatchOrchestrator, JobContext, JobError, JobMetrics,
	NoopAlertSink, Schedule, Scheduler, SchedulerOptions, TriggerSource, UnitRegistry,
	WebhookAlerter,
};

mod http_refresher;

use http_refresher::{build_client, HttpRefresher};

/// Refresh orchestrator - leader-elected, resumable batch refresh of units.
#[derive(Parser, Debug)]
#[command(
	name = "refresh-orchestrator",
	about = "Leader-elected, resumable batch refresh of provider units",
	version
)]
struct Args {
	/// Path to a TOML configuration file (overrides the system config path)
	#[arg(long, global = true, env = "REFRESH_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Warm up, then run batches on the stored schedule until Ctrl-C
	Cron,
	/// Run a single batch; exits non-zero when any unit fails
	Batch {
		/// Reuse a batch id to resume an interrupted run
		#[arg(long)]
		batch_id: Option<String>,
	},
	/// Refresh one unit immediately, ignoring cache freshness
	Refresh { unit: String },
	/// Show per-status progress of a batch
	Progress { batch_id: String },
	/// Store a schedule override (seconds or a cron expression)
	SetSchedule { value: String },
	/// Run a single batch and print the Prometheus metrics
	Metrics,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
	let args = Args::parse();

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => refresh_config::load_config_with_file(path)?,
		None => refresh_config::load_config()?,
	};

	init_tracing(&config.logging);

	let storage = refresh_db::open_storage(&config.database.url)
		.await
		.context("open storage")?;

	let metrics = Arc::new(JobMetrics::new());
	let alerts: Arc<dyn AlertSink> = if config.alert.enabled {
		Arc::new(WebhookAlerter::new(&config.alert)?)
	} else {
		Arc::new(NoopAlertSink)
	};
	let registry = build_registry(&config, &storage)?;
	let orchestrator = Arc::new(
		BatchOrchestrator::new(Arc::new(registry), Arc::clone(&storage))
			.with_alerts(alerts)
			.with_metrics(metrics.clone()),
	);
	let batch = BatchConfig::from_settings(&config.batch, &config.alert);

	let cancel = CancellationToken::new();
	tokio::spawn({
		let cancel = cancel.clone();
		async move {
			if tokio::signal::ctrl_c().await.is_ok() {
				info!("Received shutdown signal, cancelling jobs");
				cancel.cancel();
			}
		}
	});

	match args.command {
		Command::Cron => {
			let scheduler = &config.scheduler;
			if scheduler.warmup_on_start {
				let ctx = JobContext::new(TriggerSource::Warmup, cancel.clone());
				let warmup = batch.clone().with_job_name(&scheduler.job_name);
				if orchestrator
					.run_warmup(&ctx, &warmup, scheduler.lock_key)
					.await?
					.is_none()
				{
					info!("another instance holds the lock, skipping warm-up");
				}
			}

			let ctx = JobContext::new(TriggerSource::Schedule, cancel);
			Scheduler::new(
				Arc::clone(&orchestrator),
				batch,
				SchedulerOptions::from_config(scheduler),
			)
			.run_scheduled_loop(&ctx, &scheduler.job_name, scheduler.lock_key)
			.await?;
			info!("Scheduler stopped");
		}
		Command::Batch { batch_id } => {
			let mut batch = batch;
			if batch_id.is_some() {
				batch.batch_id = batch_id;
			}
			let ctx = JobContext::new(TriggerSource::Manual, cancel);
			match orchestrator.run_batch_once(&ctx, &batch).await {
				Ok(summary) => {
					println!(
						"batch {} finished: {} units, {} refreshed, {} skipped",
						summary.batch_id,
						summary.total(),
						summary.success_count() - summary.skipped_count(),
						summary.skipped_count()
					);
				}
				Err(e @ JobError::BatchFailed { .. }) => {
					error!(error = %e, "batch failed");
					return Ok(ExitCode::FAILURE);
				}
				Err(e) => return Err(e.into()),
			}
		}
		Command::Refresh { unit } => {
			let ctx = JobContext::new(TriggerSource::Manual, cancel);
			let result = orchestrator.force_refresh_unit(&ctx, &batch, &unit).await?;
			match &result.error {
				None => println!("{unit}: refreshed after {} attempt(s)", result.attempts),
				Some(e) => {
					println!("{unit}: failed after {} attempt(s): {e}", result.attempts);
					return Ok(ExitCode::FAILURE);
				}
			}
		}
		Command::Progress { batch_id } => {
			let report = summarize_progress(storage.as_ref(), &batch_id).await?;
			if report.total == 0 {
				warn!(%batch_id, "no progress recorded for batch");
			}
			println!("{}", serde_json::to_string_pretty(&report)?);
		}
		Command::SetSchedule { value } => {
			let schedule = Schedule::try_parse(&value).map_err(anyhow::Error::msg)?;
			storage
				.set_setting(&config.scheduler.setting_name, value.trim())
				.await?;
			println!("{} = {} ({schedule})", config.scheduler.setting_name, value.trim());
		}
		Command::Metrics => {
			let ctx = JobContext::new(TriggerSource::Manual, cancel);
			let summary = orchestrator.run_batch(&ctx, &batch).await;
			info!(failed = summary.failed_count(), total = summary.total(), "batch finished");
			print!("{}", metrics.encode()?);
		}
	}

	Ok(ExitCode::SUCCESS)
}

fn init_tracing(logging: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
	let registry = tracing_subscriber::registry().with(filter);
	match logging.format {
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json())
			.init(),
		LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
	}
}

/// Register an [`HttpRefresher`] for every configured unit that has a url.
fn build_registry(
	config: &OrchestratorConfig,
	storage: &Arc<dyn Storage>,
) -> anyhow::Result<UnitRegistry> {
	let client = build_client(config.batch.unit_timeout()).context("build http client")?;

	let mut registry = UnitRegistry::new();
	for unit_config in &config.units {
		let Some(url) = unit_config.url.as_deref() else {
			warn!(unit = %unit_config.key, "unit has no url, not registered");
			continue;
		};
		let refresher = HttpRefresher::new(client.clone(), url, Arc::clone(storage));
		registry.register(unit_config.unit(), Arc::new(refresher))?;
	}

	if registry.is_empty() {
		warn!("no units registered; batches will be empty");
	} else {
		info!(units = registry.len(), "unit registry built");
	}
	Ok(registry)
}

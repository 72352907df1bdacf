// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};

/// Outcome label for per-unit counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
	Success,
	Failure,
	Skipped,
}

impl UnitOutcome {
	pub fn as_str(&self) -> &'static str {
		match self {
			UnitOutcome::Success => "success",
			UnitOutcome::Failure => "failure",
			UnitOutcome::Skipped => "skipped",
		}
	}
}

/// Receives job-level run records. Implementations must not block.
pub trait MetricsSink: Send + Sync {
	fn record_job_run(&self, job_name: &str, started_at: DateTime<Utc>, error: Option<&str>);

	fn record_unit_outcome(&self, _job_name: &str, _outcome: UnitOutcome) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
	fn record_job_run(&self, _job_name: &str, _started_at: DateTime<Utc>, _error: Option<&str>) {}
}

pub struct JobMetrics {
	registry: Registry,

	pub last_run_timestamp: GaugeVec,
	pub last_duration_seconds: GaugeVec,
	pub runs: CounterVec,
	pub failures: CounterVec,
	pub unit_refreshes: CounterVec,
}

impl Default for JobMetrics {
	fn default() -> Self {
		Self::new()
	}
}

impl JobMetrics {
	pub fn new() -> Self {
		let registry = Registry::new();

		let last_run_timestamp = GaugeVec::new(
			Opts::new(
				"refresh_job_last_run_timestamp_seconds",
				"Unix time the job last started",
			),
			&["job"],
		)
		.expect("valid metric descriptor");
		registry
			.register(Box::new(last_run_timestamp.clone()))
			.expect("metric registered once");

		let last_duration_seconds = GaugeVec::new(
			Opts::new(
				"refresh_job_last_duration_seconds",
				"Wall time of the most recent run",
			),
			&["job"],
		)
		.expect("valid metric descriptor");
		registry
			.register(Box::new(last_duration_seconds.clone()))
			.expect("metric registered once");

		let runs = CounterVec::new(
			Opts::new("refresh_job_runs_total", "Total job runs"),
			&["job"],
		)
		.expect("valid metric descriptor");
		registry
			.register(Box::new(runs.clone()))
			.expect("metric registered once");

		let failures = CounterVec::new(
			Opts::new("refresh_job_failures_total", "Total failed job runs"),
			&["job"],
		)
		.expect("valid metric descriptor");
		registry
			.register(Box::new(failures.clone()))
			.expect("metric registered once");

		let unit_refreshes = CounterVec::new(
			Opts::new("refresh_unit_refresh_total", "Unit refresh outcomes"),
			&["job", "outcome"],
		)
		.expect("valid metric descriptor");
		registry
			.register(Box::new(unit_refreshes.clone()))
			.expect("metric registered once");

		Self {
			registry,
			last_run_timestamp,
			last_duration_seconds,
			runs,
			failures,
			unit_refreshes,
		}
	}

	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	/// Prometheus text exposition of every metric.
	pub fn encode(&self) -> Result<String, prometheus::Error> {
		let encoder = TextEncoder::new();
		let mut buffer = Vec::new();
		encoder.encode(&self.registry.gather(), &mut buffer)?;
		Ok(String::from_utf8_lossy(&buffer).into_owned())
	}
}

impl MetricsSink for JobMetrics {
	fn record_job_run(&self, job_name: &str, started_at: DateTime<Utc>, error: Option<&str>) {
		let elapsed = (Utc::now() - started_at).num_milliseconds().max(0) as f64 / 1000.0;

		self
			.last_run_timestamp
			.with_label_values(&[job_name])
			.set(started_at.timestamp() as f64);
		self
			.last_duration_seconds
			.with_label_values(&[job_name])
			.set(elapsed);
		self.runs.with_label_values(&[job_name]).inc();
		if let Some(error) = error {
			tracing::debug!(job = %job_name, %error, "recording failed run");
			self.failures.with_label_values(&[job_name]).inc();
		}
	}

	fn record_unit_outcome(&self, job_name: &str, outcome: UnitOutcome) {
		self
			.unit_refreshes
			.with_label_values(&[job_name, outcome.as_str()])
			.inc();
	}
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch run identity and the transient per-run outcome types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identifies one orchestration cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRun {
	pub id: String,
	pub started_at: DateTime<Utc>,
}

impl BatchRun {
	/// Use the caller-supplied id when present so a restarted process can
	/// resume the same batch; otherwise derive one from the current time.
	pub fn new(id: Option<String>) -> Self {
		let started_at = Utc::now();
		let id = id
			.filter(|id| !id.trim().is_empty())
			.unwrap_or_else(|| Self::generate_id(started_at));
		Self { id, started_at }
	}

	pub fn generate_id(at: DateTime<Utc>) -> String {
		format!("batch_{}", at.timestamp())
	}
}

/// Outcome of one unit within one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitResult {
	pub unit_key: String,
	pub success: bool,
	pub skipped: bool,
	pub skip_reason: Option<String>,
	pub duration: Duration,
	pub attempts: u32,
	pub error: Option<String>,
}

impl UnitResult {
	/// Skipped units count as successes.
	pub fn skipped(unit_key: impl Into<String>, reason: impl Into<String>) -> Self {
		Self {
			unit_key: unit_key.into(),
			success: true,
			skipped: true,
			skip_reason: Some(reason.into()),
			duration: Duration::ZERO,
			attempts: 0,
			error: None,
		}
	}

	pub fn processed(
		unit_key: impl Into<String>,
		duration: Duration,
		attempts: u32,
		error: Option<String>,
	) -> Self {
		Self {
			unit_key: unit_key.into(),
			success: error.is_none(),
			skipped: false,
			skip_reason: None,
			duration,
			attempts,
			error,
		}
	}

	pub fn is_failure(&self) -> bool {
		!self.skipped && !self.success
	}
}

/// Failure detail carried by alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
	pub unit: String,
	pub error: String,
	pub attempts: u32,
}

/// Aggregated outcome of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
	pub job_name: String,
	pub batch_id: String,
	pub started_at: DateTime<Utc>,
	pub duration: Duration,
	pub results: Vec<UnitResult>,
}

impl BatchSummary {
	pub fn total(&self) -> usize {
		self.results.len()
	}

	pub fn skipped_count(&self) -> usize {
		self.results.iter().filter(|r| r.skipped).count()
	}

	/// Skipped units plus processed units that succeeded.
	pub fn success_count(&self) -> usize {
		self.results.iter().filter(|r| r.success).count()
	}

	pub fn failed_count(&self) -> usize {
		self.results.iter().filter(|r| r.is_failure()).count()
	}

	pub fn failures(&self) -> Vec<UnitFailure> {
		self
			.results
			.iter()
			.filter(|r| r.is_failure())
			.map(|r| UnitFailure {
				unit: r.unit_key.clone(),
				error: r.error.clone().unwrap_or_else(|| "unknown error".to_string()),
				attempts: r.attempts,
			})
			.collect()
	}

	/// The synthesized batch-level error, present iff at least one unit failed.
	pub fn failure_message(&self) -> Option<String> {
		let failed = self.failed_count();
		(failed > 0).then(|| format!("{}/{} units failed", failed, self.total()))
	}

	pub fn is_success(&self) -> bool {
		self.failed_count() == 0
	}
}

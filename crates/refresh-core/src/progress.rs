// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-(batch, unit) progress records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
	Pending,
	InProgress,
	Completed,
	Failed,
}

impl ProgressStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			ProgressStatus::Pending => "pending",
			ProgressStatus::InProgress => "in_progress",
			ProgressStatus::Completed => "completed",
			ProgressStatus::Failed => "failed",
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, ProgressStatus::Completed | ProgressStatus::Failed)
	}
}

impl fmt::Display for ProgressStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for ProgressStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"pending" => Ok(ProgressStatus::Pending),
			"in_progress" => Ok(ProgressStatus::InProgress),
			"completed" => Ok(ProgressStatus::Completed),
			"failed" => Ok(ProgressStatus::Failed),
			_ => Err(format!("unknown progress status: {s}")),
		}
	}
}

/// Status of one unit inside one batch run, keyed by `(batch_id, unit_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
	pub batch_id: String,
	pub unit_key: String,
	pub status: ProgressStatus,
	pub started_at: Option<DateTime<Utc>>,
	pub completed_at: Option<DateTime<Utc>>,
	pub retry_count: u32,
	pub error_message: Option<String>,
}

impl ProgressRecord {
	/// A freshly selected unit that no worker has claimed yet.
	pub fn pending(batch_id: impl Into<String>, unit_key: impl Into<String>) -> Self {
		Self {
			batch_id: batch_id.into(),
			unit_key: unit_key.into(),
			status: ProgressStatus::Pending,
			started_at: None,
			completed_at: None,
			retry_count: 0,
			error_message: None,
		}
	}

	pub fn in_progress(
		batch_id: impl Into<String>,
		unit_key: impl Into<String>,
		started_at: DateTime<Utc>,
	) -> Self {
		Self {
			status: ProgressStatus::InProgress,
			started_at: Some(started_at),
			..Self::pending(batch_id, unit_key)
		}
	}

	/// Terminal record written once the retry controller has finished with a unit.
	pub fn finished(
		batch_id: impl Into<String>,
		unit_key: impl Into<String>,
		started_at: DateTime<Utc>,
		retry_count: u32,
		error: Option<String>,
	) -> Self {
		let status = if error.is_none() {
			ProgressStatus::Completed
		} else {
			ProgressStatus::Failed
		};
		Self {
			batch_id: batch_id.into(),
			unit_key: unit_key.into(),
			status,
			started_at: Some(started_at),
			completed_at: Some(Utc::now()),
			retry_count,
			error_message: error,
		}
	}

	pub fn is_completed(&self) -> bool {
		self.status == ProgressStatus::Completed
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_roundtrip() {
		for status in [
			ProgressStatus::Pending,
			ProgressStatus::InProgress,
			ProgressStatus::Completed,
			ProgressStatus::Failed,
		] {
			assert_eq!(status.as_str().parse::<ProgressStatus>().unwrap(), status);
		}
	}

	#[test]
	fn test_terminal_statuses() {
		assert!(!ProgressStatus::Pending.is_terminal());
		assert!(!ProgressStatus::InProgress.is_terminal());
		assert!(ProgressStatus::Completed.is_terminal());
		assert!(ProgressStatus::Failed.is_terminal());
	}

	#[test]
	fn test_finished_status_follows_error() {
		let started = Utc::now();
		let ok = ProgressRecord::finished("b1", "kub", started, 1, None);
		assert_eq!(ok.status, ProgressStatus::Completed);
		assert!(ok.completed_at.is_some());

		let failed = ProgressRecord::finished("b1", "kub", started, 3, Some("boom".to_string()));
		assert_eq!(failed.status, ProgressStatus::Failed);
		assert_eq!(failed.retry_count, 3);
		assert_eq!(failed.error_message.as_deref(), Some("boom"));
	}

	#[test]
	fn test_in_progress_keeps_key() {
		let record = ProgressRecord::in_progress("b1", "nes", Utc::now());
		assert_eq!(record.batch_id, "b1");
		assert_eq!(record.unit_key, "nes");
		assert_eq!(record.status, ProgressStatus::InProgress);
		assert!(record.started_at.is_some());
	}
}

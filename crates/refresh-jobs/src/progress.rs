// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Best-effort progress tracking and batch progress reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{instrument, warn};

use refresh_core::{ProgressRecord, ProgressStatus, ProgressStore, StoreError, UnitFailure};

/// Writes progress records for one batch id.
///
/// Write failures are logged and swallowed: progress only exists to make a
/// crashed batch resumable.
pub struct ProgressTracker<P: ?Sized> {
	store: Arc<P>,
	batch_id: Arc<str>,
}

impl<P: ?Sized> Clone for ProgressTracker<P> {
	fn clone(&self) -> Self {
		Self {
			store: Arc::clone(&self.store),
			batch_id: Arc::clone(&self.batch_id),
		}
	}
}

impl<P: ProgressStore + ?Sized> ProgressTracker<P> {
	pub fn new(store: Arc<P>, batch_id: impl Into<Arc<str>>) -> Self {
		Self {
			store,
			batch_id: batch_id.into(),
		}
	}

	pub fn batch_id(&self) -> &str {
		&self.batch_id
	}

	/// Read failures count as "not completed" so the unit is processed.
	pub async fn is_completed(&self, unit_key: &str) -> bool {
		match self.store.get_progress(&self.batch_id, unit_key).await {
			Ok(record) => record.is_some_and(|r| r.is_completed()),
			Err(e) => {
				warn!(batch_id = %self.batch_id, unit = %unit_key, error = %e, "read progress failed");
				false
			}
		}
	}

	pub async fn mark_pending(&self, unit_key: &str) {
		self
			.save(ProgressRecord::pending(self.batch_id.as_ref(), unit_key))
			.await;
	}

	pub async fn mark_in_progress(&self, unit_key: &str, started_at: DateTime<Utc>) {
		self
			.save(ProgressRecord::in_progress(
				self.batch_id.as_ref(),
				unit_key,
				started_at,
			))
			.await;
	}

	pub async fn mark_finished(
		&self,
		unit_key: &str,
		started_at: DateTime<Utc>,
		attempts: u32,
		error: Option<String>,
	) {
		self
			.save(ProgressRecord::finished(
				self.batch_id.as_ref(),
				unit_key,
				started_at,
				attempts,
				error,
			))
			.await;
	}

	async fn save(&self, record: ProgressRecord) {
		if let Err(e) = self.store.save_progress(&record).await {
			warn!(
				batch_id = %record.batch_id,
				unit = %record.unit_key,
				status = %record.status,
				error = %e,
				"save progress failed"
			);
		}
	}
}

/// Per-status counts of a batch, reconstructed from the progress store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
	pub batch_id: String,
	pub total: usize,
	pub pending: usize,
	pub in_progress: usize,
	pub completed: usize,
	pub failed: usize,
	pub failures: Vec<UnitFailure>,
}

impl ProgressReport {
	pub fn is_finished(&self) -> bool {
		self.pending == 0 && self.in_progress == 0
	}
}

#[instrument(skip(store))]
pub async fn summarize_progress<P: ProgressStore + ?Sized>(
	store: &P,
	batch_id: &str,
) -> Result<ProgressReport, StoreError> {
	let records = store.list_progress(batch_id).await?;

	let mut report = ProgressReport {
		batch_id: batch_id.to_string(),
		total: records.len(),
		..Default::default()
	};
	for record in records {
		match record.status {
			ProgressStatus::Pending => report.pending += 1,
			ProgressStatus::InProgress => report.in_progress += 1,
			ProgressStatus::Completed => report.completed += 1,
			ProgressStatus::Failed => {
				report.failed += 1;
				report.failures.push(UnitFailure {
					unit: record.unit_key,
					error: record
						.error_message
						.unwrap_or_else(|| "unknown error".to_string()),
					attempts: record.retry_count,
				});
			}
		}
	}

	Ok(report)
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use refresh_core::LockError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single refresh attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnitError {
	/// Any error returned by the refresher. Retried.
	#[error("{0}")]
	Failed(String),

	/// The per-attempt deadline elapsed. Retried like `Failed`.
	#[error("timed out after {0:?}")]
	Timeout(Duration),

	/// The parent cancellation token fired. Never retried.
	#[error("cancelled")]
	Cancelled,
}

impl UnitError {
	pub fn is_cancelled(&self) -> bool {
		matches!(self, UnitError::Cancelled)
	}
}

#[derive(Debug, Error)]
pub enum JobError {
	#[error("{failed}/{total} units failed")]
	BatchFailed { failed: usize, total: usize },

	#[error("lock error: {0}")]
	Lock(#[from] LockError),

	#[error("unknown unit: {0}")]
	UnknownUnit(String),

	#[error("unit already registered: {0}")]
	DuplicateUnit(String),
}

pub type Result<T> = std::result::Result<T, JobError>;

/// Webhook delivery failure. Logged by the orchestrator, never escalated.
#[derive(Debug, Error)]
pub enum AlertError {
	#[error("webhook request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("webhook returned status {0}")]
	Status(u16),

	#[error("failed to encode alert payload: {0}")]
	Serialization(#[from] serde_json::Error),
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One row per named job, overwritten every cycle. Observability only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJobRecord {
	pub name: String,
	pub last_run_at: DateTime<Utc>,
	pub last_duration_ms: i64,
	pub last_success: bool,
	pub last_error: Option<String>,
}

impl ScheduledJobRecord {
	pub fn from_run(
		name: impl Into<String>,
		started_at: DateTime<Utc>,
		duration: Duration,
		error: Option<String>,
	) -> Self {
		Self {
			name: name.into(),
			last_run_at: started_at,
			last_duration_ms: duration.as_millis() as i64,
			last_success: error.is_none(),
			last_error: error,
		}
	}
}

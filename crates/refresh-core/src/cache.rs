// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Last successful refresh output of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
	pub unit_key: String,
	pub payload: Vec<u8>,
	pub fetched_at: DateTime<Utc>,
}

impl CacheRecord {
	pub fn new(unit_key: impl Into<String>, payload: Vec<u8>) -> Self {
		Self {
			unit_key: unit_key.into(),
			payload,
			fetched_at: Utc::now(),
		}
	}

	pub fn age(&self, now: DateTime<Utc>) -> Duration {
		now - self.fetched_at
	}
}

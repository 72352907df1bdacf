// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduler configuration section.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_JOB_NAME: &str = "refresh_units";
pub const DEFAULT_LOCK_KEY: i64 = 42;
pub const DEFAULT_SCHEDULE: &str = "300";
pub const DEFAULT_SETTING_NAME: &str = "refresh_interval_seconds";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfigLayer {
	pub job_name: Option<String>,
	pub lock_key: Option<i64>,
	pub schedule: Option<String>,
	pub setting_name: Option<String>,
	pub tick_secs: Option<u64>,
	pub warmup_on_start: Option<bool>,
}

impl SchedulerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.job_name.is_some() {
			self.job_name = other.job_name;
		}
		if other.lock_key.is_some() {
			self.lock_key = other.lock_key;
		}
		if other.schedule.is_some() {
			self.schedule = other.schedule;
		}
		if other.setting_name.is_some() {
			self.setting_name = other.setting_name;
		}
		if other.tick_secs.is_some() {
			self.tick_secs = other.tick_secs;
		}
		if other.warmup_on_start.is_some() {
			self.warmup_on_start = other.warmup_on_start;
		}
	}

	pub fn finalize(self) -> SchedulerConfig {
		SchedulerConfig {
			job_name: self.job_name.unwrap_or_else(|| DEFAULT_JOB_NAME.to_string()),
			lock_key: self.lock_key.unwrap_or(DEFAULT_LOCK_KEY),
			schedule: self.schedule.unwrap_or_else(|| DEFAULT_SCHEDULE.to_string()),
			setting_name: self
				.setting_name
				.unwrap_or_else(|| DEFAULT_SETTING_NAME.to_string()),
			tick_secs: self.tick_secs.unwrap_or(10),
			warmup_on_start: self.warmup_on_start.unwrap_or(true),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
	pub job_name: String,
	pub lock_key: i64,
	/// Fallback schedule used when the settings store has no value.
	pub schedule: String,
	pub setting_name: String,
	pub tick_secs: u64,
	pub warmup_on_start: bool,
}

impl SchedulerConfig {
	pub fn tick(&self) -> Duration {
		Duration::from_secs(self.tick_secs.max(1))
	}
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		SchedulerConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = SchedulerConfig::default();
		assert_eq!(config.job_name, "refresh_units");
		assert_eq!(config.lock_key, 42);
		assert_eq!(config.schedule, "300");
		assert_eq!(config.setting_name, "refresh_interval_seconds");
		assert_eq!(config.tick(), Duration::from_secs(10));
		assert!(config.warmup_on_start);
	}

	#[test]
	fn test_zero_tick_is_clamped() {
		let config = SchedulerConfigLayer {
			tick_secs: Some(0),
			..Default::default()
		}
		.finalize();
		assert_eq!(config.tick(), Duration::from_secs(1));
	}

	#[test]
	fn test_deserialize_cron_schedule() {
		let layer: SchedulerConfigLayer = toml::from_str(r#"schedule = "*/15 * * * *""#).unwrap();
		assert_eq!(layer.finalize().schedule, "*/15 * * * *");
	}
}

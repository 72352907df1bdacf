// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch orchestration configuration section.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MAX_CONCURRENCY: usize = 3;
const DEFAULT_UNIT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RETRY_ATTEMPTS: u32 = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
const DEFAULT_RATE_LIMIT_MS: u64 = 500;
const DEFAULT_CACHE_TTL_SECS: u64 = 86_400; // 24 hours

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchConfigLayer {
	pub max_concurrency: Option<usize>,
	pub unit_timeout_secs: Option<u64>,
	pub retry_attempts: Option<u32>,
	pub retry_delay_ms: Option<u64>,
	pub rate_limit_ms: Option<u64>,
	pub cache_ttl_secs: Option<u64>,
	pub resume_enabled: Option<bool>,
	pub batch_id: Option<String>,
}

impl BatchConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.max_concurrency.is_some() {
			self.max_concurrency = other.max_concurrency;
		}
		if other.unit_timeout_secs.is_some() {
			self.unit_timeout_secs = other.unit_timeout_secs;
		}
		if other.retry_attempts.is_some() {
			self.retry_attempts = other.retry_attempts;
		}
		if other.retry_delay_ms.is_some() {
			self.retry_delay_ms = other.retry_delay_ms;
		}
		if other.rate_limit_ms.is_some() {
			self.rate_limit_ms = other.rate_limit_ms;
		}
		if other.cache_ttl_secs.is_some() {
			self.cache_ttl_secs = other.cache_ttl_secs;
		}
		if other.resume_enabled.is_some() {
			self.resume_enabled = other.resume_enabled;
		}
		if other.batch_id.is_some() {
			self.batch_id = other.batch_id;
		}
	}

	pub fn finalize(self) -> BatchSettings {
		BatchSettings {
			max_concurrency: self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY),
			unit_timeout_secs: self.unit_timeout_secs.unwrap_or(DEFAULT_UNIT_TIMEOUT_SECS),
			retry_attempts: self.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS),
			retry_delay_ms: self.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
			rate_limit_ms: self.rate_limit_ms.unwrap_or(DEFAULT_RATE_LIMIT_MS),
			cache_ttl_secs: self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS),
			resume_enabled: self.resume_enabled.unwrap_or(true),
			batch_id: self.batch_id.filter(|id| !id.trim().is_empty()),
		}
	}
}

/// Resolved batch settings. Durations are kept as plain numbers so the
/// section round-trips through TOML; use the accessors for `Duration`s.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSettings {
	pub max_concurrency: usize,
	pub unit_timeout_secs: u64,
	pub retry_attempts: u32,
	pub retry_delay_ms: u64,
	pub rate_limit_ms: u64,
	pub cache_ttl_secs: u64,
	pub resume_enabled: bool,
	pub batch_id: Option<String>,
}

impl BatchSettings {
	pub fn unit_timeout(&self) -> Duration {
		Duration::from_secs(self.unit_timeout_secs)
	}

	pub fn retry_delay(&self) -> Duration {
		Duration::from_millis(self.retry_delay_ms)
	}

	pub fn rate_limit(&self) -> Duration {
		Duration::from_millis(self.rate_limit_ms)
	}

	pub fn cache_ttl(&self) -> Duration {
		Duration::from_secs(self.cache_ttl_secs)
	}
}

impl Default for BatchSettings {
	fn default() -> Self {
		BatchConfigLayer::default().finalize()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = BatchSettings::default();
		assert_eq!(config.max_concurrency, 3);
		assert_eq!(config.unit_timeout(), Duration::from_secs(60));
		assert_eq!(config.retry_attempts, 2);
		assert_eq!(config.retry_delay(), Duration::from_secs(5));
		assert_eq!(config.rate_limit(), Duration::from_millis(500));
		assert_eq!(config.cache_ttl(), Duration::from_secs(24 * 60 * 60));
		assert!(config.resume_enabled);
		assert!(config.batch_id.is_none());
	}

	#[test]
	fn test_blank_batch_id_is_dropped() {
		let layer = BatchConfigLayer {
			batch_id: Some("   ".to_string()),
			..Default::default()
		};
		assert!(layer.finalize().batch_id.is_none());
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = BatchConfigLayer {
			max_concurrency: Some(3),
			retry_attempts: Some(2),
			..Default::default()
		};
		base.merge(BatchConfigLayer {
			max_concurrency: Some(8),
			resume_enabled: Some(false),
			..Default::default()
		});
		assert_eq!(base.max_concurrency, Some(8));
		assert_eq!(base.retry_attempts, Some(2));
		assert_eq!(base.resume_enabled, Some(false));
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let layer: BatchConfigLayer = toml::from_str("cache_ttl_secs = 0\n").unwrap();
		assert_eq!(layer.cache_ttl_secs, Some(0));
		assert!(layer.max_concurrency.is_none());
		assert_eq!(layer.finalize().cache_ttl(), Duration::ZERO);
	}
}

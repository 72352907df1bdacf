// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use refresh_core::CacheStore;

/// Decides whether a unit's cached output is still fresh enough to skip.
pub struct FreshnessGate<C: ?Sized> {
	cache: Arc<C>,
	ttl: Duration,
}

impl<C: CacheStore + ?Sized> FreshnessGate<C> {
	/// A zero `ttl` disables the gate.
	pub fn new(cache: Arc<C>, ttl: Duration) -> Self {
		Self { cache, ttl }
	}

	/// `Some(reason)` when the unit was fetched less than `ttl` ago.
	///
	/// Lookup failures count as stale so the unit is refreshed.
	pub async fn check(&self, unit_key: &str, now: DateTime<Utc>) -> Option<String> {
		if self.ttl.is_zero() {
			return None;
		}

		let fetched_at = match self.cache.get_cache_timestamp(unit_key).await {
			Ok(Some(ts)) => ts,
			Ok(None) => return None,
			Err(e) => {
				warn!(unit = %unit_key, error = %e, "cache lookup failed, treating as stale");
				return None;
			}
		};

		let age = now - fetched_at;
		let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
		if age < ttl {
			debug!(unit = %unit_key, age_secs = age.num_seconds(), "cache fresh");
			Some(format!(
				"cache fresh: cached {}s ago, TTL {}s",
				age.num_seconds().max(0),
				self.ttl.as_secs()
			))
		} else {
			None
		}
	}
}

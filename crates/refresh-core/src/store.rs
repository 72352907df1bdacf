// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence collaborator traits consumed by the orchestrator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cache::CacheRecord;
use crate::error::{LockError, Result};
use crate::job::ScheduledJobRecord;
use crate::progress::ProgressRecord;

#[async_trait]
pub trait ProgressStore: Send + Sync {
	async fn get_progress(&self, batch_id: &str, unit_key: &str) -> Result<Option<ProgressRecord>>;

	/// Upsert on `(batch_id, unit_key)`.
	async fn save_progress(&self, record: &ProgressRecord) -> Result<()>;

	async fn list_progress(&self, batch_id: &str) -> Result<Vec<ProgressRecord>>;

	/// Units of a batch that are pending, in progress or failed.
	async fn list_unfinished(&self, batch_id: &str) -> Result<Vec<String>> {
		Ok(
			self
				.list_progress(batch_id)
				.await?
				.into_iter()
				.filter(|r| !r.is_completed())
				.map(|r| r.unit_key)
				.collect(),
		)
	}
}

#[async_trait]
pub trait CacheStore: Send + Sync {
	async fn get_cache(&self, unit_key: &str) -> Result<Option<CacheRecord>>;

	async fn save_cache(&self, record: &CacheRecord) -> Result<()>;

	async fn get_cache_timestamp(&self, unit_key: &str) -> Result<Option<DateTime<Utc>>> {
		Ok(self.get_cache(unit_key).await?.map(|r| r.fetched_at))
	}
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
	async fn get_setting(&self, key: &str) -> Result<Option<String>>;

	async fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}

#[async_trait]
pub trait ScheduledJobStore: Send + Sync {
	async fn update_scheduled_job(&self, record: &ScheduledJobRecord) -> Result<()>;

	async fn get_scheduled_job(&self, name: &str) -> Result<Option<ScheduledJobRecord>>;
}

/// A named, process-external mutual-exclusion primitive keyed by an integer.
#[async_trait]
pub trait LockBackend: Send + Sync {
	/// Non-blocking. `Ok(false)` means another holder has the lock.
	async fn try_acquire_lock(&self, key: i64) -> std::result::Result<bool, LockError>;

	/// Safe to call even if acquisition failed.
	async fn release_lock(&self, key: i64) -> std::result::Result<(), LockError>;

	/// Refresh a held lock so it is not mistaken for an abandoned one.
	/// `Ok(false)` means this holder no longer owns it. Backends whose locks
	/// never expire keep the default.
	async fn renew_lock(&self, _key: i64) -> std::result::Result<bool, LockError> {
		Ok(true)
	}
}

/// Every collaborator a storage driver provides.
pub trait Storage:
	ProgressStore + CacheStore + SettingsStore + ScheduledJobStore + LockBackend
{
}

impl<T> Storage for T where
	T: ProgressStore + CacheStore + SettingsStore + ScheduledJobStore + LockBackend
{
}

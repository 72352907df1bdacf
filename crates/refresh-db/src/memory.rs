// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-local storage driver.
//!
//! Clones share the same underlying state, so two clones behave like two
//! replicas pointed at one database.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use refresh_core::{
	CacheRecord, CacheStore, LockBackend, LockError, ProgressRecord, ProgressStore,
	ScheduledJobRecord, ScheduledJobStore, SettingsStore, StoreError,
};

#[derive(Default)]
struct Inner {
	progress: HashMap<(String, String), ProgressRecord>,
	cache: HashMap<String, CacheRecord>,
	settings: HashMap<String, String>,
	jobs: HashMap<String, ScheduledJobRecord>,
	locks: HashSet<i64>,
}

#[derive(Clone)]
pub struct MemoryStore {
	inner: Arc<RwLock<Inner>>,
	locks_supported: bool,
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryStore {
	pub fn new() -> Self {
		Self {
			inner: Arc::new(RwLock::new(Inner::default())),
			locks_supported: true,
		}
	}

	/// A store whose lock backend reports [`LockError::Unsupported`].
	pub fn without_lock_support() -> Self {
		Self {
			locks_supported: false,
			..Self::new()
		}
	}
}

#[async_trait]
impl ProgressStore for MemoryStore {
	async fn get_progress(
		&self,
		batch_id: &str,
		unit_key: &str,
	) -> Result<Option<ProgressRecord>, StoreError> {
		let inner = self.inner.read().await;
		Ok(
			inner
				.progress
				.get(&(batch_id.to_string(), unit_key.to_string()))
				.cloned(),
		)
	}

	async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StoreError> {
		let mut inner = self.inner.write().await;
		inner.progress.insert(
			(record.batch_id.clone(), record.unit_key.clone()),
			record.clone(),
		);
		Ok(())
	}

	async fn list_progress(&self, batch_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
		let inner = self.inner.read().await;
		let mut records: Vec<ProgressRecord> = inner
			.progress
			.values()
			.filter(|r| r.batch_id == batch_id)
			.cloned()
			.collect();
		records.sort_by(|a, b| a.unit_key.cmp(&b.unit_key));
		Ok(records)
	}
}

#[async_trait]
impl CacheStore for MemoryStore {
	async fn get_cache(&self, unit_key: &str) -> Result<Option<CacheRecord>, StoreError> {
		Ok(self.inner.read().await.cache.get(unit_key).cloned())
	}

	async fn save_cache(&self, record: &CacheRecord) -> Result<(), StoreError> {
		self
			.inner
			.write()
			.await
			.cache
			.insert(record.unit_key.clone(), record.clone());
		Ok(())
	}
}

#[async_trait]
impl SettingsStore for MemoryStore {
	async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.inner.read().await.settings.get(key).cloned())
	}

	async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self
			.inner
			.write()
			.await
			.settings
			.insert(key.to_string(), value.to_string());
		Ok(())
	}
}

#[async_trait]
impl ScheduledJobStore for MemoryStore {
	async fn update_scheduled_job(&self, record: &ScheduledJobRecord) -> Result<(), StoreError> {
		self
			.inner
			.write()
			.await
			.jobs
			.insert(record.name.clone(), record.clone());
		Ok(())
	}

	async fn get_scheduled_job(&self, name: &str) -> Result<Option<ScheduledJobRecord>, StoreError> {
		Ok(self.inner.read().await.jobs.get(name).cloned())
	}
}

#[async_trait]
impl LockBackend for MemoryStore {
	async fn try_acquire_lock(&self, key: i64) -> Result<bool, LockError> {
		if !self.locks_supported {
			return Err(LockError::Unsupported);
		}
		Ok(self.inner.write().await.locks.insert(key))
	}

	async fn release_lock(&self, key: i64) -> Result<(), LockError> {
		if !self.locks_supported {
			return Err(LockError::Unsupported);
		}
		self.inner.write().await.locks.remove(&key);
		Ok(())
	}
}

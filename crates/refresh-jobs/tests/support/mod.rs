// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use refresh_core::{
	CacheRecord, CacheStore, LockBackend, LockError, ProgressRecord, ProgressStore, ProviderUnit,
	ScheduledJobRecord, ScheduledJobStore, SettingsStore, UnitKind, UnitRefresher,
};
use refresh_db::MemoryStore;
use refresh_jobs::{
	AlertError, AlertSink, BatchAlert, BatchConfig, BatchOrchestrator, CancellationToken,
	UnitRegistry,
};

/// Refresher whose per-unit behaviour is configured up front.
#[derive(Default)]
pub struct ScriptedRefresher {
	always_fail: HashSet<String>,
	/// Calls that fail before the unit starts succeeding.
	fail_first: u32,
	work: Duration,
	calls: Mutex<HashMap<String, u32>>,
	order: Mutex<Vec<String>>,
	running: AtomicUsize,
	peak: AtomicUsize,
}

impl ScriptedRefresher {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn failing(mut self, keys: &[&str]) -> Self {
		self.always_fail = keys.iter().map(|k| k.to_string()).collect();
		self
	}

	pub fn fail_first(mut self, failures: u32) -> Self {
		self.fail_first = failures;
		self
	}

	pub fn taking(mut self, work: Duration) -> Self {
		self.work = work;
		self
	}

	pub fn calls(&self, key: &str) -> u32 {
		self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
	}

	pub fn total_calls(&self) -> u32 {
		self.calls.lock().unwrap().values().sum()
	}

	pub fn call_order(&self) -> Vec<String> {
		self.order.lock().unwrap().clone()
	}

	pub fn peak_concurrency(&self) -> usize {
		self.peak.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl UnitRefresher for ScriptedRefresher {
	async fn refresh(&self, unit: &ProviderUnit, cancel: &CancellationToken) -> anyhow::Result<()> {
		let call = {
			let mut calls = self.calls.lock().unwrap();
			let count = calls.entry(unit.key.clone()).or_insert(0);
			*count += 1;
			*count
		};
		self.order.lock().unwrap().push(unit.key.clone());

		let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
		self.peak.fetch_max(now_running, Ordering::SeqCst);
		if !self.work.is_zero() {
			tokio::select! {
				_ = cancel.cancelled() => {}
				_ = tokio::time::sleep(self.work) => {}
			}
		}
		self.running.fetch_sub(1, Ordering::SeqCst);

		if self.always_fail.contains(&unit.key) {
			anyhow::bail!("upstream returned 503 for {}", unit.key);
		}
		if call <= self.fail_first {
			anyhow::bail!("transient failure {call}");
		}
		Ok(())
	}
}

#[derive(Default)]
pub struct RecordingAlertSink {
	alerts: Mutex<Vec<BatchAlert>>,
}

impl RecordingAlertSink {
	pub fn alerts(&self) -> Vec<BatchAlert> {
		self.alerts.lock().unwrap().clone()
	}
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
	async fn send(&self, alert: &BatchAlert) -> Result<(), AlertError> {
		self.alerts.lock().unwrap().push(alert.clone());
		Ok(())
	}
}

/// In-memory store that counts progress writes and can script the lock.
#[derive(Default)]
pub struct CountingStore {
	inner: MemoryStore,
	progress_writes: AtomicUsize,
	lock_answer: Mutex<Option<Result<bool, LockError>>>,
}

impl CountingStore {
	pub fn with_lock_answer(answer: Result<bool, LockError>) -> Self {
		Self {
			lock_answer: Mutex::new(Some(answer)),
			..Default::default()
		}
	}

	pub fn progress_writes(&self) -> usize {
		self.progress_writes.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ProgressStore for CountingStore {
	async fn get_progress(
		&self,
		batch_id: &str,
		unit_key: &str,
	) -> refresh_core::Result<Option<ProgressRecord>> {
		self.inner.get_progress(batch_id, unit_key).await
	}

	async fn save_progress(&self, record: &ProgressRecord) -> refresh_core::Result<()> {
		self.progress_writes.fetch_add(1, Ordering::SeqCst);
		self.inner.save_progress(record).await
	}

	async fn list_progress(&self, batch_id: &str) -> refresh_core::Result<Vec<ProgressRecord>> {
		self.inner.list_progress(batch_id).await
	}
}

#[async_trait]
impl CacheStore for CountingStore {
	async fn get_cache(&self, unit_key: &str) -> refresh_core::Result<Option<CacheRecord>> {
		self.inner.get_cache(unit_key).await
	}

	async fn save_cache(&self, record: &CacheRecord) -> refresh_core::Result<()> {
		self.inner.save_cache(record).await
	}
}

#[async_trait]
impl SettingsStore for CountingStore {
	async fn get_setting(&self, key: &str) -> refresh_core::Result<Option<String>> {
		self.inner.get_setting(key).await
	}

	async fn set_setting(&self, key: &str, value: &str) -> refresh_core::Result<()> {
		self.inner.set_setting(key, value).await
	}
}

#[async_trait]
impl ScheduledJobStore for CountingStore {
	async fn update_scheduled_job(&self, record: &ScheduledJobRecord) -> refresh_core::Result<()> {
		self.inner.update_scheduled_job(record).await
	}

	async fn get_scheduled_job(&self, name: &str) -> refresh_core::Result<Option<ScheduledJobRecord>> {
		self.inner.get_scheduled_job(name).await
	}
}

#[async_trait]
impl LockBackend for CountingStore {
	async fn try_acquire_lock(&self, key: i64) -> Result<bool, LockError> {
		let answer = self.lock_answer.lock().unwrap().clone();
		match answer {
			Some(answer) => answer,
			None => self.inner.try_acquire_lock(key).await,
		}
	}

	async fn release_lock(&self, key: i64) -> Result<(), LockError> {
		self.inner.release_lock(key).await
	}
}

pub fn registry(keys: &[&str], refresher: Arc<ScriptedRefresher>) -> UnitRegistry {
	let mut registry = UnitRegistry::new();
	for key in keys {
		registry
			.register(ProviderUnit::new(*key, UnitKind::Generic), refresher.clone())
			.unwrap();
	}
	registry
}

pub fn orchestrator<S>(keys: &[&str], refresher: Arc<ScriptedRefresher>, store: Arc<S>) -> BatchOrchestrator
where
	S: refresh_core::Storage + 'static,
{
	BatchOrchestrator::new(Arc::new(registry(keys, refresher)), store)
}

/// Fast defaults: no rate limiting, 1ms retry delay, gate disabled.
pub fn fast_config() -> BatchConfig {
	BatchConfig {
		max_concurrency: 1,
		unit_timeout: Duration::from_secs(5),
		retry_attempts: 2,
		retry_delay: Duration::from_millis(1),
		rate_limit: Duration::ZERO,
		cache_ttl: Duration::ZERO,
		..BatchConfig::default()
	}
}

pub fn fresh_cache(key: &str, fetched_at: DateTime<Utc>) -> CacheRecord {
	let mut record = CacheRecord::new(key, b"{\"rate\":0.12}".to_vec());
	record.fetched_at = fetched_at;
	record
}

pub fn unit_keys(count: usize) -> Vec<String> {
	(0..count).map(|i| format!("unit-{i:02}")).collect()
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite implementation of the orchestrator's persistence collaborators.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::instrument;

use refresh_core::{
	CacheRecord, CacheStore, LockBackend, LockError, ProgressRecord, ProgressStatus, ProgressStore,
	ScheduledJobRecord, ScheduledJobStore, SettingsStore, StoreError,
};

use crate::error::DbError;

/// Locks not renewed within this window are treated as abandoned by a
/// crashed holder.
const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(6 * 60 * 60);

type ProgressRow = (
	String,
	String,
	String,
	Option<String>,
	Option<String>,
	i64,
	Option<String>,
);

#[derive(Clone)]
pub struct SqliteStore {
	pool: SqlitePool,
	holder_id: String,
	lock_ttl: Duration,
}

impl SqliteStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self {
			pool,
			holder_id: uuid::Uuid::new_v4().to_string(),
			lock_ttl: DEFAULT_LOCK_TTL,
		}
	}

	pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
		self.lock_ttl = ttl;
		self
	}

	pub fn holder_id(&self) -> &str {
		&self.holder_id
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}
}

fn format_ts(ts: DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(raw)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("invalid timestamp '{raw}': {e}")))
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
	raw.as_deref().map(parse_ts).transpose()
}

fn progress_from_row(row: ProgressRow) -> Result<ProgressRecord, DbError> {
	let (batch_id, unit_key, status, started_at, completed_at, retry_count, error_message) = row;
	Ok(ProgressRecord {
		batch_id,
		unit_key,
		status: status
			.parse::<ProgressStatus>()
			.map_err(DbError::Internal)?,
		started_at: parse_opt_ts(started_at)?,
		completed_at: parse_opt_ts(completed_at)?,
		retry_count: retry_count.max(0) as u32,
		error_message,
	})
}

#[async_trait]
impl ProgressStore for SqliteStore {
	#[instrument(skip(self))]
	async fn get_progress(
		&self,
		batch_id: &str,
		unit_key: &str,
	) -> Result<Option<ProgressRecord>, StoreError> {
		let row = sqlx::query_as::<_, ProgressRow>(
			r#"
			SELECT batch_id, unit_key, status, started_at, completed_at, retry_count, error_message
			FROM batch_progress
			WHERE batch_id = ? AND unit_key = ?
			"#,
		)
		.bind(batch_id)
		.bind(unit_key)
		.fetch_optional(&self.pool)
		.await
		.map_err(DbError::from)?;

		Ok(row.map(progress_from_row).transpose()?)
	}

	#[instrument(skip(self, record), fields(batch_id = %record.batch_id, unit = %record.unit_key, status = %record.status))]
	async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StoreError> {
		sqlx::query(
			r#"
			INSERT INTO batch_progress (batch_id, unit_key, status, started_at, completed_at, retry_count, error_message)
			VALUES (?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(batch_id, unit_key) DO UPDATE SET
				status = excluded.status,
				started_at = excluded.started_at,
				completed_at = excluded.completed_at,
				retry_count = excluded.retry_count,
				error_message = excluded.error_message
			"#,
		)
		.bind(&record.batch_id)
		.bind(&record.unit_key)
		.bind(record.status.as_str())
		.bind(record.started_at.map(format_ts))
		.bind(record.completed_at.map(format_ts))
		.bind(record.retry_count as i64)
		.bind(&record.error_message)
		.execute(&self.pool)
		.await
		.map_err(DbError::from)?;

		Ok(())
	}

	#[instrument(skip(self))]
	async fn list_progress(&self, batch_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
		let rows = sqlx::query_as::<_, ProgressRow>(
			r#"
			SELECT batch_id, unit_key, status, started_at, completed_at, retry_count, error_message
			FROM batch_progress
			WHERE batch_id = ?
			ORDER BY unit_key
			"#,
		)
		.bind(batch_id)
		.fetch_all(&self.pool)
		.await
		.map_err(DbError::from)?;

		Ok(
			rows
				.into_iter()
				.map(progress_from_row)
				.collect::<Result<Vec<_>, _>>()?,
		)
	}

	#[instrument(skip(self))]
	async fn list_unfinished(&self, batch_id: &str) -> Result<Vec<String>, StoreError> {
		let rows = sqlx::query_as::<_, (String,)>(
			r#"
			SELECT unit_key FROM batch_progress
			WHERE batch_id = ? AND status IN ('pending', 'in_progress', 'failed')
			ORDER BY unit_key
			"#,
		)
		.bind(batch_id)
		.fetch_all(&self.pool)
		.await
		.map_err(DbError::from)?;

		Ok(rows.into_iter().map(|(key,)| key).collect())
	}
}

#[async_trait]
impl CacheStore for SqliteStore {
	#[instrument(skip(self))]
	async fn get_cache(&self, unit_key: &str) -> Result<Option<CacheRecord>, StoreError> {
		let row = sqlx::query_as::<_, (String, Vec<u8>, String)>(
			"SELECT unit_key, payload, fetched_at FROM unit_cache WHERE unit_key = ?",
		)
		.bind(unit_key)
		.fetch_optional(&self.pool)
		.await
		.map_err(DbError::from)?;

		match row {
			Some((unit_key, payload, fetched_at)) => Ok(Some(CacheRecord {
				unit_key,
				payload,
				fetched_at: parse_ts(&fetched_at)?,
			})),
			None => Ok(None),
		}
	}

	#[instrument(skip(self, record), fields(unit = %record.unit_key, bytes = record.payload.len()))]
	async fn save_cache(&self, record: &CacheRecord) -> Result<(), StoreError> {
		sqlx::query(
			r#"
			INSERT INTO unit_cache (unit_key, payload, fetched_at)
			VALUES (?, ?, ?)
			ON CONFLICT(unit_key) DO UPDATE SET
				payload = excluded.payload,
				fetched_at = excluded.fetched_at
			"#,
		)
		.bind(&record.unit_key)
		.bind(&record.payload)
		.bind(format_ts(record.fetched_at))
		.execute(&self.pool)
		.await
		.map_err(DbError::from)?;

		Ok(())
	}

	#[instrument(skip(self))]
	async fn get_cache_timestamp(&self, unit_key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
		let row = sqlx::query_as::<_, (String,)>("SELECT fetched_at FROM unit_cache WHERE unit_key = ?")
			.bind(unit_key)
			.fetch_optional(&self.pool)
			.await
			.map_err(DbError::from)?;

		Ok(row.map(|(ts,)| parse_ts(&ts)).transpose()?)
	}
}

#[async_trait]
impl SettingsStore for SqliteStore {
	#[instrument(skip(self))]
	async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
		let row = sqlx::query_as::<_, (String,)>("SELECT value FROM settings WHERE key = ?")
			.bind(key)
			.fetch_optional(&self.pool)
			.await
			.map_err(DbError::from)?;

		Ok(row.map(|(value,)| value))
	}

	#[instrument(skip(self, value))]
	async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
		sqlx::query(
			r#"
			INSERT INTO settings (key, value, updated_at)
			VALUES (?, ?, ?)
			ON CONFLICT(key) DO UPDATE SET
				value = excluded.value,
				updated_at = excluded.updated_at
			"#,
		)
		.bind(key)
		.bind(value)
		.bind(format_ts(Utc::now()))
		.execute(&self.pool)
		.await
		.map_err(DbError::from)?;

		Ok(())
	}
}

#[async_trait]
impl ScheduledJobStore for SqliteStore {
	#[instrument(skip(self, record), fields(job = %record.name))]
	async fn update_scheduled_job(&self, record: &ScheduledJobRecord) -> Result<(), StoreError> {
		sqlx::query(
			r#"
			INSERT INTO scheduled_jobs (name, last_run_at, last_duration_ms, last_success, last_error)
			VALUES (?, ?, ?, ?, ?)
			ON CONFLICT(name) DO UPDATE SET
				last_run_at = excluded.last_run_at,
				last_duration_ms = excluded.last_duration_ms,
				last_success = excluded.last_success,
				last_error = excluded.last_error
			"#,
		)
		.bind(&record.name)
		.bind(format_ts(record.last_run_at))
		.bind(record.last_duration_ms)
		.bind(if record.last_success { 1_i64 } else { 0_i64 })
		.bind(&record.last_error)
		.execute(&self.pool)
		.await
		.map_err(DbError::from)?;

		Ok(())
	}

	#[instrument(skip(self))]
	async fn get_scheduled_job(&self, name: &str) -> Result<Option<ScheduledJobRecord>, StoreError> {
		let row = sqlx::query_as::<_, (String, String, i64, i64, Option<String>)>(
			"SELECT name, last_run_at, last_duration_ms, last_success, last_error FROM scheduled_jobs WHERE name = ?",
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await
		.map_err(DbError::from)?;

		match row {
			Some((name, last_run_at, last_duration_ms, last_success, last_error)) => {
				Ok(Some(ScheduledJobRecord {
					name,
					last_run_at: parse_ts(&last_run_at)?,
					last_duration_ms,
					last_success: last_success != 0,
					last_error,
				}))
			}
			None => Ok(None),
		}
	}
}

#[async_trait]
impl LockBackend for SqliteStore {
	#[instrument(skip(self), fields(holder = %self.holder_id))]
	async fn try_acquire_lock(&self, key: i64) -> Result<bool, LockError> {
		let now = Utc::now();
		let stale_before = now
			- chrono::Duration::from_std(self.lock_ttl)
				.map_err(|e| LockError::Backend(e.to_string()))?;

		let reaped = sqlx::query("DELETE FROM advisory_locks WHERE lock_key = ? AND acquired_at < ?")
			.bind(key)
			.bind(format_ts(stale_before))
			.execute(&self.pool)
			.await
			.map_err(DbError::from)?;
		if reaped.rows_affected() > 0 {
			tracing::warn!(lock_key = key, "reaped stale advisory lock");
		}

		let result = sqlx::query(
			"INSERT OR IGNORE INTO advisory_locks (lock_key, holder, acquired_at) VALUES (?, ?, ?)",
		)
		.bind(key)
		.bind(&self.holder_id)
		.bind(format_ts(now))
		.execute(&self.pool)
		.await
		.map_err(DbError::from)?;

		Ok(result.rows_affected() == 1)
	}

	#[instrument(skip(self), fields(holder = %self.holder_id))]
	async fn release_lock(&self, key: i64) -> Result<(), LockError> {
		sqlx::query("DELETE FROM advisory_locks WHERE lock_key = ? AND holder = ?")
			.bind(key)
			.bind(&self.holder_id)
			.execute(&self.pool)
			.await
			.map_err(DbError::from)?;

		Ok(())
	}

	#[instrument(skip(self), fields(holder = %self.holder_id))]
	async fn renew_lock(&self, key: i64) -> Result<bool, LockError> {
		let result =
			sqlx::query("UPDATE advisory_locks SET acquired_at = ? WHERE lock_key = ? AND holder = ?")
				.bind(format_ts(Utc::now()))
				.bind(key)
				.bind(&self.holder_id)
				.execute(&self.pool)
				.await
				.map_err(DbError::from)?;

		Ok(result.rows_affected() == 1)
	}
}

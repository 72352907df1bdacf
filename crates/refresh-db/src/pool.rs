// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;

use crate::error::DbError;

/// Create a SqlitePool with WAL mode and common settings.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./refresh.db")
///
/// # Errors
/// Returns `DbError::Internal` if the URL is invalid or connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.busy_timeout(Duration::from_secs(5))
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

const MIGRATIONS: &[&str] = &[
	r#"
	CREATE TABLE IF NOT EXISTS batch_progress (
		batch_id TEXT NOT NULL,
		unit_key TEXT NOT NULL,
		status TEXT NOT NULL,
		started_at TEXT,
		completed_at TEXT,
		retry_count INTEGER NOT NULL DEFAULT 0,
		error_message TEXT,
		PRIMARY KEY (batch_id, unit_key)
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS unit_cache (
		unit_key TEXT PRIMARY KEY,
		payload BLOB NOT NULL,
		fetched_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS settings (
		key TEXT PRIMARY KEY,
		value TEXT NOT NULL,
		updated_at TEXT NOT NULL
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS scheduled_jobs (
		name TEXT PRIMARY KEY,
		last_run_at TEXT NOT NULL,
		last_duration_ms INTEGER NOT NULL,
		last_success INTEGER NOT NULL,
		last_error TEXT
	)
	"#,
	r#"
	CREATE TABLE IF NOT EXISTS advisory_locks (
		lock_key INTEGER PRIMARY KEY,
		holder TEXT NOT NULL,
		acquired_at TEXT NOT NULL
	)
	"#,
];

/// Create every table the orchestrator reads or writes. Idempotent.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	for statement in MIGRATIONS {
		sqlx::query(statement).execute(pool).await?;
	}
	tracing::debug!(count = MIGRATIONS.len(), "migrations applied");
	Ok(())
}

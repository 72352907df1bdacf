// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage drivers for the batch refresh orchestrator.
//!
//! Two drivers implement every collaborator trait from `refresh-core`:
//!
//! - [`SqliteStore`]: `sqlx` SQLite pool; advisory locks are rows in a lock
//!   table, so replicas sharing one database file exclude each other
//! - [`MemoryStore`]: process-local state for single-instance deployments and tests

pub mod error;
pub mod memory;
pub mod pool;
pub mod sqlite;
pub mod testing;

use std::sync::Arc;

use refresh_core::Storage;

pub use error::{DbError, Result};
pub use memory::MemoryStore;
pub use pool::{create_pool, run_migrations};
pub use sqlite::SqliteStore;

/// Database URL that selects the in-memory driver.
pub const MEMORY_URL: &str = "memory";

/// Open the storage driver selected by `database_url`.
///
/// `"memory"` selects [`MemoryStore`]; anything else is treated as a SQLite
/// connection string. Migrations are applied before the store is returned.
#[tracing::instrument(skip(database_url))]
pub async fn open_storage(database_url: &str) -> Result<Arc<dyn Storage>> {
	if database_url == MEMORY_URL {
		tracing::info!("using in-memory storage driver");
		return Ok(Arc::new(MemoryStore::new()));
	}

	let pool = create_pool(database_url).await?;
	run_migrations(&pool).await?;
	tracing::info!("using sqlite storage driver");
	Ok(Arc::new(SqliteStore::new(pool)))
}

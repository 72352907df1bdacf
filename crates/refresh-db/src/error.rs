// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use refresh_core::{LockError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<DbError> for StoreError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::Sqlx(e) => StoreError::Database(e.to_string()),
			DbError::NotFound(what) => StoreError::NotFound(what),
			DbError::Internal(msg) => StoreError::Internal(msg),
			DbError::Serialization(e) => StoreError::Serialization(e),
		}
	}
}

impl From<DbError> for LockError {
	fn from(e: DbError) -> Self {
		LockError::Backend(e.to_string())
	}
}

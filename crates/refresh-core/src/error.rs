// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types shared by the storage collaborators.

use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by progress, cache, settings and job stores.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Database(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("internal error: {0}")]
	Internal(String),
}

/// Errors returned by an advisory lock backend.
///
/// A lock that is cleanly held by someone else is not an error; backends
/// report it as `Ok(false)` from [`crate::LockBackend::try_acquire_lock`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
	#[error("advisory locks are not supported by this backend")]
	Unsupported,

	#[error("lock backend error: {0}")]
	Backend(String),
}

impl From<StoreError> for LockError {
	fn from(e: StoreError) -> Self {
		LockError::Backend(e.to_string())
	}
}

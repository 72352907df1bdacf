// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

/// Failure to load or validate the orchestrator configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("cannot read orchestrator config {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("malformed orchestrator config {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// An environment override that does not parse, e.g. `REFRESH_BATCH_MAX_CONCURRENCY=abc`.
	#[error("invalid {key}: {message}")]
	InvalidValue { key: String, message: String },

	/// Cross-field problems such as duplicate unit keys.
	#[error("invalid configuration: {0}")]
	Validation(String),
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the batch refresh orchestrator.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`REFRESH_*`)
//!
//! # Usage
//!
//! ```ignore
//! use refresh_config::load_config;
//!
//! let config = load_config()?;
//! println!("{} units, concurrency {}", config.units.len(), config.batch.max_concurrency);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::OrchestratorConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, info};

/// Fully resolved orchestrator configuration.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
	pub batch: BatchSettings,
	pub alert: AlertConfig,
	pub scheduler: SchedulerConfig,
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub units: Vec<UnitConfig>,
}

impl OrchestratorConfig {
	pub fn unit(&self, key: &str) -> Option<&UnitConfig> {
		self.units.iter().find(|u| u.key == key)
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`REFRESH_*`)
/// 2. Config file (`/etc/refresh/orchestrator.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<OrchestratorConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<OrchestratorConfig, ConfigError> {
	let mut merged = OrchestratorConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<PathBuf>,
) -> Result<OrchestratorConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<OrchestratorConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = OrchestratorConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: OrchestratorConfigLayer) -> Result<OrchestratorConfig, ConfigError> {
	let batch = layer.batch.unwrap_or_default().finalize();
	let alert = layer.alert.unwrap_or_default().finalize();
	let scheduler = layer.scheduler.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let units = layer.units.unwrap_or_default();

	validate_units(&units)?;

	info!(
		units = units.len(),
		max_concurrency = batch.max_concurrency,
		retry_attempts = batch.retry_attempts,
		resume_enabled = batch.resume_enabled,
		alert_enabled = alert.enabled,
		webhook_type = %alert.webhook_type,
		job_name = %scheduler.job_name,
		lock_key = scheduler.lock_key,
		database = %database.url,
		"Orchestrator configuration loaded"
	);

	Ok(OrchestratorConfig {
		batch,
		alert,
		scheduler,
		database,
		logging,
		units,
	})
}

/// Unit keys must be non-empty and unique.
fn validate_units(units: &[UnitConfig]) -> Result<(), ConfigError> {
	let mut seen = HashSet::new();
	for unit in units {
		if unit.key.trim().is_empty() {
			return Err(ConfigError::Validation(
				"unit key must not be empty".to_string(),
			));
		}
		if !seen.insert(unit.key.as_str()) {
			return Err(ConfigError::Validation(format!(
				"duplicate unit key '{}'",
				unit.key
			)));
		}
	}
	Ok(())
}


#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn later_layer_wins(
			base in proptest::option::of(0usize..64),
			overlay in proptest::option::of(0usize..64),
		) {
			let mut merged = OrchestratorConfigLayer {
				batch: Some(BatchConfigLayer { max_concurrency: base, ..Default::default() }),
				..Default::default()
			};
			merged.merge(OrchestratorConfigLayer {
				batch: Some(BatchConfigLayer { max_concurrency: overlay, ..Default::default() }),
				..Default::default()
			});

			let config = finalize(merged).unwrap();
			prop_assert_eq!(config.batch.max_concurrency, overlay.or(base).unwrap_or(3));
		}

		#[test]
		fn distinct_keys_validate(keys in proptest::collection::hash_set("[a-z]{1,8}", 0..16)) {
			let units: Vec<UnitConfig> = keys
				.into_iter()
				.map(|key| UnitConfig { key, kind: Default::default(), url: None })
				.collect();
			prop_assert!(validate_units(&units).is_ok());
		}
	}
}

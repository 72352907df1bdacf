// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::OrchestratorConfigLayer;
use crate::sections::{
	AlertConfigLayer, BatchConfigLayer, DatabaseConfigLayer, LogFormat, LoggingConfigLayer,
	SchedulerConfigLayer, WebhookType,
};

/// Default location of the TOML config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/refresh/orchestrator.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<OrchestratorConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<OrchestratorConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(OrchestratorConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<OrchestratorConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(OrchestratorConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: OrchestratorConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: REFRESH_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<OrchestratorConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(OrchestratorConfigLayer {
			batch: Some(load_batch_from_env()?),
			alert: Some(load_alert_from_env()?),
			scheduler: Some(load_scheduler_from_env()?),
			database: Some(load_database_from_env()?),
			logging: Some(load_logging_from_env()?),
			units: None,
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	env_parse(name, "u32")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	env_parse(name, "u64")
}

fn env_i64(name: &str) -> Result<Option<i64>, ConfigError> {
	env_parse(name, "i64")
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	env_parse(name, "usize")
}

fn load_batch_from_env() -> Result<BatchConfigLayer, ConfigError> {
	Ok(BatchConfigLayer {
		max_concurrency: env_usize("REFRESH_BATCH_MAX_CONCURRENCY")?,
		unit_timeout_secs: env_u64("REFRESH_BATCH_UNIT_TIMEOUT_SECS")?,
		retry_attempts: env_u32("REFRESH_BATCH_RETRY_ATTEMPTS")?,
		retry_delay_ms: env_u64("REFRESH_BATCH_RETRY_DELAY_MS")?,
		rate_limit_ms: env_u64("REFRESH_BATCH_RATE_LIMIT_MS")?,
		cache_ttl_secs: env_u64("REFRESH_BATCH_CACHE_TTL_SECS")?,
		resume_enabled: env_bool("REFRESH_BATCH_RESUME_ENABLED"),
		batch_id: env_var("REFRESH_BATCH_ID"),
	})
}

fn load_alert_from_env() -> Result<AlertConfigLayer, ConfigError> {
	let webhook_type = env_var("REFRESH_ALERT_WEBHOOK_TYPE")
		.map(|v| {
			v.parse::<WebhookType>()
				.map_err(|message| ConfigError::InvalidValue {
					key: "REFRESH_ALERT_WEBHOOK_TYPE".to_string(),
					message,
				})
		})
		.transpose()?;

	Ok(AlertConfigLayer {
		webhook_url: env_var("REFRESH_ALERT_WEBHOOK_URL"),
		webhook_type,
		min_failures: env_usize("REFRESH_ALERT_MIN_FAILURES")?,
		timeout_secs: env_u64("REFRESH_ALERT_TIMEOUT_SECS")?,
	})
}

fn load_scheduler_from_env() -> Result<SchedulerConfigLayer, ConfigError> {
	Ok(SchedulerConfigLayer {
		job_name: env_var("REFRESH_SCHEDULER_JOB_NAME"),
		lock_key: env_i64("REFRESH_SCHEDULER_LOCK_KEY")?,
		schedule: env_var("REFRESH_SCHEDULER_SCHEDULE"),
		setting_name: env_var("REFRESH_SCHEDULER_SETTING_NAME"),
		tick_secs: env_u64("REFRESH_SCHEDULER_TICK_SECS")?,
		warmup_on_start: env_bool("REFRESH_SCHEDULER_WARMUP_ON_START"),
	})
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env_var("REFRESH_DATABASE_URL"),
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = env_var("REFRESH_LOG_FORMAT")
		.map(|v| {
			v.parse::<LogFormat>()
				.map_err(|message| ConfigError::InvalidValue {
					key: "REFRESH_LOG_FORMAT".to_string(),
					message,
				})
		})
		.transpose()?;

	Ok(LoggingConfigLayer {
		level: env_var("REFRESH_LOG_LEVEL"),
		format,
	})
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod alert;
mod batch;
mod database;
mod logging;
mod scheduler;
mod units;

pub use alert::{AlertConfig, AlertConfigLayer, WebhookType};
pub use batch::{BatchConfigLayer, BatchSettings};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use scheduler::{
	SchedulerConfig, SchedulerConfigLayer, DEFAULT_JOB_NAME, DEFAULT_LOCK_KEY, DEFAULT_SCHEDULE,
	DEFAULT_SETTING_NAME,
};
pub use units::UnitConfig;

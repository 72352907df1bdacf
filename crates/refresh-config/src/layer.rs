// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{
	AlertConfigLayer, BatchConfigLayer, DatabaseConfigLayer, LoggingConfigLayer,
	SchedulerConfigLayer, UnitConfig,
};

/// Partial configuration produced by one source. Later sources win field by field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrchestratorConfigLayer {
	#[serde(default)]
	pub batch: Option<BatchConfigLayer>,
	#[serde(default)]
	pub alert: Option<AlertConfigLayer>,
	#[serde(default)]
	pub scheduler: Option<SchedulerConfigLayer>,
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub units: Option<Vec<UnitConfig>>,
}

fn merge_section<T>(slot: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	let Some(incoming) = other else {
		return;
	};
	match slot {
		Some(existing) => merge(existing, incoming),
		None => *slot = Some(incoming),
	}
}

impl OrchestratorConfigLayer {
	pub fn merge(&mut self, other: OrchestratorConfigLayer) {
		merge_section(&mut self.batch, other.batch, BatchConfigLayer::merge);
		merge_section(&mut self.alert, other.alert, AlertConfigLayer::merge);
		merge_section(&mut self.scheduler, other.scheduler, SchedulerConfigLayer::merge);
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		// The unit list is replaced wholesale, never concatenated.
		if other.units.is_some() {
			self.units = other.units;
		}
	}
}

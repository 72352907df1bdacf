// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Explicitly constructed set of refreshable units.
//!
//! Built once at startup and injected into the orchestrator. Registration
//! order is the stable order in which a batch walks its units.

use std::sync::Arc;

use refresh_core::{ProviderUnit, UnitRefresher};

use crate::error::{JobError, Result};

#[derive(Clone)]
pub struct RegisteredUnit {
	pub unit: ProviderUnit,
	pub refresher: Arc<dyn UnitRefresher>,
}

impl RegisteredUnit {
	pub fn key(&self) -> &str {
		&self.unit.key
	}
}

#[derive(Clone, Default)]
pub struct UnitRegistry {
	units: Vec<RegisteredUnit>,
}

impl UnitRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, unit: ProviderUnit, refresher: Arc<dyn UnitRefresher>) -> Result<()> {
		if self.get(&unit.key).is_some() {
			return Err(JobError::DuplicateUnit(unit.key));
		}
		tracing::debug!(unit = %unit, "registered unit");
		self.units.push(RegisteredUnit { unit, refresher });
		Ok(())
	}

	/// Builder-style [`register`](Self::register).
	pub fn with_unit(mut self, unit: ProviderUnit, refresher: Arc<dyn UnitRefresher>) -> Result<Self> {
		self.register(unit, refresher)?;
		Ok(self)
	}

	pub fn get(&self, key: &str) -> Option<&RegisteredUnit> {
		self.units.iter().find(|u| u.key() == key)
	}

	pub fn iter(&self) -> impl Iterator<Item = &RegisteredUnit> {
		self.units.iter()
	}

	pub fn keys(&self) -> Vec<String> {
		self.units.iter().map(|u| u.unit.key.clone()).collect()
	}

	pub fn len(&self) -> usize {
		self.units.len()
	}

	pub fn is_empty(&self) -> bool {
		self.units.is_empty()
	}
}

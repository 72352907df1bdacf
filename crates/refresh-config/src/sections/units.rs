// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider unit declarations. TOML only; there is no environment mapping.

use refresh_core::{ProviderUnit, UnitKind};
use serde::{Deserialize, Serialize};

/// One `[[units]]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitConfig {
	pub key: String,
	#[serde(default)]
	pub kind: UnitKind,
	/// Endpoint fetched by the HTTP refresher.
	#[serde(default)]
	pub url: Option<String>,
}

impl UnitConfig {
	pub fn unit(&self) -> ProviderUnit {
		ProviderUnit::new(self.key.clone(), self.kind)
	}
}

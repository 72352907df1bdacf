// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provider unit types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The family a provider unit belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
	Electric,
	Water,
	Gas,
	#[default]
	Generic,
}

impl UnitKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			UnitKind::Electric => "electric",
			UnitKind::Water => "water",
			UnitKind::Gas => "gas",
			UnitKind::Generic => "generic",
		}
	}
}

impl fmt::Display for UnitKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for UnitKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"electric" => Ok(UnitKind::Electric),
			"water" => Ok(UnitKind::Water),
			"gas" => Ok(UnitKind::Gas),
			"generic" => Ok(UnitKind::Generic),
			_ => Err(format!("unknown unit kind: {s}")),
		}
	}
}

/// An opaque, independently refreshable work item.
///
/// Units are defined by external configuration and never mutated by the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderUnit {
	pub key: String,
	pub kind: UnitKind,
}

impl ProviderUnit {
	pub fn new(key: impl Into<String>, kind: UnitKind) -> Self {
		Self {
			key: key.into(),
			kind,
		}
	}
}

impl fmt::Display for ProviderUnit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.kind, self.key)
	}
}

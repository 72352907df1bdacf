// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Failure alert webhook configuration section.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Payload dialect the webhook endpoint expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookType {
	Slack,
	Discord,
	#[default]
	Generic,
}

impl WebhookType {
	pub fn as_str(&self) -> &'static str {
		match self {
			WebhookType::Slack => "slack",
			WebhookType::Discord => "discord",
			WebhookType::Generic => "generic",
		}
	}

	/// Infer the dialect from the webhook host.
	pub fn detect(url: &str) -> Self {
		if url.contains("slack.com") {
			WebhookType::Slack
		} else if url.contains("discord.com") {
			WebhookType::Discord
		} else {
			WebhookType::Generic
		}
	}
}

impl fmt::Display for WebhookType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for WebhookType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"slack" => Ok(WebhookType::Slack),
			"discord" => Ok(WebhookType::Discord),
			"generic" => Ok(WebhookType::Generic),
			_ => Err(format!("unknown webhook type: {s}")),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AlertConfigLayer {
	pub webhook_url: Option<String>,
	pub webhook_type: Option<WebhookType>,
	pub min_failures: Option<usize>,
	pub timeout_secs: Option<u64>,
}

impl AlertConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.webhook_url.is_some() {
			self.webhook_url = other.webhook_url;
		}
		if other.webhook_type.is_some() {
			self.webhook_type = other.webhook_type;
		}
		if other.min_failures.is_some() {
			self.min_failures = other.min_failures;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
	}

	pub fn finalize(self) -> AlertConfig {
		let webhook_url = self.webhook_url.filter(|u| !u.trim().is_empty());
		let webhook_type = self
			.webhook_type
			.or_else(|| webhook_url.as_deref().map(WebhookType::detect))
			.unwrap_or_default();
		AlertConfig {
			enabled: webhook_url.is_some(),
			webhook_url,
			webhook_type,
			min_failures: self.min_failures.unwrap_or(1),
			timeout_secs: self.timeout_secs.unwrap_or(10),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertConfig {
	/// True iff a webhook URL is configured.
	pub enabled: bool,
	pub webhook_url: Option<String>,
	pub webhook_type: WebhookType,
	pub min_failures: usize,
	pub timeout_secs: u64,
}

impl AlertConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}
}

impl Default for AlertConfig {
	fn default() -> Self {
		AlertConfigLayer::default().finalize()
	}
}

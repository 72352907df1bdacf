// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch failure alerts delivered to Slack, Discord or a generic webhook.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, instrument};

use refresh_config::{AlertConfig, WebhookType};
use refresh_core::{BatchSummary, UnitFailure};

use crate::error::AlertError;

const COLOR_RED: u32 = 16_711_680;
const COLOR_YELLOW: u32 = 16_776_960;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchAlert {
	pub job_name: String,
	pub total_count: usize,
	pub success_count: usize,
	pub failed_count: usize,
	pub duration: Duration,
	pub timestamp: DateTime<Utc>,
	pub failed_details: Vec<UnitFailure>,
}

impl BatchAlert {
	pub fn from_summary(summary: &BatchSummary) -> Self {
		Self {
			job_name: summary.job_name.clone(),
			total_count: summary.total(),
			success_count: summary.success_count(),
			failed_count: summary.failed_count(),
			duration: summary.duration,
			timestamp: summary.started_at,
			failed_details: summary.failures(),
		}
	}

	fn all_failed(&self) -> bool {
		self.failed_count == self.total_count
	}

	fn timestamp_rfc3339(&self) -> String {
		self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
	}
}

#[async_trait]
pub trait AlertSink: Send + Sync {
	fn is_enabled(&self) -> bool {
		true
	}

	async fn send(&self, alert: &BatchAlert) -> Result<(), AlertError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAlertSink;

#[async_trait]
impl AlertSink for NoopAlertSink {
	fn is_enabled(&self) -> bool {
		false
	}

	async fn send(&self, _alert: &BatchAlert) -> Result<(), AlertError> {
		Ok(())
	}
}

pub struct WebhookAlerter {
	client: reqwest::Client,
	config: AlertConfig,
}

impl WebhookAlerter {
	pub fn new(config: &AlertConfig) -> Result<Self, AlertError> {
		let client = reqwest::Client::builder()
			.timeout(config.timeout())
			.user_agent(concat!("refresh-orchestrator/", env!("CARGO_PKG_VERSION")))
			.build()?;
		Ok(Self {
			client,
			config: config.clone(),
		})
	}

	pub fn webhook_type(&self) -> WebhookType {
		self.config.webhook_type
	}
}

#[async_trait]
impl AlertSink for WebhookAlerter {
	fn is_enabled(&self) -> bool {
		self.config.enabled && self.config.webhook_url.is_some()
	}

	#[instrument(skip(self, alert), fields(job = %alert.job_name, failed = alert.failed_count))]
	async fn send(&self, alert: &BatchAlert) -> Result<(), AlertError> {
		let Some(url) = self.config.webhook_url.as_deref().filter(|_| self.config.enabled) else {
			return Ok(());
		};
		if alert.failed_count < self.config.min_failures {
			debug!(
				min_failures = self.config.min_failures,
				"failure count below alert threshold"
			);
			return Ok(());
		}

		let payload = build_payload(self.config.webhook_type, alert);
		let body = serde_json::to_vec(&payload)?;

		let response = self
			.client
			.post(url)
			.header("Content-Type", "application/json")
			.body(body)
			.send()
			.await?;

		let status = response.status();
		if status.as_u16() >= 400 {
			return Err(AlertError::Status(status.as_u16()));
		}

		info!(webhook_type = %self.config.webhook_type, "batch alert delivered");
		Ok(())
	}
}

pub fn build_payload(webhook_type: WebhookType, alert: &BatchAlert) -> Value {
	match webhook_type {
		WebhookType::Slack => slack_payload(alert),
		WebhookType::Discord => discord_payload(alert),
		WebhookType::Generic => generic_payload(alert),
	}
}

fn slack_payload(alert: &BatchAlert) -> Value {
	let emoji = if alert.all_failed() { ":x:" } else { ":warning:" };

	let mut blocks = vec![
		json!({
			"type": "header",
			"text": {
				"type": "plain_text",
				"text": format!("{emoji} Batch Job Alert: {}", alert.job_name),
			}
		}),
		json!({
			"type": "section",
			"fields": [
				{
					"type": "mrkdwn",
					"text": format!("*Status:*\n{}/{} failed", alert.failed_count, alert.total_count),
				},
				{
					"type": "mrkdwn",
					"text": format!("*Duration:*\n{}", format_duration(alert.duration)),
				},
				{
					"type": "mrkdwn",
					"text": format!("*Success:*\n{}", alert.success_count),
				},
				{
					"type": "mrkdwn",
					"text": format!("*Timestamp:*\n{}", alert.timestamp_rfc3339()),
				},
			]
		}),
	];

	if !alert.failed_details.is_empty() {
		let lines: Vec<String> = alert
			.failed_details
			.iter()
			.map(|f| format!("• *{}*: {} (attempts: {})", f.unit, f.error, f.attempts))
			.collect();
		blocks.push(json!({
			"type": "section",
			"text": {
				"type": "mrkdwn",
				"text": format!("*Failed Providers:*\n{}", lines.join("\n")),
			}
		}));
	}

	json!({ "blocks": blocks })
}

fn discord_payload(alert: &BatchAlert) -> Value {
	let color = if alert.all_failed() {
		COLOR_RED
	} else {
		COLOR_YELLOW
	};

	let mut fields = vec![
		json!({ "name": "Success", "value": alert.success_count.to_string(), "inline": true }),
		json!({ "name": "Failed", "value": alert.failed_count.to_string(), "inline": true }),
		json!({ "name": "Duration", "value": format_duration(alert.duration), "inline": true }),
	];

	if !alert.failed_details.is_empty() {
		let lines: Vec<String> = alert
			.failed_details
			.iter()
			.map(|f| format!("**{}**: {} (attempts: {})", f.unit, f.error, f.attempts))
			.collect();
		fields.push(json!({
			"name": "Failed units",
			"value": lines.join("\n"),
			"inline": false,
		}));
	}

	json!({
		"embeds": [{
			"title": format!("Batch Job Alert: {}", alert.job_name),
			"description": format!("{}/{} units failed", alert.failed_count, alert.total_count),
			"color": color,
			"fields": fields,
			"timestamp": alert.timestamp_rfc3339(),
		}]
	})
}

fn generic_payload(alert: &BatchAlert) -> Value {
	json!({
		"alert_type": "batch_job_failure",
		"job_name": alert.job_name,
		"total_count": alert.total_count,
		"success_count": alert.success_count,
		"failed_count": alert.failed_count,
		"duration_ms": alert.duration.as_millis() as u64,
		"timestamp": alert.timestamp_rfc3339(),
		"failed_details": alert.failed_details,
	})
}

fn format_duration(duration: Duration) -> String {
	let secs = duration.as_secs();
	if secs >= 60 {
		format!("{}m{}s", secs / 60, secs % 60)
	} else {
		format!("{:.1}s", duration.as_secs_f64())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use refresh_core::UnitResult;
	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio::net::TcpListener;

	fn alert(failed: usize, total: usize) -> BatchAlert {
		BatchAlert {
			job_name: "refresh_units".to_string(),
			total_count: total,
			success_count: total - failed,
			failed_count: failed,
			duration: Duration::from_secs(95),
			timestamp: Utc.with_ymd_and_hms(2026, 1, 19, 10, 30, 0).unwrap(),
			failed_details: (0..failed)
				.map(|i| UnitFailure {
					unit: format!("unit-{i}"),
					error: "HTTP 503".to_string(),
					attempts: 3,
				})
				.collect(),
		}
	}

	fn config(url: Option<String>, webhook_type: WebhookType, min_failures: usize) -> AlertConfig {
		AlertConfig {
			enabled: url.is_some(),
			webhook_url: url,
			webhook_type,
			min_failures,
			timeout_secs: 5,
		}
	}

	#[test]
	fn test_alert_from_summary_uses_batch_start() {
		let started_at = Utc.with_ymd_and_hms(2026, 1, 19, 2, 0, 0).unwrap();
		let summary = BatchSummary {
			job_name: "refresh_units".to_string(),
			batch_id: "batch_1768788000".to_string(),
			started_at,
			duration: Duration::from_secs(42),
			results: vec![
				UnitResult::processed("kub", Duration::from_secs(1), 1, None),
				UnitResult::processed("pln", Duration::from_secs(3), 3, Some("HTTP 503".to_string())),
				UnitResult::skipped("ens", "cache fresh"),
			],
		};

		let alert = BatchAlert::from_summary(&summary);

		assert_eq!(alert.timestamp, started_at);
		assert_eq!(alert.total_count, 3);
		assert_eq!(alert.success_count, 2);
		assert_eq!(alert.failed_count, 1);
		assert_eq!(alert.failed_details[0].unit, "pln");
		assert_eq!(build_payload(WebhookType::Generic, &alert)["timestamp"], "2026-01-19T02:00:00Z");
	}

	#[test]
	fn test_slack_payload() {
		let payload = build_payload(WebhookType::Slack, &alert(2, 10));
		let blocks = payload["blocks"].as_array().unwrap();

		assert_eq!(
			blocks[0]["text"]["text"],
			":warning: Batch Job Alert: refresh_units"
		);
		assert_eq!(blocks[1]["fields"][0]["text"], "*Status:*\n2/10 failed");
		assert_eq!(blocks[1]["fields"][1]["text"], "*Duration:*\n1m35s");
		assert_eq!(
			blocks[1]["fields"][3]["text"],
			"*Timestamp:*\n2026-01-19T10:30:00Z"
		);
		assert_eq!(
			blocks[2]["text"]["text"],
			"*Failed Providers:*\n• *unit-0*: HTTP 503 (attempts: 3)\n• *unit-1*: HTTP 503 (attempts: 3)"
		);

		let all_failed = build_payload(WebhookType::Slack, &alert(3, 3));
		assert_eq!(
			all_failed["blocks"][0]["text"]["text"],
			":x: Batch Job Alert: refresh_units"
		);
	}

	#[test]
	fn test_discord_payload() {
		let payload = build_payload(WebhookType::Discord, &alert(1, 4));
		let embed = &payload["embeds"][0];

		assert_eq!(embed["title"], "Batch Job Alert: refresh_units");
		assert_eq!(embed["description"], "1/4 units failed");
		assert_eq!(embed["color"], COLOR_YELLOW);
		assert_eq!(embed["fields"][0]["value"], "3");
		assert_eq!(embed["fields"][3]["name"], "Failed units");
		assert_eq!(embed["fields"][3]["inline"], false);

		let all_failed = build_payload(WebhookType::Discord, &alert(4, 4));
		assert_eq!(all_failed["embeds"][0]["color"], COLOR_RED);
	}

	#[test]
	fn test_generic_payload() {
		let payload = build_payload(WebhookType::Generic, &alert(3, 10));

		assert_eq!(payload["alert_type"], "batch_job_failure");
		assert_eq!(payload["total_count"], 10);
		assert_eq!(payload["success_count"], 7);
		assert_eq!(payload["failed_count"], 3);
		assert_eq!(payload["duration_ms"], 95_000);
		assert_eq!(payload["failed_details"].as_array().unwrap().len(), 3);
		assert_eq!(payload["failed_details"][0]["unit"], "unit-0");
	}

	#[tokio::test]
	async fn test_disabled_and_below_threshold_send_nothing() {
		let disabled = WebhookAlerter::new(&config(None, WebhookType::Generic, 1)).unwrap();
		assert!(!disabled.is_enabled());
		disabled.send(&alert(5, 5)).await.unwrap();

		// Unroutable address: any attempted request would fail.
		let gated = WebhookAlerter::new(&config(
			Some("http://127.0.0.1:9/hook".to_string()),
			WebhookType::Generic,
			3,
		))
		.unwrap();
		assert!(gated.is_enabled());
		gated.send(&alert(2, 5)).await.unwrap();
	}

	/// Accepts one request, returns its body and answers with `status`.
	async fn one_shot_server(status: u16) -> (String, tokio::task::JoinHandle<String>) {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let url = format!("http://{}/hook", listener.local_addr().unwrap());

		let handle = tokio::spawn(async move {
			let (mut socket, _) = listener.accept().await.unwrap();
			let mut buf = Vec::new();
			let mut chunk = [0u8; 4096];
			let body = loop {
				let n = socket.read(&mut chunk).await.unwrap();
				buf.extend_from_slice(&chunk[..n]);
				let text = String::from_utf8_lossy(&buf).to_string();
				if let Some(split) = text.find("\r\n\r\n") {
					let length = text[..split]
						.lines()
						.find_map(|l| {
							let (name, value) = l.split_once(':')?;
							name.eq_ignore_ascii_case("content-length")
								.then(|| value.trim().parse::<usize>().ok())
								.flatten()
						})
						.unwrap_or(0);
					if buf.len() >= split + 4 + length || n == 0 {
						break text[split + 4..].to_string();
					}
				}
				if n == 0 {
					break String::new();
				}
			};
			let response = format!("HTTP/1.1 {status} Status\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
			socket.write_all(response.as_bytes()).await.unwrap();
			body
		});

		(url, handle)
	}

	#[tokio::test]
	async fn test_delivers_json_payload() {
		let (url, server) = one_shot_server(200).await;
		let alerter = WebhookAlerter::new(&config(Some(url), WebhookType::Generic, 1)).unwrap();

		alerter.send(&alert(3, 10)).await.unwrap();

		let body: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
		assert_eq!(body["failed_count"], 3);
		assert_eq!(body["total_count"], 10);
	}

	#[tokio::test]
	async fn test_error_status_is_reported() {
		let (url, server) = one_shot_server(500).await;
		let alerter = WebhookAlerter::new(&config(Some(url), WebhookType::Slack, 1)).unwrap();

		let err = alerter.send(&alert(1, 2)).await.unwrap_err();
		assert!(matches!(err, AlertError::Status(500)));
		server.await.unwrap();
	}
}

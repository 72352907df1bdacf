// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use refresh_core::{CacheRecord, CacheStore, ProviderUnit, UnitRefresher};

const USER_AGENT: &str = concat!("refresh-orchestrator/", env!("CARGO_PKG_VERSION"));

pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
	reqwest::Client::builder()
		.timeout(timeout)
		.user_agent(USER_AGENT)
		.build()
}

/// Fetches a unit's upstream document and stores the body as its cache entry.
pub struct HttpRefresher<C: ?Sized> {
	client: reqwest::Client,
	url: String,
	cache: Arc<C>,
}

impl<C: CacheStore + ?Sized> HttpRefresher<C> {
	pub fn new(client: reqwest::Client, url: impl Into<String>, cache: Arc<C>) -> Self {
		Self {
			client,
			url: url.into(),
			cache,
		}
	}

	async fn fetch(&self) -> anyhow::Result<Vec<u8>> {
		let response = self
			.client
			.get(&self.url)
			.send()
			.await
			.with_context(|| format!("GET {}", self.url))?;

		let status = response.status();
		if !status.is_success() {
			anyhow::bail!("GET {} returned HTTP {}", self.url, status.as_u16());
		}

		let body = response.bytes().await.context("read response body")?;
		Ok(body.to_vec())
	}
}

#[async_trait]
impl<C: CacheStore + ?Sized + 'static> UnitRefresher for HttpRefresher<C> {
	async fn refresh(&self, unit: &ProviderUnit, cancel: &CancellationToken) -> anyhow::Result<()> {
		let payload = tokio::select! {
			_ = cancel.cancelled() => anyhow::bail!("refresh of {} cancelled", unit.key),
			result = self.fetch() => result?,
		};

		let bytes = payload.len();
		self
			.cache
			.save_cache(&CacheRecord::new(unit.key.clone(), payload))
			.await
			.context("save cache entry")?;

		debug!(unit = %unit.key, bytes, "cache entry stored");
		Ok(())
	}
}

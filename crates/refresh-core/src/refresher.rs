// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::unit::ProviderUnit;

/// Performs the actual fetch, parse and persist for one unit.
///
/// Implementations own the unit's cache record: a successful refresh is
/// expected to update it. The token is cancelled when the batch is cancelled;
/// per-attempt deadlines are enforced by the caller.
#[async_trait]
pub trait UnitRefresher: Send + Sync {
	async fn refresh(&self, unit: &ProviderUnit, cancel: &CancellationToken) -> anyhow::Result<()>;
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the batch refresh orchestrator.
//!
//! This crate holds the data model shared by the storage drivers, the
//! orchestrator and the binary:
//!
//! - [`ProviderUnit`]: one independently refreshable external data source
//! - [`ProgressRecord`]: per-(batch, unit) status used to resume crashed runs
//! - [`CacheRecord`]: the last successful refresh output of a unit
//! - [`ScheduledJobRecord`]: last-run observability row for a named job
//! - [`UnitResult`] / [`BatchSummary`]: transient per-run outcomes
//!
//! It also defines the collaborator traits the orchestrator consumes
//! ([`ProgressStore`], [`CacheStore`], [`SettingsStore`], [`ScheduledJobStore`],
//! [`LockBackend`], [`UnitRefresher`]).

pub mod batch;
pub mod cache;
pub mod error;
pub mod job;
pub mod progress;
pub mod refresher;
pub mod store;
pub mod unit;

pub use batch::{BatchRun, BatchSummary, UnitFailure, UnitResult};
pub use cache::CacheRecord;
pub use error::{LockError, Result, StoreError};
pub use job::ScheduledJobRecord;
pub use progress::{ProgressRecord, ProgressStatus};
pub use refresher::UnitRefresher;
pub use store::{CacheStore, LockBackend, ProgressStore, ScheduledJobStore, SettingsStore, Storage};
pub use unit::{ProviderUnit, UnitKind};

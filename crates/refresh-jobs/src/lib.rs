// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Leader-elected, resumable batch refresh of independently refreshable units.
//!
//! A [`Scheduler`] wakes on a short tick, re-reads its schedule setting and,
//! when a run is due, takes the advisory lock through the
//! [`LeaderCoordinator`] and hands the batch to the [`BatchOrchestrator`].
//! The orchestrator filters fresh and already-completed units, dispatches the
//! rest through the bounded worker [`pool`], wraps each unit in the
//! [`retry`] controller and records progress, metrics and alerts.

pub mod alert;
pub mod batch;
pub mod context;
pub mod error;
pub mod freshness;
pub mod leader;
pub mod metrics;
pub mod pool;
pub mod progress;
pub mod registry;
pub mod retry;
pub mod schedule;
pub mod scheduler;

pub use alert::{build_payload, AlertSink, BatchAlert, NoopAlertSink, WebhookAlerter};
pub use batch::{BatchConfig, BatchOrchestrator, DEFAULT_BATCH_JOB_NAME};
pub use context::{CancellationToken, JobContext, TriggerSource};
pub use error::{AlertError, JobError, Result, UnitError};
pub use freshness::FreshnessGate;
pub use leader::{LeaderCoordinator, LeaderMode, LeaderOutcome, DEFAULT_RENEW_INTERVAL};
pub use metrics::{JobMetrics, MetricsSink, NoopMetrics, UnitOutcome};
pub use pool::{DispatchPolicy, Dispatched};
pub use progress::{summarize_progress, ProgressReport, ProgressTracker};
pub use registry::{RegisteredUnit, UnitRegistry};
pub use retry::{RetryOutcome, RetryPolicy};
pub use schedule::{Schedule, DEFAULT_INTERVAL};
pub use scheduler::{Scheduler, SchedulerOptions};

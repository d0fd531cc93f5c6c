// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Health aggregation: service state merged with a fresh telemetry pull.

use crate::{Lifecycle, ServiceState};
use resource_monitor::{TelemetryProbe, TelemetryReport, PROBE_ACCELERATOR};
use std::sync::Arc;

/// Immutable health observation, built fresh for every query.
///
/// Fields whose probe failed are absent rather than zero.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HealthSnapshot {
    /// `"healthy"` unless every telemetry probe failed.
    pub status: &'static str,
    /// Service lifecycle.
    pub lifecycle: Lifecycle,
    /// Configured device descriptor.
    pub device: String,
    /// Whether an accelerator was detected. Absent when that probe failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_available: Option<bool>,
    /// Accelerator name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_name: Option<String>,
    /// Accelerator memory in use, GB rounded to 2 decimals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_memory_used: Option<f64>,
    /// Accelerator memory capacity, GB rounded to 2 decimals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpu_memory_total: Option<f64>,
    /// Host CPU utilisation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f32>,
    /// Host memory utilisation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_percent: Option<f32>,
    /// Whether the model is loaded.
    pub model_loaded: bool,
    /// Seconds since start, rounded to 2 decimals.
    pub uptime_seconds: f64,
    /// Probes that failed for this snapshot.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<&'static str>,
}

impl HealthSnapshot {
    /// Builds a snapshot from state and an already captured report.
    pub fn from_parts(state: &ServiceState, report: TelemetryReport) -> Self {
        let all_failed = report.all_failed();
        let accelerator_failed = report.failed_probes.contains(&PROBE_ACCELERATOR);
        let accelerator = report.accelerator;
        Self {
            status: if all_failed { "unhealthy" } else { "healthy" },
            lifecycle: state.lifecycle(),
            device: state.device().to_string(),
            gpu_available: (!accelerator_failed).then_some(accelerator.is_some()),
            gpu_memory_used: accelerator.as_ref().map(|a| round2(a.memory_used_gb())),
            gpu_memory_total: accelerator.as_ref().map(|a| round2(a.memory_total_gb())),
            gpu_name: accelerator.map(|a| a.name),
            cpu_percent: report.cpu_percent,
            memory_percent: report.memory_percent,
            model_loaded: state.model_loaded(),
            uptime_seconds: round2(state.uptime().as_secs_f64()),
            degraded: report.failed_probes,
        }
    }

    /// Whether no telemetry could be collected at all.
    pub fn all_probes_failed(&self) -> bool {
        self.status == "unhealthy"
    }
}

/// Builds [`HealthSnapshot`]s on demand.
#[derive(Clone)]
pub struct HealthAggregator {
    state: Arc<ServiceState>,
    probe: Arc<dyn TelemetryProbe>,
}

impl HealthAggregator {
    /// Creates an aggregator reading from `probe`.
    pub fn new(state: Arc<ServiceState>, probe: Arc<dyn TelemetryProbe>) -> Self {
        Self { state, probe }
    }

    /// Takes a snapshot on the calling thread. Always succeeds, even when a
    /// probe panics.
    ///
    /// CPU sampling sleeps for the probe's interval, so async callers
    /// should prefer [`snapshot_async`](Self::snapshot_async).
    pub fn snapshot(&self) -> HealthSnapshot {
        let report = TelemetryReport::capture(self.probe.as_ref());
        HealthSnapshot::from_parts(&self.state, report)
    }

    /// Takes a snapshot on a blocking thread.
    pub async fn snapshot_async(&self) -> HealthSnapshot {
        let probe = Arc::clone(&self.probe);
        let report = tokio::task::spawn_blocking(move || TelemetryReport::capture(probe.as_ref()))
            .await
            .unwrap_or_else(|e| {
                tracing::error!("telemetry capture aborted: {e}");
                TelemetryReport::unavailable()
            });
        HealthSnapshot::from_parts(&self.state, report)
    }

    /// The shared service state.
    pub fn state(&self) -> &Arc<ServiceState> {
        &self.state
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

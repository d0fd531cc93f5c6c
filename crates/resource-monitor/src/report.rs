// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Point-in-time telemetry report with per-field degradation.

use crate::{AcceleratorInfo, MonitorError, TelemetryProbe};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{SystemTime, UNIX_EPOCH};

/// Names of the probes, as recorded in [`TelemetryReport::failed_probes`].
pub const PROBE_CPU: &str = "cpu";
pub const PROBE_MEMORY: &str = "memory";
pub const PROBE_ACCELERATOR: &str = "accelerator";

const PROBE_COUNT: usize = 3;

/// One reading of every probe.
///
/// A probe that fails leaves its field `None` and is listed in
/// `failed_probes`; the report itself is always produced.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TelemetryReport {
    /// Host CPU utilisation in percent.
    pub cpu_percent: Option<f32>,
    /// Host memory utilisation in percent.
    pub memory_percent: Option<f32>,
    /// Detected accelerator, if any.
    pub accelerator: Option<AcceleratorInfo>,
    /// Probes that returned an error during this capture.
    pub failed_probes: Vec<&'static str>,
    /// Unix timestamp in milliseconds when the report was taken.
    pub timestamp_ms: u64,
}

impl TelemetryReport {
    /// Queries every probe method once.
    ///
    /// A probe that returns an error or panics only loses its own field.
    pub fn capture(probe: &dyn TelemetryProbe) -> Self {
        let mut failed_probes = Vec::new();

        let cpu_percent = read_probe(PROBE_CPU, &mut failed_probes, || probe.cpu_percent());
        let memory_percent =
            read_probe(PROBE_MEMORY, &mut failed_probes, || probe.memory_percent());
        let accelerator =
            read_probe(PROBE_ACCELERATOR, &mut failed_probes, || probe.accelerator()).flatten();

        Self {
            cpu_percent,
            memory_percent,
            accelerator,
            failed_probes,
            timestamp_ms: now_ms(),
        }
    }

    /// A report in which every probe is marked failed.
    ///
    /// Used when the capture itself could not run to completion.
    pub fn unavailable() -> Self {
        Self {
            cpu_percent: None,
            memory_percent: None,
            accelerator: None,
            failed_probes: vec![PROBE_CPU, PROBE_MEMORY, PROBE_ACCELERATOR],
            timestamp_ms: now_ms(),
        }
    }

    /// `true` when every probe failed during this capture.
    pub fn all_failed(&self) -> bool {
        self.failed_probes.len() == PROBE_COUNT
    }

    /// Returns a one-line summary for logs and the CLI.
    ///
    /// # Example output
    /// ```text
    /// Telemetry: CPU 12.5%, Mem 41.0%, Accelerator none
    /// ```
    pub fn summary(&self) -> String {
        let pct = |v: Option<f32>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}%"));
        let accel = match &self.accelerator {
            Some(a) => format!(
                "{} ({:.2}/{:.2} GB)",
                a.name,
                a.memory_used_gb(),
                a.memory_total_gb()
            ),
            None if self.failed_probes.contains(&PROBE_ACCELERATOR) => "n/a".to_string(),
            None => "none".to_string(),
        };
        format!(
            "Telemetry: CPU {}, Mem {}, Accelerator {accel}",
            pct(self.cpu_percent),
            pct(self.memory_percent),
        )
    }
}

/// Runs one probe method, recording `name` in `failed` on error or panic.
fn read_probe<T>(
    name: &'static str,
    failed: &mut Vec<&'static str>,
    read: impl FnOnce() -> Result<T, MonitorError>,
) -> Option<T> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(read)).unwrap_or_else(|payload| {
        Err(MonitorError::ProbeFailed {
            probe: name,
            detail: format!("panicked: {}", panic_message(payload.as_ref())),
        })
    });
    match outcome {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{name} telemetry unavailable: {e}");
            failed.push(name);
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

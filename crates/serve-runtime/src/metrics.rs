// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Plain-text metrics exposition.
//!
//! Output is one `name value` or `name{label="x"} value` line per metric,
//! in a fixed order. Health fields whose probe failed are left out.
//!
//! ```text
//! model_loaded{version="1.0.0"} 1
//! gpu_available 0
//! cpu_usage_percent 12.5
//! memory_usage_percent 41
//! uptime_seconds 73.20
//! inference_requests_total 18
//! ...
//! ```

use crate::{DispatchCounters, HealthSnapshot};
use std::fmt::Display;

/// Renders snapshots into the text format served at `/metrics`.
#[derive(Debug, Clone)]
pub struct MetricsExporter {
    version: String,
}

impl MetricsExporter {
    /// Creates an exporter that labels `model_loaded` with `version`.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    /// Model version used in labels.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Renders one exposition from a health snapshot and dispatcher counters.
    pub fn render(&self, health: &HealthSnapshot, counters: &DispatchCounters) -> String {
        let mut out = MetricLines::default();

        out.labelled(
            "model_loaded",
            "version",
            &self.version,
            u8::from(health.model_loaded),
        );

        if let Some(used) = health.gpu_memory_used {
            out.line("gpu_memory_used_gb", format!("{used:.2}"));
        }
        if let Some(total) = health.gpu_memory_total {
            out.line("gpu_memory_total_gb", format!("{total:.2}"));
        }
        if let Some(available) = health.gpu_available {
            out.line("gpu_available", u8::from(available));
        }

        if let Some(cpu) = health.cpu_percent {
            out.line("cpu_usage_percent", cpu);
        }
        if let Some(mem) = health.memory_percent {
            out.line("memory_usage_percent", mem);
        }
        out.line("uptime_seconds", format!("{:.2}", health.uptime_seconds));

        out.line("inference_requests_total", counters.requests_total);
        out.line("inference_batches_total", counters.batches_total);
        out.line("inference_rows_total", counters.rows_total);
        out.line("inference_failures_total", counters.failures_total);
        out.line("inference_rejected_total", counters.rejected_total);
        out.line(
            "inference_processing_seconds_total",
            format!("{:.6}", counters.processing_seconds_total),
        );
        out.line("inference_in_flight", counters.in_flight);
        out.line("inference_queued", counters.queued);

        out.finish()
    }
}

/// Append-only line buffer.
#[derive(Default)]
struct MetricLines {
    buf: String,
}

impl MetricLines {
    fn line(&mut self, name: &str, value: impl Display) {
        self.buf.push_str(&format!("{name} {value}\n"));
    }

    fn labelled(&mut self, name: &str, key: &str, label: &str, value: impl Display) {
        let label = label.replace('\\', "\\\\").replace('"', "\\\"");
        self.buf.push_str(&format!("{name}{{{key}=\"{label}\"}} {value}\n"));
    }

    fn finish(self) -> String {
        self.buf
    }
}

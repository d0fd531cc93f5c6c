// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for resource monitoring.

/// Errors that can occur when reading system telemetry.
///
/// None of these are fatal to a caller: [`crate::TelemetryReport::capture`]
/// turns each failure into an absent field.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Failed to read a sysfs or procfs file.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse a numeric value from a system file.
    #[error("failed to parse value from {path}: {detail}")]
    ParseError { path: String, detail: String },

    /// The expected procfs/sysfs path does not exist on this host.
    #[error("telemetry source not available: {path}")]
    NotAvailable { path: String },

    /// A probe implementation failed for a reason of its own.
    #[error("probe '{probe}' failed: {detail}")]
    ProbeFailed { probe: &'static str, detail: String },
}

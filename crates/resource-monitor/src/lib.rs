// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # resource-monitor
//!
//! Host telemetry for the inference server's health and metrics endpoints.
//!
//! # Monitored Metrics
//! - **CPU utilisation**: busy share between two `/proc/stat` samples.
//! - **Memory utilisation**: `MemTotal - MemAvailable` from `/proc/meminfo`.
//! - **Accelerator memory**: VRAM counters from `/sys/class/drm`.
//!
//! # Graceful Degradation
//! Each source is read through the [`TelemetryProbe`] trait and captured
//! independently by [`TelemetryReport::capture`]. A source that is missing
//! or unreadable (containers, non-Linux hosts) leaves its field absent
//! instead of failing the whole report.
//!
//! # Example
//! ```no_run
//! use resource_monitor::{SystemProbe, TelemetryReport};
//!
//! let report = TelemetryReport::capture(&SystemProbe::default());
//! println!("{}", report.summary());
//! ```

mod accelerator;
mod cpu;
mod error;
mod memory;
mod probe;
mod report;
pub(crate) mod sysfs;

pub use accelerator::AcceleratorInfo;
pub use cpu::{measure_cpu_percent, CpuTimes};
pub use error::MonitorError;
pub use memory::MemoryInfo;
pub use probe::{SystemProbe, TelemetryProbe};
pub use report::{TelemetryReport, PROBE_ACCELERATOR, PROBE_CPU, PROBE_MEMORY};

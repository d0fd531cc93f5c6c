// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The telemetry capability consumed by the serving core.
//!
//! The health aggregator never reads `/proc` directly. It is handed a
//! [`TelemetryProbe`], which lets tests and non-Linux hosts inject their own
//! readings (or failures).

use crate::accelerator::DRM_PATH;
use crate::cpu::{measure_cpu_percent, STAT_PATH};
use crate::memory::MEMINFO_PATH;
use crate::{AcceleratorInfo, MemoryInfo, MonitorError};
use std::path::PathBuf;
use std::time::Duration;

/// A source of system telemetry.
///
/// Each method is independent: one failing must not stop the others from
/// being queried. Implementations may block (CPU sampling sleeps for its
/// interval), so async callers should run them on a blocking thread.
pub trait TelemetryProbe: Send + Sync {
    /// Host CPU utilisation in percent.
    fn cpu_percent(&self) -> Result<f32, MonitorError>;

    /// Host memory utilisation in percent.
    fn memory_percent(&self) -> Result<f32, MonitorError>;

    /// The accelerator, if one is present. `Ok(None)` means "no device".
    fn accelerator(&self) -> Result<Option<AcceleratorInfo>, MonitorError>;
}

/// Reads telemetry from Linux procfs and DRM sysfs.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    cpu_interval: Duration,
    stat_path: PathBuf,
    meminfo_path: PathBuf,
    drm_path: PathBuf,
}

impl SystemProbe {
    /// Creates a probe that samples CPU usage over `cpu_interval`.
    pub fn new(cpu_interval: Duration) -> Self {
        Self {
            cpu_interval,
            stat_path: PathBuf::from(STAT_PATH),
            meminfo_path: PathBuf::from(MEMINFO_PATH),
            drm_path: PathBuf::from(DRM_PATH),
        }
    }

    /// Overrides the filesystem roots (used to point the probe at fixtures).
    pub fn with_paths(mut self, stat: PathBuf, meminfo: PathBuf, drm: PathBuf) -> Self {
        self.stat_path = stat;
        self.meminfo_path = meminfo;
        self.drm_path = drm;
        self
    }

    /// The CPU sampling interval.
    pub fn cpu_interval(&self) -> Duration {
        self.cpu_interval
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl TelemetryProbe for SystemProbe {
    fn cpu_percent(&self) -> Result<f32, MonitorError> {
        measure_cpu_percent(&self.stat_path, self.cpu_interval)
    }

    fn memory_percent(&self) -> Result<f32, MonitorError> {
        MemoryInfo::read_from(&self.meminfo_path).map(|m| m.percent_used())
    }

    fn accelerator(&self) -> Result<Option<AcceleratorInfo>, MonitorError> {
        AcceleratorInfo::detect_in(&self.drm_path)
    }
}

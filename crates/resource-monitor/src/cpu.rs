// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! CPU utilisation from `/proc/stat`.
//!
//! The aggregate `cpu` line holds cumulative jiffies per state since boot.
//! Utilisation over an interval is the busy share of the delta between two
//! samples:
//!
//! ```text
//! cpu  user nice system idle iowait irq softirq steal guest guest_nice
//! ```
//!
//! `guest` and `guest_nice` are already folded into `user`/`nice` by the
//! kernel and are not counted again.

use crate::MonitorError;
use std::path::Path;
use std::time::Duration;

/// Default path to the kernel CPU statistics file.
pub(crate) const STAT_PATH: &str = "/proc/stat";

/// Cumulative CPU time counters from one read of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    /// Jiffies spent in any non-idle state.
    pub busy: u64,
    /// Jiffies across all states.
    pub total: u64,
}

impl CpuTimes {
    /// Reads the aggregate counters from `path`.
    pub fn read_from(path: &Path) -> Result<Self, MonitorError> {
        let content = std::fs::read_to_string(path).map_err(|e| MonitorError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Parses the aggregate `cpu` line of a `/proc/stat`-formatted string.
    pub(crate) fn parse(content: &str, source_path: &Path) -> Result<Self, MonitorError> {
        let line = content
            .lines()
            .find(|l| l.split_whitespace().next() == Some("cpu"))
            .ok_or_else(|| MonitorError::ParseError {
                path: source_path.display().to_string(),
                detail: "aggregate 'cpu' line not found".to_string(),
            })?;

        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .take(8)
            .map(|f| {
                f.parse::<u64>().map_err(|_| MonitorError::ParseError {
                    path: source_path.display().to_string(),
                    detail: format!("expected jiffies counter, got '{f}'"),
                })
            })
            .collect::<Result<_, _>>()?;

        if fields.len() < 4 {
            return Err(MonitorError::ParseError {
                path: source_path.display().to_string(),
                detail: format!("expected at least 4 counters, got {}", fields.len()),
            });
        }

        let total: u64 = fields.iter().sum();
        // idle + iowait
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);

        Ok(Self {
            busy: total.saturating_sub(idle),
            total,
        })
    }

    /// Busy percentage between an earlier sample and this one, in `[0, 100]`.
    ///
    /// Returns `0.0` if no time elapsed between the samples.
    pub fn percent_since(&self, earlier: &CpuTimes) -> f32 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0.0;
        }
        let busy = self.busy.saturating_sub(earlier.busy);
        ((busy as f64 / total as f64) * 100.0).clamp(0.0, 100.0) as f32
    }
}

/// Measures CPU utilisation over `interval` by sampling `path` twice.
///
/// Blocks the calling thread for `interval`.
pub fn measure_cpu_percent(path: &Path, interval: Duration) -> Result<f32, MonitorError> {
    let first = CpuTimes::read_from(path)?;
    std::thread::sleep(interval);
    let second = CpuTimes::read_from(path)?;
    Ok(second.percent_since(&first))
}

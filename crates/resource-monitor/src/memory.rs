// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! System memory pressure via `/proc/meminfo`.
//!
//! "Used" is `MemTotal - MemAvailable`, matching what process monitors
//! report as memory utilisation.

use crate::MonitorError;
use std::path::Path;

/// Default path to the kernel memory info file.
pub(crate) const MEMINFO_PATH: &str = "/proc/meminfo";

/// System memory state.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MemoryInfo {
    /// Total physical memory in bytes.
    pub total_bytes: u64,
    /// Memory the kernel reports as available for new allocations, in bytes.
    pub available_bytes: u64,
    /// `total - available`, in bytes.
    pub used_bytes: u64,
}

impl MemoryInfo {
    /// Reads current memory information from `/proc/meminfo`.
    pub fn read() -> Result<Self, MonitorError> {
        Self::read_from(Path::new(MEMINFO_PATH))
    }

    /// Reads memory information from a specific file.
    pub fn read_from(path: &Path) -> Result<Self, MonitorError> {
        let content = std::fs::read_to_string(path).map_err(|e| MonitorError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parses the content of a `/proc/meminfo`-formatted string.
    pub(crate) fn parse(content: &str, source_path: &Path) -> Result<Self, MonitorError> {
        let mut total_kb: Option<u64> = None;
        let mut available_kb: Option<u64> = None;

        for line in content.lines() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            match key {
                "MemTotal:" => total_kb = Some(parse_kb_value(value, source_path)?),
                "MemAvailable:" => available_kb = Some(parse_kb_value(value, source_path)?),
                _ => {}
            }
            if total_kb.is_some() && available_kb.is_some() {
                break;
            }
        }

        let missing = |field: &str| MonitorError::ParseError {
            path: source_path.display().to_string(),
            detail: format!("{field} not found"),
        };
        let total_bytes = total_kb.ok_or_else(|| missing("MemTotal"))? * 1024;
        let available_bytes = available_kb.ok_or_else(|| missing("MemAvailable"))? * 1024;

        Ok(Self {
            total_bytes,
            available_bytes,
            used_bytes: total_bytes.saturating_sub(available_bytes),
        })
    }

    /// Memory utilisation as a percentage in `[0, 100]`.
    pub fn percent_used(&self) -> f32 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 / self.total_bytes as f64 * 100.0) as f32
    }

    /// Returns total memory in megabytes.
    pub fn total_mb(&self) -> u64 {
        self.total_bytes / (1024 * 1024)
    }

    /// Returns available memory in megabytes.
    pub fn available_mb(&self) -> u64 {
        self.available_bytes / (1024 * 1024)
    }
}

/// Parses a numeric string from `/proc/meminfo` (values are in kB).
fn parse_kb_value(s: &str, source_path: &Path) -> Result<u64, MonitorError> {
    s.parse::<u64>().map_err(|_| MonitorError::ParseError {
        path: source_path.display().to_string(),
        detail: format!("expected integer kB value, got '{s}'"),
    })
}

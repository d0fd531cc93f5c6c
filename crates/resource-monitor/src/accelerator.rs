// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Accelerator memory via the DRM sysfs interface.
//!
//! Drivers that expose dedicated VRAM (amdgpu, some xe/i915 builds) publish
//! it under `/sys/class/drm/card<N>/device/`:
//! - `mem_info_vram_total`: total VRAM in bytes.
//! - `mem_info_vram_used`: VRAM currently allocated, in bytes.
//! - `product_name`: marketing name (optional).
//!
//! The first card exposing both memory files is reported. A host with no
//! such card has no accelerator, which is not an error.

use crate::sysfs::{read_sysfs_file, read_u64};
use crate::MonitorError;
use std::path::{Path, PathBuf};

/// Default DRM class directory.
pub(crate) const DRM_PATH: &str = "/sys/class/drm";

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// A detected accelerator and its memory usage.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AcceleratorInfo {
    /// Human-readable device name.
    pub name: String,
    /// Allocated device memory in bytes.
    pub memory_used_bytes: u64,
    /// Total device memory in bytes.
    pub memory_total_bytes: u64,
}

impl AcceleratorInfo {
    /// Scans `/sys/class/drm` for the first card reporting VRAM.
    pub fn detect() -> Result<Option<Self>, MonitorError> {
        Self::detect_in(Path::new(DRM_PATH))
    }

    /// Scans a DRM class directory for the first card reporting VRAM.
    ///
    /// Returns `Ok(None)` when the directory is missing or no card exposes
    /// memory counters, and an error when a card exposes them but they
    /// cannot be read.
    pub fn detect_in(drm_root: &Path) -> Result<Option<Self>, MonitorError> {
        let entries = match std::fs::read_dir(drm_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(MonitorError::ReadError {
                    path: drm_root.display().to_string(),
                    source: e,
                })
            }
        };

        let mut cards: Vec<(String, PathBuf)> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                is_card_node(&name).then(|| (name, e.path()))
            })
            .collect();
        cards.sort();

        for (card, path) in cards {
            let device = path.join("device");
            let total_path = device.join("mem_info_vram_total");
            if !total_path.exists() {
                continue;
            }
            let memory_total_bytes = read_u64(&total_path)?;
            let memory_used_bytes = read_u64(&device.join("mem_info_vram_used"))?;
            let name = read_sysfs_file(&device.join("product_name"))
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(card);

            return Ok(Some(Self {
                name,
                memory_used_bytes,
                memory_total_bytes,
            }));
        }

        Ok(None)
    }

    /// Allocated memory in GiB.
    pub fn memory_used_gb(&self) -> f64 {
        self.memory_used_bytes as f64 / BYTES_PER_GB
    }

    /// Total memory in GiB.
    pub fn memory_total_gb(&self) -> f64 {
        self.memory_total_bytes as f64 / BYTES_PER_GB
    }
}

/// `card0`, `card1`, … but not connector nodes such as `card0-DP-1`.
fn is_card_node(name: &str) -> bool {
    name.strip_prefix("card")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_drm(root: &str) -> PathBuf {
        let base = std::env::temp_dir().join("infer_serve_monitor").join(root);
        let _ = std::fs::remove_dir_all(&base);
        std::fs::create_dir_all(base.join("card0-DP-1")).unwrap();
        std::fs::create_dir_all(base.join("card0/device")).unwrap();
        std::fs::create_dir_all(base.join("card1/device")).unwrap();
        base
    }

    #[test]
    fn test_is_card_node() {
        assert!(is_card_node("card0"));
        assert!(is_card_node("card12"));
        assert!(!is_card_node("card0-DP-1"));
        assert!(!is_card_node("card"));
        assert!(!is_card_node("renderD128"));
    }

    #[test]
    fn test_detect_first_card_with_vram() {
        let base = fake_drm("drm_with_vram");
        let dev = base.join("card1/device");
        std::fs::write(dev.join("mem_info_vram_total"), "17179869184\n").unwrap();
        std::fs::write(dev.join("mem_info_vram_used"), "2147483648\n").unwrap();
        std::fs::write(dev.join("product_name"), "Radeon Test\n").unwrap();

        let info = AcceleratorInfo::detect_in(&base).unwrap().unwrap();
        assert_eq!(info.name, "Radeon Test");
        assert!((info.memory_total_gb() - 16.0).abs() < 1e-9);
        assert!((info.memory_used_gb() - 2.0).abs() < 1e-9);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn test_detect_falls_back_to_card_name() {
        let base = fake_drm("drm_no_product");
        let dev = base.join("card0/device");
        std::fs::write(dev.join("mem_info_vram_total"), "1024").unwrap();
        std::fs::write(dev.join("mem_info_vram_used"), "0").unwrap();

        let info = AcceleratorInfo::detect_in(&base).unwrap().unwrap();
        assert_eq!(info.name, "card0");
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn test_no_vram_means_no_accelerator() {
        let base = fake_drm("drm_integrated");
        assert_eq!(AcceleratorInfo::detect_in(&base).unwrap(), None);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn test_missing_drm_dir() {
        let result = AcceleratorInfo::detect_in(Path::new("/nonexistent/drm")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_unreadable_counter_is_error() {
        let base = fake_drm("drm_broken");
        let dev = base.join("card0/device");
        std::fs::write(dev.join("mem_info_vram_total"), "garbage").unwrap();
        std::fs::write(dev.join("mem_info_vram_used"), "0").unwrap();

        let result = AcceleratorInfo::detect_in(&base);
        assert!(matches!(result, Err(MonitorError::ParseError { .. })));
        let _ = std::fs::remove_dir_all(&base);
    }
}

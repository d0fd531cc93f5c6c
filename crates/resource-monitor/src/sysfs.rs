// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shared helpers for reading procfs/sysfs files.

use crate::MonitorError;
use std::path::Path;

/// Reads a sysfs/procfs file and returns its trimmed content.
pub(crate) fn read_sysfs_file(path: &Path) -> Result<String, MonitorError> {
    if !path.exists() {
        return Err(MonitorError::NotAvailable {
            path: path.display().to_string(),
        });
    }
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| MonitorError::ReadError {
            path: path.display().to_string(),
            source: e,
        })
}

/// Reads a file holding a single unsigned integer.
pub(crate) fn read_u64(path: &Path) -> Result<u64, MonitorError> {
    let content = read_sysfs_file(path)?;
    content.parse::<u64>().map_err(|_| MonitorError::ParseError {
        path: path.display().to_string(),
        detail: format!("expected unsigned integer, got '{content}'"),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::path::PathBuf;

    /// Writes `content` to `<tmp>/infer_serve_monitor/<name>` and returns the path.
    pub(crate) fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join("infer_serve_monitor").join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "{content}").unwrap();
        path
    }
}

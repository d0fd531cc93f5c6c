// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model loading from SafeTensors files with memory-mapped I/O.
//!
//! [`WeightLoader`] provides two modes:
//!
//! 1. **File-backed**: the artifact at the configured path is mmap'd and
//!    every `layers.{n}.weight` / `layers.{n}.bias` pair becomes one dense
//!    layer, ordered by `n`.
//! 2. **Synthetic**: when no artifact exists, seeded random weights with the
//!    configured dimensions are generated so the service still starts.

use crate::{DenseClassifier, DenseLayer, ServeError};
use safetensors::{Dtype, SafeTensors};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tensor_core::{Shape, Tensor};

/// Loads a [`DenseClassifier`] from a SafeTensors artifact.
pub struct WeightLoader {
    /// Path to the artifact.
    path: PathBuf,
    /// Memory-mapped artifact, when the file exists.
    mmap: Option<memmap2::Mmap>,
}

impl WeightLoader {
    /// Opens the artifact at `path`.
    ///
    /// A missing file is not an error: the loader falls back to synthetic
    /// mode and logs a warning.
    pub fn new(path: PathBuf) -> Result<Self, ServeError> {
        let mmap = if path.exists() {
            let file = std::fs::File::open(&path).map_err(|e| ServeError::WeightLoad {
                tensor: "<file>".into(),
                detail: format!("cannot open '{}': {e}", path.display()),
            })?;
            // SAFETY: the artifact is treated as read-only for the lifetime
            // of the loader.
            let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| ServeError::WeightLoad {
                tensor: "<file>".into(),
                detail: format!("mmap failed: {e}"),
            })?;
            tracing::info!(
                "weight loader: mmap'd {} ({:.2} MB)",
                path.display(),
                mmap.len() as f64 / (1024.0 * 1024.0),
            );
            Some(mmap)
        } else {
            tracing::warn!(
                "weight loader: '{}' not found, using randomly initialised weights",
                path.display(),
            );
            None
        };

        Ok(Self { path, mmap })
    }

    /// Returns `true` if operating in file-backed mode.
    pub fn is_file_backed(&self) -> bool {
        self.mmap.is_some()
    }

    /// Returns the artifact path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Builds the classifier.
    ///
    /// `dims` and `seed` are only used in synthetic mode. In file-backed
    /// mode the artifact defines the dimensions; a difference from `dims`
    /// is logged.
    pub fn load_classifier(&self, dims: &[usize], seed: u64) -> Result<DenseClassifier, ServeError> {
        match &self.mmap {
            Some(mmap) => {
                let model = parse_classifier(mmap)?;
                let loaded = crate::ComputeUnit::info(&model).layer_dims;
                if loaded != dims {
                    tracing::warn!(
                        "artifact layer dims {loaded:?} differ from configured {dims:?}; using artifact"
                    );
                }
                Ok(model)
            }
            None => DenseClassifier::synthetic(dims, seed),
        }
    }
}

impl std::fmt::Debug for WeightLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightLoader")
            .field("path", &self.path)
            .field("file_backed", &self.is_file_backed())
            .finish()
    }
}

// ── Private helpers ────────────────────────────────────────────

/// Parses a SafeTensors buffer into a classifier.
fn parse_classifier(bytes: &[u8]) -> Result<DenseClassifier, ServeError> {
    let st = SafeTensors::deserialize(bytes).map_err(|e| ServeError::WeightLoad {
        tensor: "<file>".into(),
        detail: format!("SafeTensors parse error: {e}"),
    })?;

    // Layer indices need not be contiguous (nn.Sequential numbers activation
    // and dropout modules too), only ordered.
    let mut indices = BTreeMap::new();
    for name in st.names() {
        if let Some(index) = layer_index(name) {
            indices.insert(index, name.to_string());
        }
    }
    if indices.is_empty() {
        return Err(ServeError::WeightLoad {
            tensor: "layers.*.weight".into(),
            detail: "artifact contains no layer weights".into(),
        });
    }

    let mut layers = Vec::with_capacity(indices.len());
    for (index, weight_name) in indices {
        let weight = read_tensor(&st, &weight_name, 2)?;
        let bias = read_tensor(&st, &format!("layers.{index}.bias"), 1)?;
        layers.push(DenseLayer { weight, bias });
    }

    tracing::debug!("parsed {} dense layers from artifact", layers.len());
    DenseClassifier::new(layers)
}

/// Extracts `n` from `layers.{n}.weight`.
fn layer_index(name: &str) -> Option<usize> {
    name.strip_prefix("layers.")?
        .strip_suffix(".weight")?
        .parse()
        .ok()
}

fn read_tensor(st: &SafeTensors<'_>, name: &str, rank: usize) -> Result<Tensor, ServeError> {
    let view = st.tensor(name).map_err(|e| ServeError::WeightLoad {
        tensor: name.to_string(),
        detail: format!("tensor not found: {e}"),
    })?;

    if view.dtype() != Dtype::F32 {
        return Err(ServeError::WeightLoad {
            tensor: name.to_string(),
            detail: format!("expected F32, found {:?}", view.dtype()),
        });
    }
    if view.shape().len() != rank {
        return Err(ServeError::WeightLoad {
            tensor: name.to_string(),
            detail: format!("expected rank {rank}, found shape {:?}", view.shape()),
        });
    }

    let values: Vec<f32> = view
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Tensor::from_vec(Shape::new(view.shape().to_vec()), values).map_err(|e| {
        ServeError::WeightLoad {
            tensor: name.to_string(),
            detail: e.to_string(),
        }
    })
}

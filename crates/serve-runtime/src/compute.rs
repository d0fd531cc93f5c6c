// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The compute unit: an opaque model that maps `[rows, in]` inputs to
//! `[rows, classes]` raw scores.
//!
//! The dispatcher only sees the [`ComputeUnit`] trait. [`DenseClassifier`]
//! is the built-in implementation, a small feed-forward network:
//!
//! ```text
//! in ─▶ Linear ─▶ ReLU ─▶ Linear ─▶ ReLU ─▶ Linear ─▶ scores
//! ```
//!
//! Whether a unit may be entered by several workers at once is decided by
//! [`ComputePolicy`], not by the unit itself.

use crate::{ComputeError, ServeError};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tensor_core::{linear, relu, Shape, Tensor};

/// A model that can score a batch of rows.
pub trait ComputeUnit: Send + Sync {
    /// Runs the model over every row of `input` and returns raw scores.
    fn infer(&self, input: &Tensor) -> Result<Tensor, ComputeError>;

    /// Static description of the model.
    fn info(&self) -> ModelInfo;
}

/// Description reported by a compute unit.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ModelInfo {
    /// Human-readable architecture name.
    pub model_type: String,
    /// Number of scalar parameters.
    pub total_parameters: usize,
    /// Parameters that training would update. Inference-only units report
    /// the same count as `total_parameters`.
    pub trainable_parameters: usize,
    /// Width of each layer boundary, input first.
    pub layer_dims: Vec<usize>,
}

impl ModelInfo {
    /// Expected input width.
    pub fn input_dim(&self) -> usize {
        self.layer_dims.first().copied().unwrap_or(0)
    }

    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        self.layer_dims.last().copied().unwrap_or(0)
    }
}

// ── Compute policy ─────────────────────────────────────────────

/// How concurrent workers may enter the compute unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputePolicy {
    /// One `infer` call at a time, process-wide.
    #[default]
    Serialized,
    /// Calls run in parallel; the unit must tolerate that.
    Concurrent,
}

impl ComputePolicy {
    /// Wraps `unit` so that it obeys this policy.
    pub fn apply(self, unit: Arc<dyn ComputeUnit>) -> Arc<dyn ComputeUnit> {
        match self {
            ComputePolicy::Concurrent => unit,
            ComputePolicy::Serialized => Arc::new(SerializedUnit {
                gate: Mutex::new(()),
                inner: unit,
            }),
        }
    }
}

impl std::fmt::Display for ComputePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputePolicy::Serialized => write!(f, "serialized"),
            ComputePolicy::Concurrent => write!(f, "concurrent"),
        }
    }
}

impl std::str::FromStr for ComputePolicy {
    type Err = ServeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "serialized" => Ok(ComputePolicy::Serialized),
            "concurrent" => Ok(ComputePolicy::Concurrent),
            other => Err(ServeError::Config(format!(
                "unknown compute policy '{other}' (expected 'serialized' or 'concurrent')"
            ))),
        }
    }
}

struct SerializedUnit {
    gate: Mutex<()>,
    inner: Arc<dyn ComputeUnit>,
}

impl ComputeUnit for SerializedUnit {
    fn infer(&self, input: &Tensor) -> Result<Tensor, ComputeError> {
        let _guard = self.gate.lock();
        self.inner.infer(input)
    }

    fn info(&self) -> ModelInfo {
        self.inner.info()
    }
}

// ── Dense classifier ───────────────────────────────────────────

/// One fully-connected layer in `nn.Linear` layout.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    /// `[out, in]`.
    pub weight: Tensor,
    /// `[out]`.
    pub bias: Tensor,
}

impl DenseLayer {
    /// Input width.
    pub fn in_features(&self) -> usize {
        self.weight.row_width()
    }

    /// Output width.
    pub fn out_features(&self) -> usize {
        self.weight.num_rows()
    }

    fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

/// Feed-forward classifier with ReLU between layers.
#[derive(Debug, Clone)]
pub struct DenseClassifier {
    layers: Vec<DenseLayer>,
}

impl DenseClassifier {
    /// Builds a classifier from layers in execution order.
    ///
    /// # Errors
    /// Fails if there are no layers, a bias length differs from its
    /// layer's output width, or consecutive layers do not chain.
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self, ServeError> {
        if layers.is_empty() {
            return Err(ServeError::WeightLoad {
                tensor: "layers".into(),
                detail: "model has no layers".into(),
            });
        }
        for (i, layer) in layers.iter().enumerate() {
            if layer.weight.shape().rank() != 2 || layer.in_features() == 0 {
                return Err(ServeError::WeightLoad {
                    tensor: format!("layers.{i}.weight"),
                    detail: format!("expected a non-empty [out, in] matrix, got {}", layer.weight.shape()),
                });
            }
            if layer.bias.len() != layer.out_features() {
                return Err(ServeError::WeightLoad {
                    tensor: format!("layers.{i}.bias"),
                    detail: format!(
                        "bias has {} values, layer has {} outputs",
                        layer.bias.len(),
                        layer.out_features()
                    ),
                });
            }
            if i > 0 && layers[i - 1].out_features() != layer.in_features() {
                return Err(ServeError::WeightLoad {
                    tensor: format!("layers.{i}.weight"),
                    detail: format!(
                        "expects {} inputs but previous layer produces {}",
                        layer.in_features(),
                        layers[i - 1].out_features()
                    ),
                });
            }
        }
        Ok(Self { layers })
    }

    /// Builds a classifier with seeded random weights drawn uniformly from
    /// `±1/sqrt(fan_in)`.
    ///
    /// `dims` lists layer widths, input first: `[10, 128, 128, 5]` gives
    /// three layers.
    pub fn synthetic(dims: &[usize], seed: u64) -> Result<Self, ServeError> {
        if dims.len() < 2 || dims.iter().any(|&d| d == 0) {
            return Err(ServeError::Config(format!(
                "invalid layer dimensions {dims:?}"
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut layers = Vec::with_capacity(dims.len() - 1);
        for pair in dims.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let bound = 1.0 / (fan_in as f32).sqrt();
            let weight: Vec<f32> = (0..fan_in * fan_out)
                .map(|_| rng.gen_range(-bound..bound))
                .collect();
            let bias: Vec<f32> = (0..fan_out).map(|_| rng.gen_range(-bound..bound)).collect();
            layers.push(DenseLayer {
                weight: Tensor::from_vec(Shape::matrix(fan_out, fan_in), weight)
                    .map_err(|e| ServeError::Config(e.to_string()))?,
                bias: Tensor::from_vec(Shape::vector(fan_out), bias)
                    .map_err(|e| ServeError::Config(e.to_string()))?,
            });
        }
        Self::new(layers)
    }

    /// Layers in execution order.
    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    /// Expected input width.
    pub fn input_dim(&self) -> usize {
        self.layers[0].in_features()
    }
}

impl ComputeUnit for DenseClassifier {
    fn infer(&self, input: &Tensor) -> Result<Tensor, ComputeError> {
        let expected = self.input_dim();
        if input.row_width() != expected {
            return Err(ComputeError::InputWidth {
                expected,
                actual: input.row_width(),
            });
        }

        let mut x = linear(input, &self.layers[0].weight, &self.layers[0].bias)?;
        for layer in &self.layers[1..] {
            relu(&mut x);
            x = linear(&x, &layer.weight, &layer.bias)?;
        }
        Ok(x)
    }

    fn info(&self) -> ModelInfo {
        let total: usize = self.layers.iter().map(DenseLayer::num_parameters).sum();
        let mut layer_dims = vec![self.input_dim()];
        layer_dims.extend(self.layers.iter().map(DenseLayer::out_features));
        ModelInfo {
            model_type: "DenseClassifier".to_string(),
            total_parameters: total,
            trainable_parameters: total,
            layer_dims,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_layer(n: usize) -> DenseLayer {
        let mut w = vec![0.0; n * n];
        for i in 0..n {
            w[i * n + i] = 1.0;
        }
        DenseLayer {
            weight: Tensor::from_vec(Shape::matrix(n, n), w).unwrap(),
            bias: Tensor::zeros(Shape::vector(n)),
        }
    }

    #[test]
    fn test_synthetic_parameter_count() {
        let model = DenseClassifier::synthetic(&[10, 128, 128, 5], 42).unwrap();
        let info = model.info();
        // 10*128+128 + 128*128+128 + 128*5+5
        assert_eq!(info.total_parameters, 1408 + 16512 + 645);
        assert_eq!(info.trainable_parameters, info.total_parameters);
        assert_eq!(info.layer_dims, vec![10, 128, 128, 5]);
        assert_eq!(info.input_dim(), 10);
        assert_eq!(info.num_classes(), 5);
    }

    #[test]
    fn test_synthetic_is_seeded() {
        let a = DenseClassifier::synthetic(&[4, 3], 7).unwrap();
        let b = DenseClassifier::synthetic(&[4, 3], 7).unwrap();
        let c = DenseClassifier::synthetic(&[4, 3], 8).unwrap();
        assert_eq!(a.layers(), b.layers());
        assert_ne!(a.layers(), c.layers());
    }

    #[test]
    fn test_synthetic_weight_bounds() {
        let model = DenseClassifier::synthetic(&[16, 4], 1).unwrap();
        let bound = 0.25;
        assert!(model.layers()[0]
            .weight
            .as_slice()
            .iter()
            .all(|w| w.abs() <= bound));
    }

    #[test]
    fn test_synthetic_rejects_bad_dims() {
        assert!(DenseClassifier::synthetic(&[10], 0).is_err());
        assert!(DenseClassifier::synthetic(&[10, 0, 5], 0).is_err());
    }

    #[test]
    fn test_infer_output_shape() {
        let model = DenseClassifier::synthetic(&[10, 128, 128, 5], 42).unwrap();
        let out = model.infer(&Tensor::zeros(Shape::matrix(3, 10))).unwrap();
        assert_eq!(out.shape(), &Shape::matrix(3, 5));
    }

    #[test]
    fn test_infer_rejects_wrong_width() {
        let model = DenseClassifier::synthetic(&[10, 5], 42).unwrap();
        let err = model.infer(&Tensor::zeros(Shape::matrix(1, 4))).unwrap_err();
        assert!(matches!(
            err,
            ComputeError::InputWidth {
                expected: 10,
                actual: 4
            }
        ));
    }

    #[test]
    fn test_relu_between_layers_only() {
        // Identity layers: hidden ReLU clamps negatives, final layer does not.
        let model = DenseClassifier::new(vec![identity_layer(2), identity_layer(2)]).unwrap();
        let input = Tensor::from_vec(Shape::matrix(1, 2), vec![-1.0, 2.0]).unwrap();
        let out = model.infer(&input).unwrap();
        assert_eq!(out.as_slice(), &[0.0, 2.0]);

        let single = DenseClassifier::new(vec![identity_layer(2)]).unwrap();
        let out = single.infer(&input).unwrap();
        assert_eq!(out.as_slice(), &[-1.0, 2.0]);
    }

    #[test]
    fn test_new_rejects_broken_chain() {
        let bad = DenseClassifier::new(vec![identity_layer(2), identity_layer(3)]);
        assert!(matches!(bad, Err(ServeError::WeightLoad { .. })));
        assert!(DenseClassifier::new(Vec::new()).is_err());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("serialized".parse::<ComputePolicy>().unwrap(), ComputePolicy::Serialized);
        assert_eq!("Concurrent".parse::<ComputePolicy>().unwrap(), ComputePolicy::Concurrent);
        assert!("parallel".parse::<ComputePolicy>().is_err());
        assert_eq!(ComputePolicy::default(), ComputePolicy::Serialized);
    }

    #[test]
    fn test_serialized_policy_forwards() {
        let model: Arc<dyn ComputeUnit> =
            Arc::new(DenseClassifier::synthetic(&[3, 2], 5).unwrap());
        let wrapped = ComputePolicy::Serialized.apply(Arc::clone(&model));
        let input = Tensor::from_vec(Shape::matrix(1, 3), vec![0.5, -0.5, 1.0]).unwrap();
        assert_eq!(wrapped.infer(&input).unwrap(), model.infer(&input).unwrap());
        assert_eq!(wrapped.info(), model.info());
    }
}

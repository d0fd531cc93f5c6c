// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error taxonomy for the serving core.
//!
//! | Category | Type | Caller sees |
//! |---|---|---|
//! | malformed request shape | [`ShapeError`] via [`ServeError::Validation`] | client error |
//! | service not ready | [`ServeError::ModelUnavailable`] | unavailable |
//! | compute failed | [`ComputeError`] via [`ServeError::InferenceFailure`] | server error |
//! | queue full | [`ServeError::Overloaded`] | retry later |
//!
//! Telemetry failures live in `resource_monitor::MonitorError` and never
//! reach this type.

/// Request validation failures, detected before any compute is used.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    /// `input_data` has zero length.
    #[error("input data cannot be empty")]
    EmptyInput,

    /// `batch_size` is zero.
    #[error("batch_size must be at least 1")]
    InvalidBatchSize,

    /// `input_data` cannot be split into `batch_size` equal rows.
    #[error("input length {len} is not divisible by batch_size {batch_size}")]
    ShapeMismatch { len: usize, batch_size: usize },

    /// Requests merged into one batch have different row widths.
    #[error("request {request_index} has {actual} features per row, expected {expected}")]
    BatchDimensionMismatch {
        request_index: usize,
        expected: usize,
        actual: usize,
    },

    /// `input_data` holds NaN or an infinity.
    #[error("input value at index {index} is not finite ({value})")]
    NonFinite { index: usize, value: f32 },

    /// A multi-request batch was built from zero requests.
    #[error("batch contains no requests")]
    EmptyBatch,

    /// Building the batch tensor failed.
    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),
}

/// Failures raised by a compute unit.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// The batch row width does not match the model's input dimension.
    #[error("model expects {expected} input features, got {actual}")]
    InputWidth { expected: usize, actual: usize },

    /// A tensor operation inside the model failed.
    #[error("tensor operation failed: {0}")]
    Tensor(#[from] tensor_core::TensorError),

    /// Any other backend failure.
    #[error("{0}")]
    Backend(String),
}

/// Errors surfaced by the serving core.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// The request was rejected by the tensor shaper.
    #[error("invalid request: {0}")]
    Validation(#[from] ShapeError),

    /// The model has not finished loading (or failed to load).
    #[error("model not loaded")]
    ModelUnavailable,

    /// The compute unit failed or did not finish in time. Never retried.
    #[error("inference failed: {cause}")]
    InferenceFailure { cause: String },

    /// The admission queue is full.
    #[error("inference queue full ({capacity} requests pending)")]
    Overloaded { capacity: usize },

    /// The one-way lifecycle transition was attempted a second time.
    #[error("service state already initialised")]
    AlreadyInitialized,

    /// The model artifact could not be read.
    #[error("weight loading failed for '{tensor}': {detail}")]
    WeightLoad { tensor: String, detail: String },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<ComputeError> for ServeError {
    fn from(e: ComputeError) -> Self {
        ServeError::InferenceFailure {
            cause: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error_messages() {
        let e = ShapeError::ShapeMismatch {
            len: 3,
            batch_size: 2,
        };
        assert_eq!(e.to_string(), "input length 3 is not divisible by batch_size 2");
    }

    #[test]
    fn test_compute_error_keeps_cause() {
        let e: ServeError = ComputeError::InputWidth {
            expected: 10,
            actual: 4,
        }
        .into();
        match e {
            ServeError::InferenceFailure { cause } => {
                assert_eq!(cause, "model expects 10 input features, got 4")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validation_wraps_shape_error() {
        let e: ServeError = ShapeError::EmptyInput.into();
        assert_eq!(e.to_string(), "invalid request: input data cannot be empty");
    }

    #[test]
    fn test_non_finite_message() {
        let e = ShapeError::NonFinite {
            index: 3,
            value: f32::INFINITY,
        };
        assert_eq!(e.to_string(), "input value at index 3 is not finite (inf)");
    }
}

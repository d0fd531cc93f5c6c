// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Conversion between flat client requests and rectangular batches.
//!
//! A request carries a flat `input_data` sequence plus a `batch_size`; the
//! shaper turns it into `batch_size` rows of `len / batch_size` features.
//! Several requests can be merged into one [`ShapedBatch`], which records
//! the contiguous row range each request owns so that [`unshape`] can
//! route the results back.
//!
//! ```text
//!  A (batch 2) ─┐                 ┌─ rows 0..2 ─▶ A
//!               ├─▶ [5 × F] ─▶ … ─┤
//!  B (batch 3) ─┘                 └─ rows 2..5 ─▶ B
//! ```

use crate::ShapeError;
use std::ops::Range;
use tensor_core::{Shape, Tensor};

fn default_batch_size() -> usize {
    1
}

/// A single client inference request.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InferenceRequest {
    /// Flattened row-major input values.
    pub input_data: Vec<f32>,
    /// Number of rows `input_data` is split into.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Whether the per-class probabilities are returned.
    #[serde(default)]
    pub return_probabilities: bool,
}

impl InferenceRequest {
    /// Creates a request with `batch_size = 1` and no probabilities.
    pub fn new(input_data: Vec<f32>) -> Self {
        Self {
            input_data,
            batch_size: 1,
            return_probabilities: false,
        }
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Requests probabilities in the result.
    pub fn with_probabilities(mut self) -> Self {
        self.return_probabilities = true;
        self
    }
}

/// Which rows of a batch belong to which request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowOwner {
    /// Position of the request in the submitted sequence.
    pub request_id: usize,
    /// Contiguous rows of the batch produced from this request.
    pub rows: Range<usize>,
    /// Copied from the request.
    pub return_probabilities: bool,
}

/// A rectangular batch ready for the compute unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedBatch {
    /// `[rows, features]` input tensor.
    pub tensor: Tensor,
    /// Row ranges in input order; together they cover every row exactly once.
    pub owners: Vec<RowOwner>,
}

impl ShapedBatch {
    /// Total number of rows.
    pub fn num_rows(&self) -> usize {
        self.tensor.num_rows()
    }

    /// Features per row.
    pub fn feature_dim(&self) -> usize {
        self.tensor.row_width()
    }

    /// Whether any owner asked for probabilities.
    pub fn wants_probabilities(&self) -> bool {
        self.owners.iter().any(|o| o.return_probabilities)
    }
}

/// Predictions for a batch, or for one request's slice of it.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct InferenceResult {
    /// Arg-max class index per row.
    pub predictions: Vec<usize>,
    /// Softmax probabilities per row, when requested.
    pub probabilities: Option<Vec<Vec<f32>>>,
}

impl InferenceResult {
    /// Number of rows in this result.
    pub fn num_rows(&self) -> usize {
        self.predictions.len()
    }
}

/// Validates a request and reshapes it into a `[batch_size, features]` batch.
///
/// # Examples
/// ```
/// use serve_runtime::{shape, InferenceRequest};
/// let req = InferenceRequest::new(vec![1.0, 2.0, 3.0, 4.0]).with_batch_size(2);
/// let batch = shape(&req).unwrap();
/// assert_eq!(batch.num_rows(), 2);
/// assert_eq!(batch.feature_dim(), 2);
/// ```
pub fn shape(request: &InferenceRequest) -> Result<ShapedBatch, ShapeError> {
    let tensor = shape_tensor(request)?;
    let rows = tensor.num_rows();
    Ok(ShapedBatch {
        tensor,
        owners: vec![RowOwner {
            request_id: 0,
            rows: 0..rows,
            return_probabilities: request.return_probabilities,
        }],
    })
}

/// Shapes every request and stacks the rows in input order.
///
/// All requests must produce the same feature width; the first request
/// sets it.
pub fn shape_many(requests: &[InferenceRequest]) -> Result<ShapedBatch, ShapeError> {
    if requests.is_empty() {
        return Err(ShapeError::EmptyBatch);
    }

    let mut parts = Vec::with_capacity(requests.len());
    let mut owners = Vec::with_capacity(requests.len());
    let mut expected = None;
    let mut offset = 0;

    for (request_id, request) in requests.iter().enumerate() {
        let part = shape_tensor(request)?;
        let width = part.row_width();
        match expected {
            None => expected = Some(width),
            Some(e) if e != width => {
                return Err(ShapeError::BatchDimensionMismatch {
                    request_index: request_id,
                    expected: e,
                    actual: width,
                });
            }
            Some(_) => {}
        }

        let rows = part.num_rows();
        owners.push(RowOwner {
            request_id,
            rows: offset..offset + rows,
            return_probabilities: request.return_probabilities,
        });
        offset += rows;
        parts.push(part);
    }

    let tensor = Tensor::concat_rows(&parts)?;

    Ok(ShapedBatch { tensor, owners })
}

/// Splits a batch result back into one result per owner, in owner order.
///
/// # Panics
/// If the owners' row ranges do not partition `0..result.num_rows()` in
/// order. The dispatcher only ever passes the owners produced together with
/// the batch, so this signals a bug rather than bad input.
pub fn unshape(result: InferenceResult, owners: &[RowOwner]) -> Vec<InferenceResult> {
    let total = result.num_rows();
    let mut cursor = 0;
    for owner in owners {
        assert!(
            owner.rows.start == cursor && owner.rows.end >= owner.rows.start,
            "row ranges must be contiguous: expected start {cursor}, got {:?}",
            owner.rows
        );
        cursor = owner.rows.end;
    }
    assert_eq!(
        cursor, total,
        "row ranges cover {cursor} rows but the result has {total}"
    );
    if let Some(probs) = &result.probabilities {
        assert_eq!(
            probs.len(),
            total,
            "probability rows do not match prediction rows"
        );
    }

    owners
        .iter()
        .map(|owner| InferenceResult {
            predictions: result.predictions[owner.rows.clone()].to_vec(),
            probabilities: match &result.probabilities {
                Some(probs) if owner.return_probabilities => {
                    Some(probs[owner.rows.clone()].to_vec())
                }
                _ => None,
            },
        })
        .collect()
}

fn shape_tensor(request: &InferenceRequest) -> Result<Tensor, ShapeError> {
    let len = request.input_data.len();
    if len == 0 {
        return Err(ShapeError::EmptyInput);
    }
    if request.batch_size == 0 {
        return Err(ShapeError::InvalidBatchSize);
    }
    if let Some((index, &value)) = request
        .input_data
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite())
    {
        return Err(ShapeError::NonFinite { index, value });
    }
    if len % request.batch_size != 0 {
        return Err(ShapeError::ShapeMismatch {
            len,
            batch_size: request.batch_size,
        });
    }

    let features = len / request.batch_size;
    Ok(Tensor::from_slice(
        Shape::matrix(request.batch_size, features),
        &request.input_data,
    )?)
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor operations.

use crate::Shape;

/// Errors that can occur during tensor operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TensorError {
    /// The provided buffer length does not match the element count of the shape.
    #[error("buffer size mismatch for shape {shape}: expected {expected} elements, got {actual}")]
    BufferSizeMismatch {
        shape: Shape,
        expected: usize,
        actual: usize,
    },

    /// Two tensors have incompatible shapes for the requested operation.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// The operation requires a different rank.
    #[error("{op} expects a rank-{expected} tensor, got shape {actual}")]
    RankMismatch {
        op: &'static str,
        expected: usize,
        actual: Shape,
    },

    /// A row range falls outside the tensor.
    #[error("row range {start}..{end} out of bounds for {rows} rows")]
    RowsOutOfBounds {
        start: usize,
        end: usize,
        rows: usize,
    },

    /// A numeric computation produced a non-finite value.
    #[error("numeric error in {op}: {detail}")]
    Numeric {
        op: &'static str,
        detail: String,
    },
}

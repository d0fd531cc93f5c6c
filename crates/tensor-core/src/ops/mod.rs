// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Row-wise tensor operations used by the serving path.
//!
//! Every op treats its input as `[rows, width]` and never mixes data
//! across rows, so a batch assembled from several requests produces the
//! same per-row values as each request would alone.

mod argmax_op;
mod linear_op;
mod relu_op;
mod softmax_op;

pub use argmax_op::argmax_rows;
pub use linear_op::linear;
pub use relu_op::relu;
pub use softmax_op::softmax;

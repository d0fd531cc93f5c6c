// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Minimal tensor types for batched inference serving.
//!
//! This crate provides:
//! - [`Tensor`]: an owned, row-major `f32` buffer with a [`Shape`].
//! - Row helpers: [`Tensor::concat_rows`] and [`Tensor::slice_rows`], used to
//!   merge several requests into one batch and split the results back.
//! - Row-wise operations: [`linear`], [`relu`], [`softmax`], [`argmax_rows`].
//!
//! Errors are reported through [`TensorError`] (built with `thiserror`).

mod error;
mod ops;
mod shape;
mod tensor;

pub use error::TensorError;
pub use ops::{argmax_rows, linear, relu, softmax};
pub use shape::Shape;
pub use tensor::Tensor;

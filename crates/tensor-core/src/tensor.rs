// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Owned `f32` tensor stored in row-major order.

use crate::{Shape, TensorError};
use std::ops::Range;

/// An owned tensor of `f32` values in contiguous row-major memory.
///
/// `Tensor` owns its buffer exclusively; moving it into a worker moves the
/// buffer with it. Row accessors treat every tensor as a matrix of
/// `shape.rows()` rows by `shape.cols()` columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a new tensor filled with zeros.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape};
    /// let t = Tensor::zeros(Shape::matrix(2, 3));
    /// assert_eq!(t.len(), 6);
    /// ```
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.num_elements();
        Self {
            shape,
            data: vec![0.0; n],
        }
    }

    /// Wraps an existing buffer.
    ///
    /// Returns an error if `data.len()` differs from the shape's element count.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape};
    /// let t = Tensor::from_vec(Shape::matrix(2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    /// assert_eq!(t.row(1), &[3.0, 4.0]);
    /// ```
    pub fn from_vec(shape: Shape, data: Vec<f32>) -> Result<Self, TensorError> {
        let expected = shape.num_elements();
        if data.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Copies a slice into a new tensor.
    pub fn from_slice(shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        Self::from_vec(shape, values.to_vec())
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.shape.rows()
    }

    /// Width of each row.
    pub fn row_width(&self) -> usize {
        self.shape.cols()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the tensor holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat read-only access to the buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Flat mutable access to the buffer.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consumes the tensor and returns its buffer.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Returns row `index`.
    ///
    /// # Panics
    /// Panics if `index >= self.num_rows()`.
    pub fn row(&self, index: usize) -> &[f32] {
        let w = self.row_width();
        &self.data[index * w..(index + 1) * w]
    }

    /// Iterates over rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact(0) panics; a zero-width tensor has no data and yields nothing.
        let w = self.row_width().max(1);
        self.data.chunks_exact(w)
    }

    /// Mutable row iterator.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        let w = self.row_width().max(1);
        self.data.chunks_exact_mut(w)
    }

    /// Copies the rows in `range` into a new `[range.len(), width]` tensor.
    pub fn slice_rows(&self, range: Range<usize>) -> Result<Self, TensorError> {
        let rows = self.num_rows();
        if range.start > range.end || range.end > rows {
            return Err(TensorError::RowsOutOfBounds {
                start: range.start,
                end: range.end,
                rows,
            });
        }
        let w = self.row_width();
        let data = self.data[range.start * w..range.end * w].to_vec();
        Ok(Self {
            shape: Shape::matrix(range.len(), w),
            data,
        })
    }

    /// Stacks matrices vertically.
    ///
    /// Every part must have the same row width. Row order follows `parts`.
    pub fn concat_rows(parts: &[Tensor]) -> Result<Self, TensorError> {
        let Some(first) = parts.first() else {
            return Ok(Self::zeros(Shape::matrix(0, 0)));
        };
        let width = first.row_width();
        let mut rows = 0;
        for part in parts {
            if part.row_width() != width {
                return Err(TensorError::ShapeMismatch {
                    op: "concat_rows",
                    lhs: first.shape.clone(),
                    rhs: part.shape.clone(),
                });
            }
            rows += part.num_rows();
        }
        let mut data = Vec::with_capacity(rows * width);
        for part in parts {
            data.extend_from_slice(&part.data);
        }
        Ok(Self {
            shape: Shape::matrix(rows, width),
            data,
        })
    }

    /// Returns the rows as owned vectors, the form used in API responses.
    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        (0..self.num_rows()).map(|i| self.row(i).to_vec()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros(Shape::matrix(2, 3));
        assert_eq!(t.len(), 6);
        assert_eq!(t.num_rows(), 2);
        assert_eq!(t.row_width(), 3);
        assert!(t.as_slice().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_from_vec_size_mismatch() {
        let result = Tensor::from_vec(Shape::matrix(2, 3), vec![0.0; 5]);
        assert!(matches!(
            result,
            Err(TensorError::BufferSizeMismatch { expected: 6, actual: 5, .. })
        ));
    }

    #[test]
    fn test_rows() {
        let t = Tensor::from_slice(Shape::matrix(3, 2), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let rows: Vec<&[f32]> = t.rows().collect();
        assert_eq!(rows, vec![&[1.0, 2.0][..], &[3.0, 4.0], &[5.0, 6.0]]);
        assert_eq!(t.row(2), &[5.0, 6.0]);
    }

    #[test]
    fn test_slice_rows() {
        let t = Tensor::from_slice(Shape::matrix(3, 2), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let s = t.slice_rows(1..3).unwrap();
        assert_eq!(s.shape(), &Shape::matrix(2, 2));
        assert_eq!(s.as_slice(), &[3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_slice_rows_out_of_bounds() {
        let t = Tensor::zeros(Shape::matrix(2, 2));
        assert!(matches!(
            t.slice_rows(1..3),
            Err(TensorError::RowsOutOfBounds { rows: 2, .. })
        ));
    }

    #[test]
    fn test_concat_rows_preserves_order() {
        let a = Tensor::from_slice(Shape::matrix(2, 2), &[1.0, 1.0, 2.0, 2.0]).unwrap();
        let b = Tensor::from_slice(Shape::matrix(1, 2), &[3.0, 3.0]).unwrap();
        let c = Tensor::concat_rows(&[a, b]).unwrap();
        assert_eq!(c.shape(), &Shape::matrix(3, 2));
        assert_eq!(c.as_slice(), &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn test_concat_rows_width_mismatch() {
        let a = Tensor::zeros(Shape::matrix(1, 2));
        let b = Tensor::zeros(Shape::matrix(1, 3));
        assert!(matches!(
            Tensor::concat_rows(&[a, b]),
            Err(TensorError::ShapeMismatch { op: "concat_rows", .. })
        ));
    }

    #[test]
    fn test_to_rows() {
        let t = Tensor::from_slice(Shape::matrix(2, 1), &[7.0, 8.0]).unwrap();
        assert_eq!(t.to_rows(), vec![vec![7.0], vec![8.0]]);
    }
}

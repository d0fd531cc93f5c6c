// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Affine projection `output = input @ weight^T + bias`.

use crate::{Shape, Tensor, TensorError};

/// Applies a dense layer to every row of `input`.
///
/// `weight` is `[out, in]` (the PyTorch `nn.Linear` layout), `bias` is
/// `[out]`, `input` is `[rows, in]`; the result is `[rows, out]`.
///
/// # Errors
/// Returns [`TensorError::RankMismatch`] if `weight` is not a matrix, and
/// [`TensorError::ShapeMismatch`] if the input width or bias length does not
/// match the weight.
pub fn linear(input: &Tensor, weight: &Tensor, bias: &Tensor) -> Result<Tensor, TensorError> {
    if weight.shape().rank() != 2 {
        return Err(TensorError::RankMismatch {
            op: "linear",
            expected: 2,
            actual: weight.shape().clone(),
        });
    }
    let out_features = weight.num_rows();
    let in_features = weight.row_width();

    if input.row_width() != in_features {
        return Err(TensorError::ShapeMismatch {
            op: "linear",
            lhs: input.shape().clone(),
            rhs: weight.shape().clone(),
        });
    }
    if bias.len() != out_features {
        return Err(TensorError::ShapeMismatch {
            op: "linear (bias)",
            lhs: Shape::vector(out_features),
            rhs: bias.shape().clone(),
        });
    }

    let rows = input.num_rows();
    let mut output = Tensor::zeros(Shape::matrix(rows, out_features));
    let b = bias.as_slice();

    for (x, y) in input.rows().zip(output.rows_mut()) {
        for (j, (w_row, out)) in weight.rows().zip(y.iter_mut()).enumerate() {
            let dot: f32 = x.iter().zip(w_row).map(|(a, w)| a * w).sum();
            *out = dot + b[j];
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_2x3_to_2() {
        // x = [[1, 2, 3], [4, 5, 6]], W = [[1, 0, 0], [0, 1, 1]], b = [0.5, -1]
        let x = Tensor::from_slice(Shape::matrix(2, 3), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let w = Tensor::from_slice(Shape::matrix(2, 3), &[1.0, 0.0, 0.0, 0.0, 1.0, 1.0]).unwrap();
        let b = Tensor::from_slice(Shape::vector(2), &[0.5, -1.0]).unwrap();

        let y = linear(&x, &w, &b).unwrap();

        assert_eq!(y.shape(), &Shape::matrix(2, 2));
        assert_eq!(y.as_slice(), &[1.5, 4.0, 4.5, 10.0]);
    }

    #[test]
    fn test_linear_identity() {
        let x = Tensor::from_slice(Shape::matrix(1, 2), &[3.0, 4.0]).unwrap();
        let eye = Tensor::from_slice(Shape::matrix(2, 2), &[1.0, 0.0, 0.0, 1.0]).unwrap();
        let zero = Tensor::zeros(Shape::vector(2));

        assert_eq!(linear(&x, &eye, &zero).unwrap().as_slice(), &[3.0, 4.0]);
    }

    #[test]
    fn test_linear_width_mismatch() {
        let x = Tensor::zeros(Shape::matrix(2, 4));
        let w = Tensor::zeros(Shape::matrix(2, 3));
        let b = Tensor::zeros(Shape::vector(2));
        assert!(matches!(
            linear(&x, &w, &b),
            Err(TensorError::ShapeMismatch { op: "linear", .. })
        ));
    }

    #[test]
    fn test_linear_bias_mismatch() {
        let x = Tensor::zeros(Shape::matrix(1, 3));
        let w = Tensor::zeros(Shape::matrix(2, 3));
        let b = Tensor::zeros(Shape::vector(5));
        assert!(matches!(
            linear(&x, &w, &b),
            Err(TensorError::ShapeMismatch { op: "linear (bias)", .. })
        ));
    }

    #[test]
    fn test_linear_rejects_vector_weight() {
        let x = Tensor::zeros(Shape::matrix(1, 3));
        let w = Tensor::zeros(Shape::vector(3));
        let b = Tensor::zeros(Shape::vector(1));
        assert!(matches!(linear(&x, &w, &b), Err(TensorError::RankMismatch { .. })));
    }
}

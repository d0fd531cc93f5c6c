// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Row-wise softmax.

use crate::{Tensor, TensorError};

/// Computes softmax along each row: `out[i] = exp(x[i] - max) / sum(exp(x - max))`.
///
/// Uses the numerically stable variant that subtracts the row maximum
/// before exponentiation to prevent overflow. Accumulation is done in
/// `f64` so that rows sum to 1 within `1e-6`.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if input and output shapes differ.
/// Returns [`TensorError::Numeric`] if a row contains NaN or an infinity.
pub fn softmax(input: &Tensor, output: &mut Tensor) -> Result<(), TensorError> {
    if input.shape() != output.shape() {
        return Err(TensorError::ShapeMismatch {
            op: "softmax",
            lhs: input.shape().clone(),
            rhs: output.shape().clone(),
        });
    }
    if input.row_width() == 0 {
        return Ok(());
    }

    for (row_src, row_dst) in input.rows().zip(output.rows_mut()) {
        if let Some(bad) = row_src.iter().find(|x| !x.is_finite()) {
            return Err(TensorError::Numeric {
                op: "softmax",
                detail: format!("row contains non-finite score {bad}"),
            });
        }

        let max_val = row_src.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let mut sum = 0.0f64;
        let mut exps = Vec::with_capacity(row_src.len());
        for &s in row_src {
            let e = ((s - max_val) as f64).exp();
            exps.push(e);
            sum += e;
        }

        for (d, e) in row_dst.iter_mut().zip(exps) {
            *d = (e / sum) as f32;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Shape;

    fn approx_eq(a: &[f32], b: &[f32], tol: f32) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol)
    }

    #[test]
    fn test_softmax_uniform() {
        let input = Tensor::from_slice(Shape::matrix(1, 4), &[1.0, 1.0, 1.0, 1.0]).unwrap();
        let mut output = Tensor::zeros(Shape::matrix(1, 4));

        softmax(&input, &mut output).unwrap();

        assert!(approx_eq(output.as_slice(), &[0.25, 0.25, 0.25, 0.25], 1e-6));
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let input = Tensor::from_slice(
            Shape::matrix(2, 5),
            &[1.0, 2.0, 3.0, 4.0, 5.0, -3.0, 0.5, 12.0, 0.0, 7.25],
        )
        .unwrap();
        let mut output = Tensor::zeros(Shape::matrix(2, 5));

        softmax(&input, &mut output).unwrap();

        for row in output.rows() {
            let sum: f64 = row.iter().map(|&x| x as f64).sum();
            assert!((sum - 1.0).abs() < 1e-6, "row sum {sum}");
        }
    }

    #[test]
    fn test_softmax_monotonic() {
        let input = Tensor::from_slice(Shape::matrix(1, 3), &[1.0, 2.0, 3.0]).unwrap();
        let mut output = Tensor::zeros(Shape::matrix(1, 3));

        softmax(&input, &mut output).unwrap();

        let r = output.as_slice();
        assert!(r[0] < r[1]);
        assert!(r[1] < r[2]);
    }

    #[test]
    fn test_softmax_numerical_stability() {
        let input = Tensor::from_slice(Shape::matrix(1, 3), &[1000.0, 1001.0, 1002.0]).unwrap();
        let mut output = Tensor::zeros(Shape::matrix(1, 3));

        softmax(&input, &mut output).unwrap();

        let r = output.as_slice();
        assert!(r.iter().all(|&x| x.is_finite()));
        let sum: f32 = r.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_softmax_shape_mismatch() {
        let input = Tensor::zeros(Shape::matrix(2, 3));
        let mut output = Tensor::zeros(Shape::matrix(3, 2));
        assert!(matches!(
            softmax(&input, &mut output),
            Err(TensorError::ShapeMismatch { op: "softmax", .. })
        ));
    }

    #[test]
    fn test_softmax_nan() {
        let input = Tensor::from_slice(Shape::matrix(1, 2), &[f32::NAN, 1.0]).unwrap();
        let mut output = Tensor::zeros(Shape::matrix(1, 2));
        assert!(matches!(
            softmax(&input, &mut output),
            Err(TensorError::Numeric { .. })
        ));
    }

    #[test]
    fn test_softmax_rejects_infinity() {
        let input = Tensor::from_slice(Shape::matrix(1, 2), &[f32::INFINITY, 1.0]).unwrap();
        let mut output = Tensor::zeros(Shape::matrix(1, 2));
        match softmax(&input, &mut output) {
            Err(TensorError::Numeric { op, detail }) => {
                assert_eq!(op, "softmax");
                assert!(detail.contains("inf"), "{detail}");
            }
            other => panic!("expected numeric error, got {other:?}"),
        }

        let input = Tensor::from_slice(Shape::matrix(1, 2), &[0.0, f32::NEG_INFINITY]).unwrap();
        assert!(softmax(&input, &mut output).is_err());
    }
}

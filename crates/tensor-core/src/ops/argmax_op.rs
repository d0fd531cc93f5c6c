// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Row-wise arg-max.

use crate::Tensor;

/// Returns the column index of the largest value in every row.
///
/// Ties resolve to the lowest index. A zero-width tensor yields index 0
/// for each row.
pub fn argmax_rows(input: &Tensor) -> Vec<usize> {
    if input.row_width() == 0 {
        return vec![0; input.num_rows()];
    }
    input
        .rows()
        .map(|row| {
            let mut best = 0;
            for (i, &v) in row.iter().enumerate().skip(1) {
                if v > row[best] {
                    best = i;
                }
            }
            best
        })
        .collect()
}

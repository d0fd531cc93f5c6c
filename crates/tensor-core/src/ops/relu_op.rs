// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Rectified linear activation.

use crate::Tensor;

/// Applies `max(0, x)` element-wise, in place.
///
/// NaN passes through unchanged so that downstream checks still see it.
pub fn relu(tensor: &mut Tensor) {
    for x in tensor.as_mut_slice() {
        if *x < 0.0 {
            *x = 0.0;
        }
    }
}

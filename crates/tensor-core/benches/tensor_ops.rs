// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for the row-wise tensor operations on serving-sized batches.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tensor_core::{argmax_rows, linear, softmax, Shape, Tensor};

fn batch(rows: usize, width: usize) -> Tensor {
    let data: Vec<f32> = (0..rows * width).map(|i| (i % 17) as f32 * 0.1 - 0.8).collect();
    Tensor::from_vec(Shape::matrix(rows, width), data).unwrap()
}

fn bench_linear(c: &mut Criterion) {
    let x = batch(64, 128);
    let w = batch(128, 128);
    let b = Tensor::zeros(Shape::vector(128));
    c.bench_function("linear 64x128 @ 128x128", |bench| {
        bench.iter(|| linear(black_box(&x), black_box(&w), black_box(&b)).unwrap())
    });
}

fn bench_softmax_argmax(c: &mut Criterion) {
    let scores = batch(256, 5);
    c.bench_function("softmax+argmax 256x5", |bench| {
        bench.iter(|| {
            let mut probs = Tensor::zeros(scores.shape().clone());
            softmax(black_box(&scores), &mut probs).unwrap();
            argmax_rows(&probs)
        })
    });
}

fn bench_concat_rows(c: &mut Criterion) {
    let parts: Vec<Tensor> = (0..32).map(|_| batch(4, 10)).collect();
    c.bench_function("concat_rows 32 x [4, 10]", |bench| {
        bench.iter(|| Tensor::concat_rows(black_box(&parts)).unwrap())
    });
}

criterion_group!(benches, bench_linear, bench_softmax_argmax, bench_concat_rows);
criterion_main!(benches);

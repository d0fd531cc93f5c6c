// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `infer-serve predict` command: one local prediction through the same
//! shaper and dispatcher the server uses.

use serve_runtime::{InferenceRequest, ServeConfig, Service};
use std::path::PathBuf;
use std::time::Instant;

pub async fn execute(
    mut config: ServeConfig,
    values: Vec<f32>,
    batch_size: usize,
    probabilities: bool,
    model: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(model) = model {
        config.model_path = model;
    }

    let service = Service::with_system_probe(config)?;
    service.load_model_async().await?;

    let mut request = InferenceRequest::new(values).with_batch_size(batch_size);
    request.return_probabilities = probabilities;

    let started = Instant::now();
    let result = service.dispatcher().predict(&request).await?;
    let elapsed = started.elapsed();

    let output = serde_json::json!({
        "prediction": result.predictions,
        "probabilities": result.probabilities,
        "processing_time": elapsed.as_secs_f64(),
        "model_version": service.config().model_version,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

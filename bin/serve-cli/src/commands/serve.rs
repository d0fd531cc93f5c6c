// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `infer-serve serve` command: run the HTTP server.
//!
//! The listener comes up first; the model is loaded on a blocking thread
//! afterwards, so `/health` answers while `/predict` still returns 503.

use serve_http::AppState;
use serve_runtime::{ServeConfig, Service};
use std::path::PathBuf;

/// Flag values that take precedence over the file and environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub model: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub workers: Option<usize>,
    pub queue: Option<usize>,
    pub policy: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl Overrides {
    fn apply(self, mut config: ServeConfig) -> anyhow::Result<ServeConfig> {
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(queue) = self.queue {
            config.queue_capacity = queue;
        }
        if let Some(policy) = self.policy {
            config.compute_policy = policy.parse()?;
        }
        if let Some(ms) = self.timeout_ms {
            config.request_timeout_ms = Some(ms);
        }
        Ok(config)
    }
}

pub async fn execute(config: ServeConfig, overrides: Overrides) -> anyhow::Result<()> {
    let config = overrides.apply(config)?;
    let addr = config.bind_addr();

    tracing::info!(
        "starting inference server: model '{}', {} workers, queue {}, policy {}",
        config.model_path.display(),
        config.workers,
        config.queue_capacity,
        config.compute_policy,
    );

    let service = Service::with_system_probe(config)?;

    let loader = service.clone();
    tokio::spawn(async move {
        // Failures are recorded in the service state and logged there.
        let _ = loader.load_model_async().await;
    });

    serve_http::serve(&addr, AppState::new(service)).await
}

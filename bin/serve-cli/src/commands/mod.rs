// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared setup.

pub mod predict;
pub mod serve;
pub mod status;

use anyhow::Context;
use serve_runtime::ServeConfig;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},hyper=warn,h2=warn,tower_http={}",
            if verbose >= 2 { "debug" } else { "info" }
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose >= 3)
        .init();
}

/// Reads the config file (if any), then applies `MODEL_PATH` and `PORT`.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ServeConfig> {
    let config = match path {
        Some(p) => ServeConfig::from_file(p)
            .with_context(|| format!("loading configuration from {}", p.display()))?,
        None => ServeConfig::default(),
    };
    Ok(config.apply_env()?)
}

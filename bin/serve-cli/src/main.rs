// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # infer-serve
//!
//! Command-line interface for the inference server.
//!
//! ## Usage
//! ```bash
//! # Start the HTTP server
//! infer-serve serve --model ./models/classifier.safetensors --port 8080
//!
//! # One-shot local prediction
//! infer-serve predict --values 0.1,0.2,0.3,0.4,0.5,0.6,0.7,0.8,0.9,1.0 --probabilities
//!
//! # Host and service status
//! infer-serve -c serve.toml status
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "infer-serve",
    about = "Synchronous and batched model inference over HTTP",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file. Flags override its values.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server. The model loads in the background.
    Serve {
        /// Path to the SafeTensors model artifact.
        #[arg(short, long)]
        model: Option<std::path::PathBuf>,

        /// Listening address.
        #[arg(long)]
        host: Option<String>,

        /// Listening port.
        #[arg(short, long)]
        port: Option<u16>,

        /// Number of compute workers.
        #[arg(short, long)]
        workers: Option<usize>,

        /// Requests allowed to wait for a worker before new ones are rejected.
        #[arg(short, long)]
        queue: Option<usize>,

        /// Compute policy: serialized or concurrent.
        #[arg(long)]
        policy: Option<String>,

        /// Per-batch deadline in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Display host telemetry and service configuration.
    Status,

    /// Run one prediction locally and print the result as JSON.
    Predict {
        /// Comma-separated input values.
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        values: Vec<f32>,

        /// Number of rows the values are split into.
        #[arg(short, long, default_value_t = 1)]
        batch_size: usize,

        /// Include per-class probabilities.
        #[arg(long)]
        probabilities: bool,

        /// Path to the SafeTensors model artifact.
        #[arg(short, long)]
        model: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            model,
            host,
            port,
            workers,
            queue,
            policy,
            timeout_ms,
        } => {
            let overrides = commands::serve::Overrides {
                model,
                host,
                port,
                workers,
                queue,
                policy,
                timeout_ms,
            };
            commands::serve::execute(config, overrides).await
        }
        Commands::Status => commands::status::execute(config).await,
        Commands::Predict {
            values,
            batch_size,
            probabilities,
            model,
        } => commands::predict::execute(config, values, batch_size, probabilities, model).await,
    }
}

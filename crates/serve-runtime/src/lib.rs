// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # serve-runtime
//!
//! The serving core behind the inference server.
//!
//! A request flows through four stages:
//! 1. The **shaper** validates the flat input and reshapes it into a
//!    `[rows, features]` batch, optionally merging several requests.
//! 2. The **dispatcher** admits the batch into a bounded queue and runs
//!    the compute unit on a blocking worker.
//! 3. Raw scores are post-processed with a row-wise softmax and arg-max.
//! 4. The shaper splits the result back into one result per request.
//!
//! Alongside, [`ServiceState`] tracks the one-way
//! `UNINITIALIZED → READY` lifecycle, [`HealthAggregator`] merges it with
//! host telemetry, and [`MetricsExporter`] renders both plus the dispatcher
//! counters as plain text.
//!
//! # Example
//! ```no_run
//! use serve_runtime::{InferenceRequest, ServeConfig, Service};
//!
//! # async fn example() -> Result<(), serve_runtime::ServeError> {
//! let service = Service::with_system_probe(ServeConfig::default())?;
//! service.load_model_async().await?;
//! let result = service
//!     .dispatcher()
//!     .predict(&InferenceRequest::new(vec![0.0; 10]))
//!     .await?;
//! println!("class {}", result.predictions[0]);
//! # Ok(())
//! # }
//! ```

mod compute;
mod config;
mod dispatcher;
mod error;
mod health;
mod metrics;
mod service;
pub mod shaper;
mod state;
mod weights;

pub use compute::{ComputePolicy, ComputeUnit, DenseClassifier, DenseLayer, ModelInfo};
pub use config::{ServeConfig, ENV_MODEL_PATH, ENV_PORT};
pub use dispatcher::{post_process, DispatchCounters, Dispatcher, DispatcherConfig};
pub use error::{ComputeError, ServeError, ShapeError};
pub use health::{HealthAggregator, HealthSnapshot};
pub use metrics::MetricsExporter;
pub use service::Service;
pub use shaper::{shape, shape_many, unshape, InferenceRequest, InferenceResult, RowOwner, ShapedBatch};
pub use state::{DeviceDescriptor, Lifecycle, ServiceState};
pub use weights::WeightLoader;

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Wiring of the serving core: one state, one dispatcher, one health
//! aggregator, one metrics exporter.

use crate::{
    ComputeUnit, Dispatcher, DispatcherConfig, HealthAggregator, HealthSnapshot, MetricsExporter,
    ServeConfig, ServeError, ServiceState, WeightLoader,
};
use resource_monitor::{SystemProbe, TelemetryProbe};
use std::sync::Arc;
use std::time::Instant;
use tensor_core::{Shape, Tensor};

/// The assembled serving core. Cloning shares everything.
#[derive(Clone)]
pub struct Service {
    config: Arc<ServeConfig>,
    state: Arc<ServiceState>,
    dispatcher: Dispatcher,
    health: HealthAggregator,
    metrics: MetricsExporter,
}

impl Service {
    /// Builds the service in `UNINITIALIZED` with the given telemetry probe.
    pub fn new(config: ServeConfig, probe: Arc<dyn TelemetryProbe>) -> Result<Self, ServeError> {
        config.validate()?;
        let state = Arc::new(ServiceState::new(config.device_descriptor()?));
        let dispatcher = Dispatcher::new(Arc::clone(&state), DispatcherConfig::from(&config));
        let health = HealthAggregator::new(Arc::clone(&state), probe);
        let metrics = MetricsExporter::new(config.model_version.clone());
        Ok(Self {
            config: Arc::new(config),
            state,
            dispatcher,
            health,
            metrics,
        })
    }

    /// Builds the service reading host telemetry from procfs and sysfs.
    pub fn with_system_probe(config: ServeConfig) -> Result<Self, ServeError> {
        let probe = Arc::new(SystemProbe::new(config.cpu_sample_interval()));
        Self::new(config, probe)
    }

    /// Loads the model, runs a warm-up row, and moves the state to `READY`.
    ///
    /// Blocks the calling thread. On failure the state stays
    /// `UNINITIALIZED` for the rest of the process lifetime.
    pub fn load_model(&self) -> Result<(), ServeError> {
        let started = Instant::now();
        match self.build_compute_unit() {
            Ok(unit) => {
                self.state.mark_ready(unit)?;
                tracing::info!(
                    "model loaded in {:.1}ms",
                    started.elapsed().as_secs_f64() * 1000.0
                );
                Ok(())
            }
            Err(e) => {
                self.state.record_load_failure(e.to_string());
                Err(e)
            }
        }
    }

    /// [`load_model`](Self::load_model) on a blocking thread.
    pub async fn load_model_async(&self) -> Result<(), ServeError> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.load_model())
            .await
            .map_err(|e| {
                let cause = format!("model loader aborted: {e}");
                self.state.record_load_failure(cause.clone());
                ServeError::Config(cause)
            })?
    }

    /// Current health.
    pub async fn health(&self) -> HealthSnapshot {
        self.health.snapshot_async().await
    }

    /// Current metrics exposition.
    pub async fn metrics_text(&self) -> String {
        let snapshot = self.health.snapshot_async().await;
        self.metrics.render(&snapshot, &self.dispatcher.counters())
    }

    /// Effective configuration.
    pub fn config(&self) -> &ServeConfig {
        &self.config
    }

    /// Shared lifecycle state.
    pub fn state(&self) -> &Arc<ServiceState> {
        &self.state
    }

    /// The request dispatcher. Cheap to clone into tasks.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Health snapshot builder.
    pub fn health_aggregator(&self) -> &HealthAggregator {
        &self.health
    }

    /// Metrics renderer.
    pub fn exporter(&self) -> &MetricsExporter {
        &self.metrics
    }

    fn build_compute_unit(&self) -> Result<Arc<dyn ComputeUnit>, ServeError> {
        let config = &self.config;
        let loader = WeightLoader::new(config.model_path.clone())?;
        let model = loader.load_classifier(&config.layer_dims(), config.synthetic_seed)?;
        let unit = config.compute_policy.apply(Arc::new(model));

        let info = unit.info();
        tracing::info!(
            "{}: {} parameters, layers {:?}, policy {}",
            info.model_type,
            info.total_parameters,
            info.layer_dims,
            config.compute_policy
        );

        let warmup = Tensor::zeros(Shape::matrix(1, info.input_dim()));
        unit.infer(&warmup)?;
        tracing::debug!("warm-up inference completed");
        Ok(unit)
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("state", &self.state)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

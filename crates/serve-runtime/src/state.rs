// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Process-wide service state and its one-way lifecycle.
//!
//! ```text
//! UNINITIALIZED ──mark_ready(model)──▶ READY
//!       │
//!       └──record_load_failure──▶ UNINITIALIZED (permanently)
//! ```
//!
//! The model slot is a [`OnceLock`], so reads after `READY` take no lock.
//! A small mutex serialises the transition itself so that a success and a
//! failure report cannot both be accepted.

use crate::{ComputeUnit, ServeError};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Lifecycle of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// No model is available yet (or loading failed).
    Uninitialized,
    /// The model is loaded and warm.
    Ready,
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifecycle::Uninitialized => write!(f, "uninitialized"),
            Lifecycle::Ready => write!(f, "ready"),
        }
    }
}

/// Where the compute unit runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceDescriptor {
    /// Host CPU.
    Cpu,
    /// An accelerator addressed by ordinal, written `cuda:N`.
    Accelerator(u32),
}

impl DeviceDescriptor {
    /// Whether this descriptor names an accelerator.
    pub fn is_accelerator(&self) -> bool {
        matches!(self, DeviceDescriptor::Accelerator(_))
    }
}

impl std::fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceDescriptor::Cpu => write!(f, "cpu"),
            DeviceDescriptor::Accelerator(n) => write!(f, "cuda:{n}"),
        }
    }
}

impl std::str::FromStr for DeviceDescriptor {
    type Err = ServeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "cpu" {
            return Ok(DeviceDescriptor::Cpu);
        }
        if s == "cuda" {
            return Ok(DeviceDescriptor::Accelerator(0));
        }
        s.strip_prefix("cuda:")
            .and_then(|n| n.parse().ok())
            .map(DeviceDescriptor::Accelerator)
            .ok_or_else(|| ServeError::Config(format!("unknown device '{s}'")))
    }
}

/// Shared state consulted by the dispatcher and the health aggregator.
pub struct ServiceState {
    model: OnceLock<Arc<dyn ComputeUnit>>,
    load_failure: OnceLock<String>,
    transition: Mutex<()>,
    device: DeviceDescriptor,
    started_at: Instant,
}

impl ServiceState {
    /// Creates the state in `UNINITIALIZED`. Uptime starts now.
    pub fn new(device: DeviceDescriptor) -> Self {
        Self {
            model: OnceLock::new(),
            load_failure: OnceLock::new(),
            transition: Mutex::new(()),
            device,
            started_at: Instant::now(),
        }
    }

    /// Publishes the loaded model and moves to `READY`.
    ///
    /// # Errors
    /// [`ServeError::AlreadyInitialized`] if a model was already published
    /// or a load failure was already recorded.
    pub fn mark_ready(&self, model: Arc<dyn ComputeUnit>) -> Result<(), ServeError> {
        let _guard = self.transition.lock();
        if self.load_failure.get().is_some() {
            return Err(ServeError::AlreadyInitialized);
        }
        self.model
            .set(model)
            .map_err(|_| ServeError::AlreadyInitialized)?;
        tracing::info!("service state: ready on {}", self.device);
        Ok(())
    }

    /// Records that loading failed. The service stays `UNINITIALIZED`.
    ///
    /// Only the first report is kept.
    pub fn record_load_failure(&self, cause: impl Into<String>) {
        let _guard = self.transition.lock();
        if self.model.get().is_some() {
            tracing::warn!("service state: load failure reported after ready; ignored");
            return;
        }
        let cause = cause.into();
        tracing::error!("model load failed: {cause}");
        let _ = self.load_failure.set(cause);
    }

    /// Current lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        if self.model.get().is_some() {
            Lifecycle::Ready
        } else {
            Lifecycle::Uninitialized
        }
    }

    /// Whether a model has been published.
    pub fn model_loaded(&self) -> bool {
        self.lifecycle() == Lifecycle::Ready
    }

    /// The published model, if any.
    pub fn compute_unit(&self) -> Option<Arc<dyn ComputeUnit>> {
        self.model.get().cloned()
    }

    /// The recorded load failure, if any.
    pub fn load_failure(&self) -> Option<&str> {
        self.load_failure.get().map(String::as_str)
    }

    /// Configured device.
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// Time since the state was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl std::fmt::Debug for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceState")
            .field("lifecycle", &self.lifecycle())
            .field("device", &self.device)
            .field("load_failure", &self.load_failure())
            .finish()
    }
}

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Server configuration loaded from TOML files, the environment, or built
//! programmatically.
//!
//! # TOML Format
//! ```toml
//! model_path = "./models/classifier.safetensors"
//! host = "0.0.0.0"
//! port = 8080
//! workers = 4
//! queue_capacity = 64
//! compute_policy = "serialized"
//! request_timeout_ms = 5000
//! ```
//!
//! Every key is optional. After the file is read, `MODEL_PATH` and `PORT`
//! from the environment take precedence.

use crate::{ComputePolicy, DeviceDescriptor, ServeError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the model artifact.
pub const ENV_MODEL_PATH: &str = "MODEL_PATH";
/// Environment variable naming the listening port.
pub const ENV_PORT: &str = "PORT";

/// Configuration for the inference server.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Path to the SafeTensors model artifact.
    pub model_path: PathBuf,
    /// Listening address.
    pub host: String,
    /// Listening port.
    pub port: u16,
    /// Number of compute worker slots.
    pub workers: usize,
    /// Submissions allowed to wait for a worker before new ones are rejected.
    pub queue_capacity: usize,
    /// Whether compute calls are serialised or run concurrently.
    pub compute_policy: ComputePolicy,
    /// Per-batch deadline in milliseconds. No deadline when absent.
    pub request_timeout_ms: Option<u64>,
    /// Device descriptor reported by health and model info, e.g. `"cpu"`.
    pub device: String,
    /// Version string reported to clients.
    pub model_version: String,
    /// Model input width.
    pub input_dim: usize,
    /// Hidden layer width.
    pub hidden_dim: usize,
    /// Number of output classes.
    pub output_dim: usize,
    /// Seed for synthetic weights when no artifact exists.
    pub synthetic_seed: u64,
    /// CPU sampling window for health probes, in milliseconds.
    pub cpu_sample_ms: u64,
}

impl ServeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ServeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ServeError> {
        toml::from_str(toml_str).map_err(|e| ServeError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, ServeError> {
        toml::to_string_pretty(self)
            .map_err(|e| ServeError::Config(format!("TOML serialise error: {e}")))
    }

    /// Applies `MODEL_PATH` and `PORT` from the process environment.
    pub fn apply_env(self) -> Result<Self, ServeError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup.
    pub fn apply_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ServeError> {
        if let Some(path) = lookup(ENV_MODEL_PATH) {
            self.model_path = PathBuf::from(path);
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ServeError::Config(format!("invalid {ENV_PORT} '{port}'")))?;
        }
        Ok(self)
    }

    /// Checks that the configuration can start a server.
    pub fn validate(&self) -> Result<(), ServeError> {
        if self.workers == 0 {
            return Err(ServeError::Config("workers must be at least 1".into()));
        }
        if self.input_dim == 0 || self.hidden_dim == 0 || self.output_dim == 0 {
            return Err(ServeError::Config("model dimensions must be non-zero".into()));
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ServeError::Config("request_timeout_ms must be positive".into()));
        }
        self.device_descriptor()?;
        Ok(())
    }

    /// `host:port` for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-batch deadline.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Layer widths of the dense classifier, input first.
    pub fn layer_dims(&self) -> [usize; 4] {
        [self.input_dim, self.hidden_dim, self.hidden_dim, self.output_dim]
    }

    /// Parses the configured device string.
    pub fn device_descriptor(&self) -> Result<DeviceDescriptor, ServeError> {
        self.device.parse()
    }

    /// CPU sampling window for health probes.
    pub fn cpu_sample_interval(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_ms)
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model.safetensors"),
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: 4,
            queue_capacity: 64,
            compute_policy: ComputePolicy::Serialized,
            request_timeout_ms: None,
            device: "cpu".to_string(),
            model_version: "1.0.0".to_string(),
            input_dim: 10,
            hidden_dim: 128,
            output_dim: 5,
            synthetic_seed: 42,
            cpu_sample_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = ServeConfig::default();
        assert_eq!(c.port, 8080);
        assert_eq!(c.workers, 4);
        assert_eq!(c.compute_policy, ComputePolicy::Serialized);
        assert_eq!(c.layer_dims(), [10, 128, 128, 5]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
model_path = "/srv/models/clf.safetensors"
port = 9000
workers = 2
compute_policy = "concurrent"
request_timeout_ms = 250
"#;
        let c = ServeConfig::from_toml(toml).unwrap();
        assert_eq!(c.model_path, PathBuf::from("/srv/models/clf.safetensors"));
        assert_eq!(c.port, 9000);
        assert_eq!(c.workers, 2);
        assert_eq!(c.compute_policy, ComputePolicy::Concurrent);
        assert_eq!(c.request_timeout(), Some(Duration::from_millis(250)));
        // Unspecified keys keep their defaults.
        assert_eq!(c.queue_capacity, 64);
        assert_eq!(c.host, "0.0.0.0");
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(matches!(
            ServeConfig::from_toml("workers = \"many\""),
            Err(ServeError::Config(_))
        ));
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = ServeConfig {
            request_timeout_ms: Some(1000),
            ..Default::default()
        };
        let back = ServeConfig::from_toml(&c.to_toml().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_env_overrides() {
        let c = ServeConfig::default()
            .apply_env_from(|key| match key {
                ENV_MODEL_PATH => Some("/tmp/m.safetensors".into()),
                ENV_PORT => Some("9090".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(c.model_path, PathBuf::from("/tmp/m.safetensors"));
        assert_eq!(c.port, 9090);
        assert_eq!(c.bind_addr(), "0.0.0.0:9090");
    }

    #[test]
    fn test_env_invalid_port() {
        let result = ServeConfig::default().apply_env_from(|key| {
            (key == ENV_PORT).then(|| "eighty".to_string())
        });
        assert!(matches!(result, Err(ServeError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let c = ServeConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let c = ServeConfig {
            request_timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_device() {
        let c = ServeConfig {
            device: "cuda:x".into(),
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }
}

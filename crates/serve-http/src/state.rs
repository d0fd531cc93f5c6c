// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Shared state handed to every handler.

use serve_runtime::Service;

/// Shared state for the inference server.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The serving core. Cloning shares it.
    pub service: Service,
}

impl AppState {
    pub fn new(service: Service) -> Self {
        Self { service }
    }

    /// Version string reported to clients.
    pub fn model_version(&self) -> &str {
        &self.service.config().model_version
    }
}

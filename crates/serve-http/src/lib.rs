// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # serve-http
//!
//! HTTP surface of the inference server.
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /` | [`api::root`] |
//! | `GET /health` | [`health::health`] |
//! | `GET /metrics` | [`health::metrics`] |
//! | `POST /predict` | [`api::predict`] |
//! | `POST /batch_predict` | [`api::batch_predict`] |
//! | `GET /model/info` | [`api::model_info`] |

pub mod api;
pub mod error;
pub mod health;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::{build_router, serve};
pub use state::AppState;

// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Mapping of serving errors onto HTTP responses.
//!
//! Every error body is `{"detail": "..."}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serve_runtime::ServeError;

/// An error ready to be sent to the client.
#[derive(Debug, thiserror::Error)]
#[error("{status}: {detail}")]
pub struct ApiError {
    /// Response status.
    pub status: StatusCode,
    /// Value of the `detail` field in the body.
    pub detail: String,
}

impl ApiError {
    /// Builds an error with an explicit status.
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Maps a failure of `/predict`. Validation problems are client errors.
    pub fn predict(err: ServeError) -> Self {
        match err {
            ServeError::Validation(e) => Self::new(StatusCode::BAD_REQUEST, capitalise(&e.to_string())),
            other => Self::common(other, "Prediction failed"),
        }
    }

    /// Maps a failure of `/batch_predict`, where a batch that cannot be
    /// assembled is reported as a server error.
    pub fn batch(err: ServeError) -> Self {
        match err {
            ServeError::Validation(e) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Batch prediction failed: {e}"),
            ),
            other => Self::common(other, "Batch prediction failed"),
        }
    }

    /// Maps a body that could not be decoded.
    pub fn malformed(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }

    /// `503` returned while the model is still loading or failed to load.
    pub fn model_not_loaded() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Model not loaded")
    }

    fn common(err: ServeError, context: &str) -> Self {
        match err {
            ServeError::ModelUnavailable => Self::model_not_loaded(),
            e @ ServeError::Overloaded { .. } => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, capitalise(&e.to_string()))
            }
            ServeError::InferenceFailure { cause } => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{context}: {cause}"),
            ),
            other => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{context}: {other}"),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{}", self);
        }
        let body = serde_json::json!({ "detail": self.detail });
        (self.status, Json(body)).into_response()
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

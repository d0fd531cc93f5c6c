// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Inference API types and handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serve_runtime::InferenceRequest;
use std::time::Instant;

use crate::error::ApiError;
use crate::state::AppState;

/// Reported in `/model/info`.
pub const FRAMEWORK: &str = concat!("serve-runtime ", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Response types
// ============================================================================

/// Body of `GET /`.
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
}

/// Body of `POST /predict`.
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    /// Arg-max class per row.
    pub prediction: Vec<usize>,
    /// Per-row class probabilities, `null` unless requested.
    pub probabilities: Option<Vec<Vec<f32>>>,
    /// Seconds.
    pub processing_time: f64,
    pub model_version: String,
}

/// One request's slice of a batch response.
#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub prediction: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<Vec<f32>>>,
    /// Seconds since the batch request arrived.
    pub processing_time: f64,
}

/// Body of `POST /batch_predict`, results in request order.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
    pub total_processing_time: f64,
}

/// Body of `GET /model/info`.
#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model_type: String,
    pub total_parameters: usize,
    pub trainable_parameters: usize,
    pub device: String,
    pub model_version: String,
    pub framework: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// `GET /`: service banner.
pub async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: "ML Model Inference API".to_string(),
        version: state.model_version().to_string(),
    })
}

/// `POST /predict`: one request, possibly several rows.
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<InferenceRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let started = Instant::now();
    let Json(request) = payload.map_err(ApiError::malformed)?;

    let result = state
        .service
        .dispatcher()
        .predict(&request)
        .await
        .map_err(ApiError::predict)?;

    Ok(Json(PredictionResponse {
        prediction: result.predictions,
        probabilities: result.probabilities,
        processing_time: started.elapsed().as_secs_f64(),
        model_version: state.model_version().to_string(),
    }))
}

/// `POST /batch_predict`: requests are merged into one batch.
///
/// Any request that cannot join the batch fails the whole call with 500.
pub async fn batch_predict(
    State(state): State<AppState>,
    payload: Result<Json<Vec<InferenceRequest>>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let started = Instant::now();
    let Json(requests) = payload.map_err(ApiError::malformed)?;

    let parts = state
        .service
        .dispatcher()
        .predict_many(&requests)
        .await
        .map_err(ApiError::batch)?;

    let results = parts
        .into_iter()
        .map(|part| BatchItem {
            prediction: part.predictions,
            probabilities: part.probabilities,
            processing_time: started.elapsed().as_secs_f64(),
        })
        .collect();

    Ok(Json(BatchResponse {
        results,
        total_processing_time: started.elapsed().as_secs_f64(),
    }))
}

/// `GET /model/info`: 503 until the model is ready.
pub async fn model_info(
    State(state): State<AppState>,
) -> Result<Json<ModelInfoResponse>, ApiError> {
    let unit = state
        .service
        .state()
        .compute_unit()
        .ok_or_else(ApiError::model_not_loaded)?;
    let info = unit.info();

    Ok(Json(ModelInfoResponse {
        model_type: info.model_type,
        total_parameters: info.total_parameters,
        trainable_parameters: info.trainable_parameters,
        device: state.service.state().device().to_string(),
        model_version: state.model_version().to_string(),
        framework: FRAMEWORK.to_string(),
    }))
}

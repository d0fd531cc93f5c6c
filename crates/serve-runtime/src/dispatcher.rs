// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Bounded offloading of compute to blocking workers.
//!
//! ```text
//!  submit ──▶ admission (workers + queue permits, try_acquire) ──full──▶ Overloaded
//!                 │
//!                 ▼
//!            worker pool (workers permits, acquire) ──▶ spawn_blocking
//!                                                          │
//!                                       infer ─▶ softmax ─▶ argmax
//! ```
//!
//! Both permits travel into the blocking closure, so a slot is released
//! only when the compute unit actually returns, even if the caller stopped
//! waiting because of a deadline.

use crate::shaper::{self, InferenceRequest, InferenceResult, ShapedBatch};
use crate::{ComputeError, ServeConfig, ServeError, ServiceState};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tensor_core::{argmax_rows, softmax, Tensor};
use tokio::sync::Semaphore;

/// Pool sizing and deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Concurrent compute slots.
    pub workers: usize,
    /// Submissions allowed to wait for a slot.
    pub queue_capacity: usize,
    /// Per-batch deadline.
    pub timeout: Option<Duration>,
}

impl From<&ServeConfig> for DispatcherConfig {
    fn from(config: &ServeConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            queue_capacity: config.queue_capacity,
            timeout: config.request_timeout(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&ServeConfig::default())
    }
}

/// Point-in-time copy of the dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct DispatchCounters {
    /// Client requests that reached compute and succeeded.
    pub requests_total: u64,
    /// Batches that completed.
    pub batches_total: u64,
    /// Rows scored.
    pub rows_total: u64,
    /// Batches that failed in compute, panicked, or timed out.
    pub failures_total: u64,
    /// Submissions rejected because the queue was full.
    pub rejected_total: u64,
    /// Cumulative compute time of completed batches.
    pub processing_seconds_total: f64,
    /// Batches currently running on a worker.
    pub in_flight: usize,
    /// Batches admitted but waiting for a worker.
    pub queued: usize,
}

#[derive(Default)]
struct DispatchStats {
    requests: AtomicU64,
    batches: AtomicU64,
    rows: AtomicU64,
    failures: AtomicU64,
    rejected: AtomicU64,
    processing_nanos: AtomicU64,
    in_flight: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
}

/// Increments a gauge for as long as it lives.
struct GaugeGuard(Arc<AtomicUsize>);

impl GaugeGuard {
    fn enter(gauge: &Arc<AtomicUsize>) -> Self {
        gauge.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(gauge))
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

struct Inner {
    state: Arc<ServiceState>,
    workers: Arc<Semaphore>,
    admission: Arc<Semaphore>,
    config: DispatcherConfig,
    stats: DispatchStats,
}

/// Hands shaped batches to the compute unit on blocking workers.
///
/// Cloning is cheap; clones share the pool and counters.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Creates a dispatcher over `state`.
    pub fn new(state: Arc<ServiceState>, config: DispatcherConfig) -> Self {
        let workers = config.workers.max(1);
        tracing::info!(
            "dispatcher: {workers} workers, queue capacity {}, timeout {:?}",
            config.queue_capacity,
            config.timeout
        );
        Self {
            inner: Arc::new(Inner {
                state,
                workers: Arc::new(Semaphore::new(workers)),
                admission: Arc::new(Semaphore::new(workers + config.queue_capacity)),
                config,
                stats: DispatchStats::default(),
            }),
        }
    }

    /// The shared service state.
    pub fn state(&self) -> &Arc<ServiceState> {
        &self.inner.state
    }

    /// Pool sizing in effect.
    pub fn config(&self) -> DispatcherConfig {
        self.inner.config
    }

    /// Runs one batch and returns its result, rows in batch order.
    ///
    /// # Errors
    /// - [`ServeError::ModelUnavailable`] before the state is `READY`.
    /// - [`ServeError::Overloaded`] when every worker is busy and the queue
    ///   is full.
    /// - [`ServeError::InferenceFailure`] when compute fails, panics, or
    ///   misses the deadline.
    pub async fn submit(&self, batch: ShapedBatch) -> Result<InferenceResult, ServeError> {
        let inner = &self.inner;
        let model = inner
            .state
            .compute_unit()
            .ok_or(ServeError::ModelUnavailable)?;

        let admission = Arc::clone(&inner.admission)
            .try_acquire_owned()
            .map_err(|_| {
                inner.stats.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    "dispatcher: rejecting batch of {} rows, queue full",
                    batch.num_rows()
                );
                ServeError::Overloaded {
                    capacity: inner.config.queue_capacity,
                }
            })?;

        let queued = GaugeGuard::enter(&inner.stats.queued);
        let worker = Arc::clone(&inner.workers)
            .acquire_owned()
            .await
            .map_err(|_| ServeError::InferenceFailure {
                cause: "worker pool closed".into(),
            })?;
        drop(queued);

        let rows = batch.num_rows();
        let requests = batch.owners.len() as u64;
        let with_probabilities = batch.wants_probabilities();
        let in_flight = GaugeGuard::enter(&inner.stats.in_flight);
        tracing::debug!("dispatcher: running batch of {rows} rows");

        let handle = tokio::task::spawn_blocking(move || {
            let _slots = (admission, worker, in_flight);
            let started = Instant::now();
            let outcome = model
                .infer(&batch.tensor)
                .and_then(|scores| post_process(&scores, rows, with_probabilities));
            (outcome, started.elapsed())
        });

        let joined = match inner.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    let cause = format!("timed out after {}ms", limit.as_millis());
                    return Err(self.fail(cause));
                }
            },
            None => handle.await,
        };

        let (outcome, elapsed) = joined.map_err(|e| {
            if e.is_panic() {
                self.fail("compute worker panicked".to_string())
            } else {
                self.fail("compute worker cancelled".to_string())
            }
        })?;

        match outcome {
            Ok(result) => {
                let stats = &inner.stats;
                stats.batches.fetch_add(1, Ordering::Relaxed);
                stats.requests.fetch_add(requests, Ordering::Relaxed);
                stats.rows.fetch_add(rows as u64, Ordering::Relaxed);
                stats
                    .processing_nanos
                    .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
                tracing::debug!(
                    "dispatcher: batch of {rows} rows done in {:.3}ms",
                    elapsed.as_secs_f64() * 1000.0
                );
                Ok(result)
            }
            Err(e) => Err(self.fail(e.to_string())),
        }
    }

    /// Shapes, runs, and unshapes a single request.
    ///
    /// Readiness is checked before the request is validated.
    pub async fn predict(&self, request: &InferenceRequest) -> Result<InferenceResult, ServeError> {
        self.ensure_ready()?;
        let batch = shaper::shape(request).inspect_err(|e| {
            tracing::debug!("rejecting request: {e}");
        })?;
        let owners = batch.owners.clone();
        let result = self.submit(batch).await?;
        let mut parts = shaper::unshape(result, &owners);
        tracing::info!(
            "prediction completed: {} values, {} rows",
            request.input_data.len(),
            request.batch_size
        );
        Ok(parts.swap_remove(0))
    }

    /// Merges several requests into one batch and splits the result back,
    /// one entry per request in input order.
    pub async fn predict_many(
        &self,
        requests: &[InferenceRequest],
    ) -> Result<Vec<InferenceResult>, ServeError> {
        self.ensure_ready()?;
        let batch = shaper::shape_many(requests).inspect_err(|e| {
            tracing::debug!("rejecting batch request: {e}");
        })?;
        let owners = batch.owners.clone();
        let rows = batch.num_rows();
        let result = self.submit(batch).await?;
        tracing::info!(
            "batch prediction completed: {} requests, {rows} rows",
            requests.len()
        );
        Ok(shaper::unshape(result, &owners))
    }

    /// Snapshot of the counters and gauges.
    pub fn counters(&self) -> DispatchCounters {
        let s = &self.inner.stats;
        DispatchCounters {
            requests_total: s.requests.load(Ordering::Relaxed),
            batches_total: s.batches.load(Ordering::Relaxed),
            rows_total: s.rows.load(Ordering::Relaxed),
            failures_total: s.failures.load(Ordering::Relaxed),
            rejected_total: s.rejected.load(Ordering::Relaxed),
            processing_seconds_total: Duration::from_nanos(s.processing_nanos.load(Ordering::Relaxed))
                .as_secs_f64(),
            in_flight: s.in_flight.load(Ordering::Relaxed),
            queued: s.queued.load(Ordering::Relaxed),
        }
    }

    fn ensure_ready(&self) -> Result<(), ServeError> {
        if self.inner.state.model_loaded() {
            Ok(())
        } else {
            Err(ServeError::ModelUnavailable)
        }
    }

    fn fail(&self, cause: String) -> ServeError {
        self.inner.stats.failures.fetch_add(1, Ordering::Relaxed);
        tracing::error!("inference failed: {cause}");
        ServeError::InferenceFailure { cause }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.inner.config)
            .field("counters", &self.counters())
            .finish()
    }
}

/// Converts raw scores into predictions: softmax per row, then arg-max.
///
/// `expected_rows` guards against a compute unit that drops or adds rows.
pub fn post_process(
    scores: &Tensor,
    expected_rows: usize,
    with_probabilities: bool,
) -> Result<InferenceResult, ComputeError> {
    if scores.num_rows() != expected_rows {
        return Err(ComputeError::Backend(format!(
            "compute unit returned {} rows for {expected_rows} inputs",
            scores.num_rows()
        )));
    }
    let mut probabilities = Tensor::zeros(scores.shape().clone());
    softmax(scores, &mut probabilities)?;
    Ok(InferenceResult {
        predictions: argmax_rows(&probabilities),
        probabilities: with_probabilities.then(|| probabilities.to_rows()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComputeUnit, DenseClassifier, DeviceDescriptor, ModelInfo};
    use tensor_core::Shape;

    /// Echoes its input as scores after sleeping.
    struct SlowEcho(Duration);

    impl ComputeUnit for SlowEcho {
        fn infer(&self, input: &Tensor) -> Result<Tensor, ComputeError> {
            std::thread::sleep(self.0);
            Ok(input.clone())
        }

        fn info(&self) -> ModelInfo {
            ModelInfo {
                model_type: "SlowEcho".into(),
                total_parameters: 0,
                trainable_parameters: 0,
                layer_dims: vec![],
            }
        }
    }

    struct Panicking;

    impl ComputeUnit for Panicking {
        fn infer(&self, _input: &Tensor) -> Result<Tensor, ComputeError> {
            panic!("kernel fault");
        }

        fn info(&self) -> ModelInfo {
            SlowEcho(Duration::ZERO).info()
        }
    }

    fn ready_dispatcher(unit: Arc<dyn ComputeUnit>, config: DispatcherConfig) -> Dispatcher {
        let state = Arc::new(ServiceState::new(DeviceDescriptor::Cpu));
        state.mark_ready(unit).unwrap();
        Dispatcher::new(state, config)
    }

    fn config(workers: usize, queue_capacity: usize, timeout: Option<Duration>) -> DispatcherConfig {
        DispatcherConfig {
            workers,
            queue_capacity,
            timeout,
        }
    }

    #[test]
    fn test_post_process() {
        let scores = Tensor::from_vec(Shape::matrix(2, 3), vec![0.0, 5.0, 1.0, 9.0, 0.0, 0.0]).unwrap();
        let result = post_process(&scores, 2, true).unwrap();
        assert_eq!(result.predictions, vec![1, 0]);
        let probs = result.probabilities.unwrap();
        for row in &probs {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
        assert!(post_process(&scores, 2, false).unwrap().probabilities.is_none());
    }

    #[test]
    fn test_post_process_row_count_mismatch() {
        let scores = Tensor::zeros(Shape::matrix(1, 2));
        assert!(matches!(
            post_process(&scores, 2, false),
            Err(ComputeError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_before_ready() {
        let state = Arc::new(ServiceState::new(DeviceDescriptor::Cpu));
        let dispatcher = Dispatcher::new(Arc::clone(&state), DispatcherConfig::default());
        let batch = shaper::shape(&InferenceRequest::new(vec![0.0; 10])).unwrap();
        assert!(matches!(
            dispatcher.submit(batch.clone()).await,
            Err(ServeError::ModelUnavailable)
        ));

        state
            .mark_ready(Arc::new(DenseClassifier::synthetic(&[10, 5], 3).unwrap()))
            .unwrap();
        let result = dispatcher.submit(batch).await.unwrap();
        assert_eq!(result.predictions.len(), 1);
    }

    #[tokio::test]
    async fn test_predict_checks_readiness_before_shape() {
        let state = Arc::new(ServiceState::new(DeviceDescriptor::Cpu));
        let dispatcher = Dispatcher::new(state, DispatcherConfig::default());
        let empty = InferenceRequest::new(vec![]);
        assert!(matches!(
            dispatcher.predict(&empty).await,
            Err(ServeError::ModelUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_predict_validation_error() {
        let model = Arc::new(DenseClassifier::synthetic(&[10, 5], 3).unwrap());
        let dispatcher = ready_dispatcher(model, DispatcherConfig::default());
        let bad = InferenceRequest::new(vec![1.0, 2.0, 3.0]).with_batch_size(2);
        assert!(matches!(
            dispatcher.predict(&bad).await,
            Err(ServeError::Validation(crate::ShapeError::ShapeMismatch { .. }))
        ));
        assert_eq!(dispatcher.counters().failures_total, 0);
    }

    #[tokio::test]
    async fn test_predict_width_mismatch_is_inference_failure() {
        let model = Arc::new(DenseClassifier::synthetic(&[10, 5], 3).unwrap());
        let dispatcher = ready_dispatcher(model, DispatcherConfig::default());
        let result = dispatcher.predict(&InferenceRequest::new(vec![1.0; 4])).await;
        assert!(matches!(result, Err(ServeError::InferenceFailure { .. })));
        assert_eq!(dispatcher.counters().failures_total, 1);
    }

    #[tokio::test]
    async fn test_predict_many_keeps_ownership() {
        // Echo scores: each row's arg-max is the position of its largest value.
        let dispatcher = ready_dispatcher(
            Arc::new(SlowEcho(Duration::ZERO)),
            DispatcherConfig::default(),
        );
        let a = InferenceRequest::new(vec![1.0, 0.0, 0.0, 1.0]).with_batch_size(2);
        let b = InferenceRequest::new(vec![0.0, 1.0, 1.0, 0.0, 0.0, 1.0])
            .with_batch_size(3)
            .with_probabilities();
        let results = dispatcher.predict_many(&[a, b]).await.unwrap();
        assert_eq!(results[0].predictions, vec![0, 1]);
        assert!(results[0].probabilities.is_none());
        assert_eq!(results[1].predictions, vec![1, 0, 1]);
        assert_eq!(results[1].probabilities.as_ref().map(Vec::len), Some(3));

        let counters = dispatcher.counters();
        assert_eq!(counters.batches_total, 1);
        assert_eq!(counters.requests_total, 2);
        assert_eq!(counters.rows_total, 5);
    }

    #[tokio::test]
    async fn test_timeout_reports_failure() {
        let dispatcher = ready_dispatcher(
            Arc::new(SlowEcho(Duration::from_millis(300))),
            config(1, 4, Some(Duration::from_millis(20))),
        );
        let err = dispatcher
            .predict(&InferenceRequest::new(vec![1.0, 2.0]))
            .await
            .unwrap_err();
        match err {
            ServeError::InferenceFailure { cause } => assert!(cause.contains("timed out")),
            other => panic!("unexpected {other:?}"),
        }
        // The worker keeps its slot until the compute call returns.
        assert_eq!(dispatcher.counters().in_flight, 1);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(dispatcher.counters().in_flight, 0);
    }

    #[tokio::test]
    async fn test_panic_becomes_inference_failure() {
        let dispatcher = ready_dispatcher(Arc::new(Panicking), DispatcherConfig::default());
        let err = dispatcher
            .predict(&InferenceRequest::new(vec![1.0]))
            .await
            .unwrap_err();
        match err {
            ServeError::InferenceFailure { cause } => assert_eq!(cause, "compute worker panicked"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_full_queue_rejects() {
        // One worker, no queue: a second concurrent submission is rejected.
        let dispatcher = ready_dispatcher(
            Arc::new(SlowEcho(Duration::from_millis(300))),
            config(1, 0, None),
        );
        let first = {
            let d = dispatcher.clone();
            tokio::spawn(async move { d.predict(&InferenceRequest::new(vec![1.0])).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = dispatcher.predict(&InferenceRequest::new(vec![1.0])).await;
        assert!(matches!(second, Err(ServeError::Overloaded { capacity: 0 })));
        assert!(first.await.unwrap().is_ok());
        assert_eq!(dispatcher.counters().rejected_total, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queued_requests_wait_for_worker() {
        let dispatcher = ready_dispatcher(
            Arc::new(SlowEcho(Duration::from_millis(50))),
            config(1, 8, None),
        );
        let handles: Vec<_> = (0..5)
            .map(|i| {
                let d = dispatcher.clone();
                tokio::spawn(async move {
                    let mut data = vec![0.0; 5];
                    data[i] = 1.0;
                    d.predict(&InferenceRequest::new(data)).await
                })
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.await.unwrap().unwrap().predictions, vec![i]);
        }
        let counters = dispatcher.counters();
        assert_eq!(counters.batches_total, 5);
        assert_eq!(counters.queued, 0);
        assert_eq!(counters.in_flight, 0);
    }

    #[test]
    fn test_post_process_rejects_infinite_scores() {
        let scores = Tensor::from_slice(Shape::matrix(1, 2), &[f32::INFINITY, 1.0]).unwrap();
        assert!(matches!(
            post_process(&scores, 1, true),
            Err(ComputeError::Tensor(tensor_core::TensorError::Numeric { .. }))
        ));
    }
}

//! Scoring service orchestration: lifecycle, the single scoring path
//! shared by the HTTP API and the stream worker, and batch scoring.

use crate::cache::ResultCache;
use crate::config::AppConfig;
use crate::engine::{ScoreEngine, StandardFeatures};
use crate::error::ScoreError;
use crate::metrics::MetricsAggregator;
use crate::models::{AmountScaler, OnnxModel};
use crate::producer::AlertSink;
use crate::types::{BatchItem, BatchOutcome, FraudAlert, ScoreResult, Transaction};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Service lifecycle.
///
/// `Degraded` is reachable only through a failed (re)load; runtime
/// cache or bus failures never demote the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Uninitialized,
    Loading,
    Ready,
    Degraded,
}

/// Orchestrates engine, cache, metrics and event bus for synchronous,
/// batch and stream-driven scoring.
pub struct ScoringService {
    config: AppConfig,
    state: RwLock<LifecycleState>,
    engine: RwLock<Option<Arc<ScoreEngine>>>,
    cache: ResultCache,
    metrics: Arc<MetricsAggregator>,
    alert_sink: Option<Arc<dyn AlertSink>>,
}

impl ScoringService {
    pub fn new(
        config: AppConfig,
        metrics: Arc<MetricsAggregator>,
        cache: ResultCache,
        alert_sink: Option<Arc<dyn AlertSink>>,
    ) -> Self {
        Self {
            config,
            state: RwLock::new(LifecycleState::Uninitialized),
            engine: RwLock::new(None),
            cache,
            metrics,
            alert_sink,
        }
    }

    /// Load the scoring capability from the configured artifacts.
    ///
    /// On failure the service lands in `Degraded`: health reports
    /// unhealthy and scoring calls fail fast until a later `load`
    /// succeeds.
    pub fn load(&self) -> anyhow::Result<()> {
        self.set_state(LifecycleState::Loading);

        match self.build_engine() {
            Ok(engine) => {
                self.install_engine(engine);
                info!("Scoring engine loaded");
                Ok(())
            }
            Err(e) => {
                self.set_state(LifecycleState::Degraded);
                error!(error = %e, "Engine load failed, service degraded");
                Err(e)
            }
        }
    }

    fn build_engine(&self) -> anyhow::Result<ScoreEngine> {
        let models = &self.config.models;
        let scaler = AmountScaler::load(models.scaler_path())?;
        let model = OnnxModel::load(
            models.model_path(),
            models.onnx_threads,
            self.config.detection.threshold,
        )?;
        Ok(ScoreEngine::new(
            Arc::new(StandardFeatures::new(scaler)),
            Arc::new(model),
        ))
    }

    /// Install an already-built engine and mark the service ready.
    pub fn install_engine(&self, engine: ScoreEngine) {
        *self.engine.write().unwrap() = Some(Arc::new(engine));
        self.set_state(LifecycleState::Ready);
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.write().unwrap() = state;
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read().unwrap()
    }

    pub fn model_loaded(&self) -> bool {
        self.engine.read().unwrap().is_some()
    }

    pub fn engine(&self) -> Option<Arc<ScoreEngine>> {
        self.engine.read().unwrap().clone()
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    /// Score one validated transaction: cache lookup, engine on miss,
    /// write-through, metrics, conditional alert.
    pub async fn score_one(&self, tx: &Transaction) -> Result<ScoreResult, ScoreError> {
        let engine = self.engine().ok_or(ScoreError::ModelUnavailable)?;
        let start = Instant::now();

        let key = tx.fingerprint();
        if let Some(mut hit) = self.cache.get(&key) {
            hit.cached = true;
            return Ok(hit);
        }

        let result = match engine.score(tx) {
            Ok(result) => result,
            Err(e) => {
                self.metrics.record_error();
                return Err(e);
            }
        };

        self.metrics.record_prediction(result.is_fraud, start.elapsed());
        self.cache.put(&key, result.clone());

        if result.is_fraud {
            self.dispatch_alert(tx, &result).await;
        }

        Ok(result)
    }

    /// Parse and score a raw JSON payload. This is the single entry
    /// point shared by the HTTP handler, the batch path and the stream
    /// worker.
    pub async fn score_value(&self, value: &Value) -> Result<ScoreResult, ScoreError> {
        let tx = Transaction::parse(value)?;
        self.score_one(&tx).await
    }

    /// Score a batch of raw payloads independently, in input order.
    ///
    /// A per-item failure becomes an error entry in the manifest; the
    /// batch itself only fails on empty input or a missing model.
    pub async fn score_batch(&self, transactions: &[Value]) -> Result<BatchOutcome, ScoreError> {
        if !self.model_loaded() {
            return Err(ScoreError::ModelUnavailable);
        }
        if transactions.is_empty() {
            return Err(ScoreError::InvalidTransaction(
                "no transactions provided".into(),
            ));
        }

        let mut results = Vec::with_capacity(transactions.len());
        let mut fraud_detected = 0;

        for (index, value) in transactions.iter().enumerate() {
            match self.score_value(value).await {
                Ok(result) => {
                    if result.is_fraud {
                        fraud_detected += 1;
                    }
                    results.push(BatchItem::Scored { index, result });
                }
                Err(e) => {
                    results.push(BatchItem::Failed {
                        index,
                        error: e.to_string(),
                    });
                }
            }
        }

        let total = transactions.len();
        Ok(BatchOutcome {
            total,
            processed: results.len(),
            fraud_detected,
            fraud_rate: fraud_detected as f64 / total as f64,
            results,
        })
    }

    /// Best-effort alert publish. Failures are logged and counted,
    /// never surfaced to the scoring caller.
    async fn dispatch_alert(&self, tx: &Transaction, result: &ScoreResult) {
        let Some(sink) = &self.alert_sink else {
            return;
        };

        let alert = FraudAlert::from_result(tx.external_id.clone(), result);
        if let Err(e) = sink.publish(&alert).await {
            warn!(
                alert_id = %alert.alert_id,
                error = %e,
                "Failed to publish fraud alert"
            );
            self.metrics.record_error();
        }
    }

    /// Drain an inbound stream of transaction payloads until shutdown.
    ///
    /// Each message runs the identical scoring path used by the
    /// synchronous API; a failing message is counted and skipped, never
    /// fatal to the loop. The in-flight message is finished before the
    /// shutdown signal is honored.
    pub async fn run_stream_worker<S>(
        self: Arc<Self>,
        mut messages: S,
        mut shutdown: watch::Receiver<bool>,
    ) where
        S: Stream<Item = Bytes> + Unpin,
    {
        info!("Stream worker started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Stream worker shutting down");
                    break;
                }
                payload = messages.next() => {
                    let Some(payload) = payload else {
                        warn!("Transaction stream closed");
                        break;
                    };
                    self.handle_stream_payload(&payload).await;
                }
            }
        }
    }

    /// Process one streamed payload; shared-path scoring with loop-safe
    /// error handling.
    pub async fn handle_stream_payload(&self, payload: &[u8]) {
        let value: Value = match serde_json::from_slice(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Failed to deserialize streamed transaction");
                self.metrics.record_error();
                return;
            }
        };

        match self.score_value(&value).await {
            Ok(result) => {
                self.metrics.record_stream_message();
                debug!(
                    risk_score = result.probability,
                    is_fraud = result.is_fraud,
                    cached = result.cached,
                    "Streamed transaction scored"
                );
            }
            Err(e) => {
                // Engine failures were already counted inside score_one.
                if matches!(
                    e,
                    ScoreError::InvalidTransaction(_) | ScoreError::ModelUnavailable
                ) {
                    self.metrics.record_error();
                }
                warn!(error = %e, "Failed to score streamed transaction");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStore, ResultCache};
    use crate::models::ThresholdModel;
    use crate::types::RiskLevel;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingSink {
        alerts: Mutex<Vec<FraudAlert>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn publish(&self, alert: &FraudAlert) -> anyhow::Result<()> {
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AlertSink for FailingSink {
        async fn publish(&self, _alert: &FraudAlert) -> anyhow::Result<()> {
            anyhow::bail!("broker unreachable")
        }
    }

    fn service_with(
        probability: f64,
        sink: Option<Arc<dyn AlertSink>>,
    ) -> (Arc<ScoringService>, Arc<MetricsAggregator>) {
        let metrics = Arc::new(MetricsAggregator::new());
        let cache = ResultCache::new(
            Some(Arc::new(MemoryStore::new())),
            Duration::from_secs(60),
            metrics.clone(),
        );
        let service = ScoringService::new(AppConfig::default(), metrics.clone(), cache, sink);
        service.install_engine(ScoreEngine::new(
            Arc::new(StandardFeatures::new(AmountScaler::identity())),
            Arc::new(ThresholdModel::fixed(probability, 0.5)),
        ));
        (Arc::new(service), metrics)
    }

    #[tokio::test]
    async fn test_score_one_idempotent_within_ttl() {
        let (service, metrics) = service_with(0.3, None);
        let payload = json!({"amount": 50.0, "time": 7200.0, "v3": 1.2});

        let first = service.score_value(&payload).await.unwrap();
        assert!(!first.cached);

        let second = service.score_value(&payload).await.unwrap();
        assert!(second.cached);
        assert_eq!(first.probability, second.probability);
        assert_eq!(first.risk_level, second.risk_level);

        let snap = metrics.snapshot();
        assert_eq!(snap.cache_misses, 1);
        assert_eq!(snap.cache_hits, 1);
        // Only the fresh computation counts as a prediction.
        assert_eq!(snap.predictions_total, 1);
    }

    #[tokio::test]
    async fn test_degraded_service_fails_fast() {
        let metrics = Arc::new(MetricsAggregator::new());
        let cache = ResultCache::disabled(metrics.clone());
        let service = ScoringService::new(AppConfig::default(), metrics, cache, None);

        assert_eq!(service.state(), LifecycleState::Uninitialized);
        // No artifacts on disk: load must fail and degrade.
        assert!(service.load().is_err());
        assert_eq!(service.state(), LifecycleState::Degraded);
        assert!(!service.model_loaded());

        let err = service.score_value(&json!({"amount": 1.0})).await.unwrap_err();
        assert!(matches!(err, ScoreError::ModelUnavailable));

        // A later successful load returns to Ready.
        service.install_engine(ScoreEngine::new(
            Arc::new(StandardFeatures::new(AmountScaler::identity())),
            Arc::new(ThresholdModel::fixed(0.1, 0.5)),
        ));
        assert_eq!(service.state(), LifecycleState::Ready);
        assert!(service.score_value(&json!({"amount": 1.0})).await.is_ok());
    }

    #[tokio::test]
    async fn test_fraud_publishes_alert_with_external_id() {
        let sink = Arc::new(RecordingSink {
            alerts: Mutex::new(Vec::new()),
        });
        let (service, _) = service_with(0.92, Some(sink.clone()));

        service
            .score_value(&json!({"amount": 9000.0, "id": "tx_77"}))
            .await
            .unwrap();

        let alerts = sink.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].transaction_id.as_deref(), Some("tx_77"));
        assert_eq!(alerts[0].risk_level, RiskLevel::High);
        assert_eq!(alerts[0].risk_score, 0.92);
    }

    #[tokio::test]
    async fn test_non_fraud_publishes_nothing() {
        let sink = Arc::new(RecordingSink {
            alerts: Mutex::new(Vec::new()),
        });
        let (service, _) = service_with(0.2, Some(sink.clone()));

        service.score_value(&json!({"amount": 5.0})).await.unwrap();
        assert!(sink.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_never_fails_the_call() {
        let (service, metrics) = service_with(0.95, Some(Arc::new(FailingSink)));

        let result = service.score_value(&json!({"amount": 100.0})).await.unwrap();
        assert!(result.is_fraud);
        assert_eq!(result.risk_level, RiskLevel::High);
        assert_eq!(metrics.snapshot().errors_total, 1);
    }

    #[tokio::test]
    async fn test_batch_partial_failure() {
        let (service, _) = service_with(0.9, None);
        let batch = vec![
            json!({"amount": 10.0, "time": 0.0}),
            json!({"amount": "broken"}),
            json!({"amount": 20.0, "time": 60.0}),
        ];

        let outcome = service.score_batch(&batch).await.unwrap();
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.processed, 3);
        assert_eq!(outcome.fraud_detected, 2);
        assert!((outcome.fraud_rate - 2.0 / 3.0).abs() < 1e-9);

        assert!(matches!(outcome.results[0], BatchItem::Scored { index: 0, .. }));
        assert!(matches!(outcome.results[1], BatchItem::Failed { index: 1, .. }));
        assert!(matches!(outcome.results[2], BatchItem::Scored { index: 2, .. }));
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let (service, _) = service_with(0.1, None);
        let err = service.score_batch(&[]).await.unwrap_err();
        assert!(matches!(err, ScoreError::InvalidTransaction(_)));
    }

    #[tokio::test]
    async fn test_stream_payload_failures_do_not_poison_the_loop() {
        let (service, metrics) = service_with(0.4, None);

        service.handle_stream_payload(b"not json at all").await;
        service.handle_stream_payload(br#"{"amount": "bad"}"#).await;
        service
            .handle_stream_payload(br#"{"amount": 3.0, "time": 10.0}"#)
            .await;

        let snap = metrics.snapshot();
        assert_eq!(snap.errors_total, 2);
        assert_eq!(snap.stream_messages_processed, 1);
        assert_eq!(snap.predictions_total, 1);
    }

    #[tokio::test]
    async fn test_stream_and_request_paths_share_the_cache() {
        let (service, metrics) = service_with(0.6, None);
        let payload = json!({"amount": 42.0, "time": 500.0});

        service
            .handle_stream_payload(payload.to_string().as_bytes())
            .await;

        let result = service.score_value(&payload).await.unwrap();
        assert!(result.cached);
        assert_eq!(metrics.snapshot().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_stream_worker_drains_in_flight_then_honors_shutdown() {
        let (service, metrics) = service_with(0.3, None);
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = tokio::spawn(service.clone().run_stream_worker(rx, shutdown_rx));

        tx.unbounded_send(Bytes::from(r#"{"amount": 12.0, "time": 30.0}"#))
            .unwrap();

        // The delivered message must be fully processed even while the
        // worker keeps running.
        tokio::time::timeout(Duration::from_secs(5), async {
            while metrics.snapshot().stream_messages_processed == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("message was never processed");

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker ignored shutdown")
            .unwrap();

        assert_eq!(metrics.snapshot().predictions_total, 1);
        drop(tx);
    }

    #[tokio::test]
    async fn test_stream_worker_exits_when_the_stream_closes() {
        let (service, metrics) = service_with(0.3, None);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        // Finite stream: one scorable payload, one broken, then close.
        let messages = futures::stream::iter([
            Bytes::from(r#"{"amount": 1.0, "time": 0.0}"#),
            Bytes::from_static(b"garbage"),
        ]);

        let worker = tokio::spawn(service.clone().run_stream_worker(messages, shutdown_rx));
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker did not exit on stream end")
            .unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.stream_messages_processed, 1);
        assert_eq!(snap.errors_total, 1);
    }
}

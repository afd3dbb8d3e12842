//! HTTP surface of the scoring service.

use crate::error::ScoreError;
use crate::service::{LifecycleState, ScoringService};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Build the application router.
pub fn router(service: Arc<ScoringService>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/predict/batch", post(predict_batch))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/model/info", get(model_info))
        .route("/analytics/summary", get(analytics_summary))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Maps the error taxonomy onto HTTP statuses with a structured body.
struct ApiError(ScoreError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ScoreError::InvalidTransaction(_) | ScoreError::FeatureCountMismatch { .. } => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            ScoreError::ModelUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string())
            }
            // Internal detail stays out of the response body.
            ScoreError::Inference(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal scoring error".to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ScoreError> for ApiError {
    fn from(err: ScoreError) -> Self {
        Self(err)
    }
}

async fn predict(
    State(service): State<Arc<ScoringService>>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let result = service.score_value(&payload).await?;
    Ok(Json(result).into_response())
}

async fn predict_batch(
    State(service): State<Arc<ScoringService>>,
    Json(payload): Json<Value>,
) -> Result<Response, ApiError> {
    let transactions = payload
        .get("transactions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let outcome = service.score_batch(&transactions).await?;
    Ok(Json(outcome).into_response())
}

async fn health(State(service): State<Arc<ScoringService>>) -> Response {
    let state = service.state();
    let status = if state == LifecycleState::Ready {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(json!({
        "status": status,
        "model_loaded": service.model_loaded(),
        "state": state,
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now(),
    }))
    .into_response()
}

async fn metrics(State(service): State<Arc<ScoringService>>) -> Response {
    Json(service.metrics().snapshot()).into_response()
}

async fn model_info(
    State(service): State<Arc<ScoringService>>,
) -> Result<Response, ApiError> {
    let engine = service.engine().ok_or(ScoreError::ModelUnavailable)?;

    Ok(Json(json!({
        "model_type": engine.model_kind(),
        "features_expected": engine.feature_count(),
        "feature_names": engine.feature_names(),
        "classes": ["legitimate", "fraud"],
    }))
    .into_response())
}

async fn analytics_summary(State(service): State<Arc<ScoringService>>) -> Response {
    let snap = service.metrics().snapshot();
    let cache_total = snap.cache_hits + snap.cache_misses;
    let hit_rate = if cache_total > 0 {
        snap.cache_hits as f64 / cache_total as f64 * 100.0
    } else {
        0.0
    };

    Json(json!({
        "service_stats": snap.clone(),
        "fraud_analysis": {
            "total_analyzed": snap.predictions_total,
            "fraud_detected": snap.fraud_detected_total,
            "fraud_rate_percent": snap.fraud_rate * 100.0,
            "average_response_time_ms": snap.avg_prediction_latency_ms,
        },
        "cache_performance": {
            "hits": snap.cache_hits,
            "misses": snap.cache_misses,
            "hit_rate": hit_rate,
        },
    }))
    .into_response()
}

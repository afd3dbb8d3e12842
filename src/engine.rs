//! Feature construction and the scoring engine.
//!
//! The feature vector order is a strict contract with the trained
//! artifact: `v1..v28`, raw amount, scaled amount, hour of day,
//! day index, and the scaled-amount x hour interaction term. Any
//! deviation silently produces wrong scores, so the length is checked
//! before every model call.

use crate::error::ScoreError;
use crate::models::{AmountScaler, ScoringModel};
use crate::types::transaction::PREDICTOR_COUNT;
use crate::types::{ScoreResult, Transaction};
use std::sync::Arc;

/// Number of features the model was fit against.
pub const FEATURE_COUNT: usize = PREDICTOR_COUNT + 5;

/// Builds the model input from a validated transaction.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, tx: &Transaction) -> Vec<f32>;
}

/// The production feature builder, mirroring the training pipeline's
/// serving-path preprocessing.
pub struct StandardFeatures {
    scaler: AmountScaler,
}

impl StandardFeatures {
    pub fn new(scaler: AmountScaler) -> Self {
        Self { scaler }
    }
}

impl FeatureExtractor for StandardFeatures {
    fn extract(&self, tx: &Transaction) -> Vec<f32> {
        let mut features = Vec::with_capacity(FEATURE_COUNT);

        for &v in &tx.predictors {
            features.push(v as f32);
        }

        let amount_scaled = self.scaler.transform(tx.amount);
        let hour = (tx.time / 3600.0) % 24.0;
        // Real-valued on purpose: the serving path has always used
        // fractional days, unlike the training-side truncation.
        let day = tx.time / 86400.0;

        features.push(tx.amount as f32);
        features.push(amount_scaled as f32);
        features.push(hour as f32);
        features.push(day as f32);
        features.push((amount_scaled * hour) as f32);

        features
    }
}

/// Wraps the scoring capability behind the feature-vector contract.
///
/// Holds no mutable state; a fresh vector is allocated per call, so it
/// is safe to share across request handlers and the stream worker.
pub struct ScoreEngine {
    extractor: Arc<dyn FeatureExtractor>,
    model: Arc<dyn ScoringModel>,
}

impl ScoreEngine {
    pub fn new(extractor: Arc<dyn FeatureExtractor>, model: Arc<dyn ScoringModel>) -> Self {
        Self { extractor, model }
    }

    /// Score one transaction. The feature count is validated before the
    /// model is ever invoked.
    pub fn score(&self, tx: &Transaction) -> Result<ScoreResult, ScoreError> {
        let features = self.extractor.extract(tx);
        if features.len() != FEATURE_COUNT {
            return Err(ScoreError::FeatureCountMismatch {
                expected: FEATURE_COUNT,
                actual: features.len(),
            });
        }

        let output = self.model.predict(&features)?;
        Ok(ScoreResult::fresh(output.is_fraud, output.probability))
    }

    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Feature names in contract order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (1..=PREDICTOR_COUNT).map(|i| format!("v{}", i)).collect();
        names.extend(
            ["amount", "amount_scaled", "hour", "day", "amount_hour"]
                .iter()
                .map(|s| s.to_string()),
        );
        names
    }

    pub fn model_kind(&self) -> &str {
        self.model.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scoring::ModelOutput;
    use crate::models::ThresholdModel;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn engine_with(probability: f64) -> ScoreEngine {
        ScoreEngine::new(
            Arc::new(StandardFeatures::new(AmountScaler::identity())),
            Arc::new(ThresholdModel::fixed(probability, 0.5)),
        )
    }

    #[test]
    fn test_feature_vector_layout() {
        let extractor = StandardFeatures::new(AmountScaler::identity());
        let tx = Transaction::parse(&json!({
            "amount": 1500.5, "time": 12345.0, "v1": 0.7, "v28": -1.1
        }))
        .unwrap();

        let features = extractor.extract(&tx);
        assert_eq!(features.len(), FEATURE_COUNT);
        assert_eq!(features[0], 0.7);
        assert_eq!(features[27], -1.1);
        assert_eq!(features[28], 1500.5);
        // Identity scaler: amount_scaled == amount
        assert_eq!(features[29], 1500.5);

        let hour = (12345.0f64 / 3600.0) % 24.0;
        let day = 12345.0f64 / 86400.0;
        assert!((features[30] - hour as f32).abs() < 1e-4);
        assert!((hour - 3.4291).abs() < 1e-3);
        assert!((features[31] - day as f32).abs() < 1e-5);
        assert!((day - 0.1428).abs() < 1e-3);
        assert!((features[32] - (1500.5 * hour) as f32).abs() < 1e-1);
    }

    #[test]
    fn test_day_is_not_truncated() {
        let extractor = StandardFeatures::new(AmountScaler::identity());
        let tx = Transaction::parse(&json!({"time": 129600.0})).unwrap();
        let features = extractor.extract(&tx);
        // 1.5 days, kept fractional
        assert_eq!(features[31], 1.5);
    }

    #[test]
    fn test_missing_predictors_still_score() {
        let engine = engine_with(0.3);
        let tx = Transaction::parse(&json!({"amount": 10.0, "time": 0.0})).unwrap();
        let result = engine.score(&tx).unwrap();
        assert!(!result.is_fraud);
        assert_eq!(result.probability, 0.3);
    }

    struct ShortExtractor;

    impl FeatureExtractor for ShortExtractor {
        fn extract(&self, _tx: &Transaction) -> Vec<f32> {
            vec![0.0; 30]
        }
    }

    struct TrackingModel {
        called: AtomicBool,
    }

    impl ScoringModel for TrackingModel {
        fn predict(&self, _features: &[f32]) -> Result<ModelOutput, ScoreError> {
            self.called.store(true, Ordering::SeqCst);
            Ok(ModelOutput {
                is_fraud: false,
                probability: 0.0,
            })
        }
        fn kind(&self) -> &str {
            "tracking"
        }
    }

    #[test]
    fn test_malformed_builder_never_reaches_model() {
        let model = Arc::new(TrackingModel {
            called: AtomicBool::new(false),
        });
        let engine = ScoreEngine::new(Arc::new(ShortExtractor), model.clone());
        let tx = Transaction::parse(&json!({"amount": 1.0})).unwrap();

        let err = engine.score(&tx).unwrap_err();
        assert!(matches!(
            err,
            ScoreError::FeatureCountMismatch {
                expected: 33,
                actual: 30
            }
        ));
        assert!(!model.called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_result_tier_tracks_probability() {
        let result = engine_with(0.85)
            .score(&Transaction::parse(&json!({"amount": 1.0})).unwrap())
            .unwrap();
        assert!(result.is_fraud);
        assert_eq!(result.risk_level, crate::types::RiskLevel::High);

        let result = engine_with(0.6)
            .score(&Transaction::parse(&json!({"amount": 1.0})).unwrap())
            .unwrap();
        assert_eq!(result.risk_level, crate::types::RiskLevel::Medium);
    }

    #[test]
    fn test_feature_names_match_contract_order() {
        let engine = engine_with(0.0);
        let names = engine.feature_names();
        assert_eq!(names.len(), FEATURE_COUNT);
        assert_eq!(names[0], "v1");
        assert_eq!(names[27], "v28");
        assert_eq!(names[28], "amount");
        assert_eq!(names[32], "amount_hour");
    }
}

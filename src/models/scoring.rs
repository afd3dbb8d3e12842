//! The injected scoring capability contract.

use crate::error::ScoreError;

/// Raw output of the binary classifier for one feature vector.
#[derive(Debug, Clone, Copy)]
pub struct ModelOutput {
    /// The model's own binary decision.
    pub is_fraud: bool,
    /// Calibrated probability of the fraud class, in [0, 1].
    pub probability: f64,
}

/// A loaded, opaque binary classifier.
///
/// Implementations hold no per-call mutable state visible to callers
/// and must be safe to invoke concurrently.
pub trait ScoringModel: Send + Sync {
    fn predict(&self, features: &[f32]) -> Result<ModelOutput, ScoreError>;

    /// Short identifier for the health/model-info surfaces.
    fn kind(&self) -> &str;
}

/// Deterministic scoring capability that derives its decision from a
/// probability function and a fixed decision threshold.
///
/// Stands in for the real model wherever a synthetic capability is
/// needed (tests, local development without an artifact).
pub struct ThresholdModel {
    score_fn: Box<dyn Fn(&[f32]) -> f64 + Send + Sync>,
    threshold: f64,
}

impl ThresholdModel {
    /// Model that always reports the given probability.
    pub fn fixed(probability: f64, threshold: f64) -> Self {
        Self {
            score_fn: Box::new(move |_| probability),
            threshold,
        }
    }

    /// Model with a caller-supplied probability function.
    pub fn with_fn<F>(score_fn: F, threshold: f64) -> Self
    where
        F: Fn(&[f32]) -> f64 + Send + Sync + 'static,
    {
        Self {
            score_fn: Box::new(score_fn),
            threshold,
        }
    }
}

impl ScoringModel for ThresholdModel {
    fn predict(&self, features: &[f32]) -> Result<ModelOutput, ScoreError> {
        let probability = (self.score_fn)(features).clamp(0.0, 1.0);
        Ok(ModelOutput {
            is_fraud: probability >= self.threshold,
            probability,
        })
    }

    fn kind(&self) -> &str {
        "threshold"
    }
}

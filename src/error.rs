//! Error taxonomy for the scoring path.
//!
//! Validation failures (`InvalidTransaction`, `FeatureCountMismatch`)
//! are caller errors and safe to echo back; `Inference` wraps runtime
//! detail that must stay out of client-facing responses.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoreError {
    /// The submitted payload is not a scorable transaction.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// A feature builder produced a vector of the wrong arity.
    #[error("expected {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    /// No engine is installed; the service is degraded or still loading.
    #[error("model is not loaded")]
    ModelUnavailable,

    /// The model rejected the input or the runtime failed.
    #[error("inference failed: {0}")]
    Inference(String),
}

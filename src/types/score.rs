//! Scoring result types and the risk tier contract

use serde::{Deserialize, Serialize};

/// Probability at or above which a transaction is tiered HIGH.
pub const HIGH_RISK_THRESHOLD: f64 = 0.8;
/// Probability at or above which a transaction is tiered MEDIUM.
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.5;

/// Discrete risk tier derived from the fraud probability.
///
/// The tier is a pure function of probability; it is never set
/// independently of it. These boundaries are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Classify a fraud probability into its tier.
    pub fn from_probability(probability: f64) -> Self {
        if probability >= HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else if probability >= MEDIUM_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Outcome of scoring one transaction. Serialized form is the
/// response contract of `POST /predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    /// The model's own binary decision.
    pub is_fraud: bool,
    /// Calibrated fraud probability in [0, 1].
    pub probability: f64,
    /// Probability-derived tier (0.8 / 0.5 boundaries).
    pub risk_level: RiskLevel,
    /// Whether this result was served from the cache.
    pub cached: bool,
}

impl ScoreResult {
    /// Build a fresh (uncached) result from a model decision.
    pub fn fresh(is_fraud: bool, probability: f64) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        Self {
            is_fraud,
            probability,
            risk_level: RiskLevel::from_probability(probability),
            cached: false,
        }
    }
}

/// One entry in a batch manifest: either a result or a captured error.
#[derive(Debug)]
pub enum BatchItem {
    Scored { index: usize, result: ScoreResult },
    Failed { index: usize, error: String },
}

// Serialized flat: scored entries look like a ScoreResult with an
// `index`, failed entries carry `index` and `error` only.
impl serde::Serialize for BatchItem {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        match self {
            BatchItem::Scored { index, result } => {
                let mut map = serializer.serialize_map(Some(5))?;
                map.serialize_entry("index", index)?;
                map.serialize_entry("is_fraud", &result.is_fraud)?;
                map.serialize_entry("probability", &result.probability)?;
                map.serialize_entry("risk_level", &result.risk_level)?;
                map.serialize_entry("cached", &result.cached)?;
                map.end()
            }
            BatchItem::Failed { index, error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("index", index)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

/// Manifest returned by batch scoring. The batch as a whole always
/// succeeds; per-item failures are captured inline.
#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub total: usize,
    pub processed: usize,
    pub fraud_detected: usize,
    pub fraud_rate: f64,
    pub results: Vec<BatchItem>,
}

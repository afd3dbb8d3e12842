//! Fraud alert events published to the bus

use crate::types::score::{RiskLevel, ScoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert emitted when a scored transaction is flagged as fraud.
///
/// Fire-and-forget: the service never tracks acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    /// Unique alert identifier.
    pub alert_id: String,
    /// Caller-supplied transaction identifier, when one was present.
    pub transaction_id: Option<String>,
    /// Fraud probability that triggered the alert.
    pub risk_score: f64,
    /// Probability-derived risk tier.
    pub risk_level: RiskLevel,
    /// Alert generation timestamp.
    pub detected_at: DateTime<Utc>,
}

impl FraudAlert {
    /// Build an alert from a fraud-flagged score result.
    pub fn from_result(transaction_id: Option<String>, result: &ScoreResult) -> Self {
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            transaction_id,
            risk_score: result.probability,
            risk_level: result.risk_level,
            detected_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_serialization() {
        let result = ScoreResult::fresh(true, 0.91);
        let alert = FraudAlert::from_result(Some("tx_123".into()), &result);

        let json = serde_json::to_string(&alert).unwrap();
        let deserialized: FraudAlert = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.transaction_id.as_deref(), Some("tx_123"));
        assert_eq!(deserialized.risk_score, 0.91);
        assert_eq!(deserialized.risk_level, RiskLevel::High);
    }
}

//! Transaction input type and fingerprinting

use crate::error::ScoreError;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Number of anonymized predictor fields (`v1`..`v28`).
pub const PREDICTOR_COUNT: usize = 28;

/// A validated scoring input.
///
/// Produced by [`Transaction::parse`] at the service boundary; everything
/// downstream operates on this type only. The raw field set is retained
/// (sorted by name) so logically identical payloads fingerprint to the
/// same cache key regardless of field order.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Monetary amount.
    pub amount: f64,
    /// Elapsed seconds since the dataset reference point.
    pub time: f64,
    /// Anonymized continuous predictors `v1`..`v28`, absent fields are 0.
    pub predictors: [f64; PREDICTOR_COUNT],
    /// Caller-supplied identifier, forwarded into alerts when present.
    pub external_id: Option<String>,
    /// Canonical (name-sorted) copy of every field the caller sent.
    fields: BTreeMap<String, Value>,
}

impl Transaction {
    /// Parse a transaction from an arbitrary JSON object.
    ///
    /// `amount`, `time` and `v1`..`v28` default to 0 when absent, but a
    /// present field holding a non-numeric value is rejected. Unknown
    /// fields are accepted and participate only in the fingerprint.
    pub fn parse(value: &Value) -> Result<Self, ScoreError> {
        let map = value
            .as_object()
            .ok_or_else(|| ScoreError::InvalidTransaction("expected a JSON object".into()))?;

        let amount = numeric_field(map, "amount")?.unwrap_or(0.0);
        let time = numeric_field(map, "time")?.unwrap_or(0.0);

        let mut predictors = [0.0; PREDICTOR_COUNT];
        for (i, slot) in predictors.iter_mut().enumerate() {
            let name = format!("v{}", i + 1);
            if let Some(v) = numeric_field(map, &name)? {
                *slot = v;
            }
        }

        let external_id = ["id", "transaction_id"]
            .iter()
            .find_map(|key| map.get(*key))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });

        let fields: BTreeMap<String, Value> =
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        Ok(Self {
            amount,
            time,
            predictors,
            external_id,
            fields,
        })
    }

    /// Deterministic, order-independent digest of the full field set.
    ///
    /// Used as the cache key: two payloads with the same fields and
    /// values always collide here, regardless of input ordering.
    pub fn fingerprint(&self) -> String {
        // BTreeMap serializes with keys sorted, which is the canonical form.
        let canonical = serde_json::to_string(&self.fields).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(digest)
    }
}

fn numeric_field(
    map: &serde_json::Map<String, Value>,
    name: &str,
) -> Result<Option<f64>, ScoreError> {
    match map.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| {
            ScoreError::InvalidTransaction(format!("field '{}' must be a number", name))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_defaults_missing_predictors() {
        let tx = Transaction::parse(&json!({"amount": 120.0, "time": 3600.0})).unwrap();
        assert_eq!(tx.amount, 120.0);
        assert_eq!(tx.time, 3600.0);
        assert!(tx.predictors.iter().all(|&v| v == 0.0));
        assert!(tx.external_id.is_none());
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(Transaction::parse(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_parse_rejects_non_numeric_field() {
        let err = Transaction::parse(&json!({"amount": "a lot"})).unwrap_err();
        assert!(err.to_string().contains("amount"));
    }

    #[test]
    fn test_predictor_positions() {
        let tx = Transaction::parse(&json!({"v1": 1.5, "v28": -2.5})).unwrap();
        assert_eq!(tx.predictors[0], 1.5);
        assert_eq!(tx.predictors[27], -2.5);
        assert_eq!(tx.predictors[1], 0.0);
    }

    #[test]
    fn test_external_id_from_id_or_transaction_id() {
        let tx = Transaction::parse(&json!({"id": "tx_42"})).unwrap();
        assert_eq!(tx.external_id.as_deref(), Some("tx_42"));

        let tx = Transaction::parse(&json!({"transaction_id": 7})).unwrap();
        assert_eq!(tx.external_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_fingerprint_is_order_independent() {
        let a = Transaction::parse(&json!({"amount": 10.0, "time": 5.0, "v1": 0.3})).unwrap();
        let b = Transaction::parse(&json!({"v1": 0.3, "time": 5.0, "amount": 10.0})).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_is_value_sensitive() {
        let a = Transaction::parse(&json!({"amount": 10.0})).unwrap();
        let b = Transaction::parse(&json!({"amount": 10.5})).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}

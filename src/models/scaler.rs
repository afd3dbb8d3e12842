//! Fitted amount-normalization transform.
//!
//! The scaler is fit offline by the training pipeline and persisted as
//! a small JSON artifact next to the model file. It is loaded once at
//! startup and immutable thereafter.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Standard scaler parameters for the transaction amount.
#[derive(Debug, Clone, Deserialize)]
pub struct AmountScaler {
    pub mean: f64,
    pub scale: f64,
}

impl AmountScaler {
    /// Load scaler parameters from a JSON artifact.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler artifact {}", path.display()))?;
        let scaler: AmountScaler = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse scaler artifact {}", path.display()))?;

        if !scaler.scale.is_finite() || scaler.scale <= 0.0 {
            anyhow::bail!(
                "Scaler artifact {} has non-positive scale {}",
                path.display(),
                scaler.scale
            );
        }

        info!(mean = scaler.mean, scale = scaler.scale, "Amount scaler loaded");
        Ok(scaler)
    }

    /// Standard-scale a raw amount.
    pub fn transform(&self, amount: f64) -> f64 {
        (amount - self.mean) / self.scale
    }

    /// Identity transform, used when no artifact is configured in tests.
    pub fn identity() -> Self {
        Self {
            mean: 0.0,
            scale: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_transform() {
        let scaler = AmountScaler {
            mean: 100.0,
            scale: 50.0,
        };
        assert_eq!(scaler.transform(200.0), 2.0);
        assert_eq!(scaler.transform(100.0), 0.0);
    }

    #[test]
    fn test_load_from_artifact() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mean": 88.35, "scale": 250.12}}"#).unwrap();

        let scaler = AmountScaler::load(file.path()).unwrap();
        assert_eq!(scaler.mean, 88.35);
        assert_eq!(scaler.scale, 250.12);
    }

    #[test]
    fn test_load_rejects_non_positive_scale() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mean": 0.0, "scale": 0.0}}"#).unwrap();

        assert!(AmountScaler::load(file.path()).is_err());
    }
}

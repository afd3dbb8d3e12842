//! ONNX-backed scoring model.
//!
//! Loads a persisted classifier artifact and serves single-row
//! predictions. Handles both output layouts produced by common
//! exporters: plain probability tensors and the `seq(map(int64,
//! float))` form sklearn's ZipMap emits.

use crate::error::ScoreError;
use crate::models::scoring::{ModelOutput, ScoringModel};
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// A loaded ONNX classifier session with resolved I/O names.
pub struct OnnxModel {
    // ort sessions need exclusive access to run; the lock scope is one inference call.
    session: RwLock<Session>,
    input_name: String,
    label_output: Option<String>,
    prob_output: Option<String>,
    /// Decision cut used only when the artifact exports no label output.
    fallback_threshold: f64,
}

impl OnnxModel {
    /// Load a classifier from an ONNX artifact.
    pub fn load<P: AsRef<Path>>(
        path: P,
        intra_threads: usize,
        fallback_threshold: f64,
    ) -> Result<Self> {
        let path = path.as_ref();
        ort::init().commit()?;

        info!(path = %path.display(), threads = intra_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        let prob_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob") || o.name.contains("output"))
            .map(|o| o.name.clone())
            .or_else(|| session.outputs.last().map(|o| o.name.clone()));

        info!(
            input = %input_name,
            label = ?label_output,
            probabilities = ?prob_output,
            "ONNX model loaded"
        );

        Ok(Self {
            session: RwLock::new(session),
            input_name,
            label_output,
            prob_output,
            fallback_threshold,
        })
    }

    fn extract_probability(&self, outputs: &SessionOutputs) -> Result<f64> {
        if let Some(name) = &self.prob_output {
            if let Some(output) = outputs.get(name.as_str()) {
                if let Some(prob) = probability_from_value(output)? {
                    return Ok(prob);
                }
            }
        }

        // Fallback: scan every non-label output.
        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(prob) = probability_from_value(&output)? {
                debug!(output = %name, prob, "Extracted probability from fallback output");
                return Ok(prob);
            }
        }

        anyhow::bail!("no probability output found")
    }

    fn extract_label(&self, outputs: &SessionOutputs) -> Option<bool> {
        let name = self.label_output.as_deref()?;
        let output = outputs.get(name)?;
        let (_, data) = output.try_extract_tensor::<i64>().ok()?;
        data.first().map(|&label| label != 0)
    }
}

impl ScoringModel for OnnxModel {
    fn predict(&self, features: &[f32]) -> Result<ModelOutput, ScoreError> {
        let shape = vec![1_i64, features.len() as i64];
        let input = Tensor::from_array((shape, features.to_vec()))
            .map_err(|e| ScoreError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .write()
            .map_err(|e| ScoreError::Inference(format!("session lock poisoned: {}", e)))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input])
            .map_err(|e| ScoreError::Inference(e.to_string()))?;

        let probability = self
            .extract_probability(&outputs)
            .map_err(|e| ScoreError::Inference(e.to_string()))?
            .clamp(0.0, 1.0);

        // The exported label output is the model's own decision; derive it
        // from the probability only when the artifact lacks one.
        let is_fraud = self.extract_label(&outputs).unwrap_or_else(|| {
            warn!("Model artifact has no label output, deriving decision from probability");
            probability >= self.fallback_threshold
        });

        Ok(ModelOutput {
            is_fraud,
            probability,
        })
    }

    fn kind(&self) -> &str {
        "onnx"
    }
}

/// Pull the fraud-class probability out of one model output, trying the
/// tensor layout first and the sequence-of-maps layout second.
fn probability_from_value(output: &ort::value::DynValue) -> Result<Option<f64>> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        return Ok(Some(fraud_class_probability(
            &shape.iter().copied().collect::<Vec<i64>>(),
            data,
        )));
    }

    if DynSequenceValueType::can_downcast(&output.dtype()) {
        let allocator = Allocator::default();
        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow::anyhow!("failed to downcast sequence output: {}", e))?;
        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

        let Some(map_value) = maps.first() else {
            anyhow::bail!("empty sequence output");
        };

        let pairs = map_value.try_extract_key_values::<i64, f32>()?;
        for (class_id, prob) in &pairs {
            if *class_id == 1 {
                return Ok(Some(*prob as f64));
            }
        }
        // Two-class map without an explicit class 1: invert class 0.
        for (class_id, prob) in &pairs {
            if *class_id == 0 {
                return Ok(Some(1.0 - *prob as f64));
            }
        }
        anyhow::bail!("probability map holds no recognizable class");
    }

    Ok(None)
}

/// Read the class-1 probability from a tensor of shape
/// `[batch, classes]`, `[classes]` or `[batch, 1]`.
fn fraud_class_probability(dims: &[i64], data: &[f32]) -> f64 {
    let classes = match dims {
        [_, n] => *n as usize,
        [n] => *n as usize,
        _ => 0,
    };

    let prob = match classes {
        0 => data.last().copied(),
        1 => data.first().copied(),
        _ => data.get(1).copied(),
    };

    prob.map(|p| p as f64).unwrap_or(0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraud_class_probability_layouts() {
        // [batch, classes]
        assert_eq!(fraud_class_probability(&[1, 2], &[0.3, 0.7]), 0.7f32 as f64);
        // [batch, 1]
        assert_eq!(fraud_class_probability(&[1, 1], &[0.9]), 0.9f32 as f64);
        // [classes]
        assert_eq!(fraud_class_probability(&[2], &[0.6, 0.4]), 0.4f32 as f64);
        // Unexpected rank falls back to the last value
        assert_eq!(
            fraud_class_probability(&[1, 1, 2], &[0.1, 0.8]),
            0.8f32 as f64
        );
    }
}

//! Scoring capability: contract, ONNX implementation, amount scaler

pub mod onnx;
pub mod scaler;
pub mod scoring;

pub use onnx::OnnxModel;
pub use scaler::AmountScaler;
pub use scoring::{ModelOutput, ScoringModel, ThresholdModel};

//! Type definitions for the scoring service

pub mod alert;
pub mod score;
pub mod transaction;

pub use alert::FraudAlert;
pub use score::{BatchItem, BatchOutcome, RiskLevel, ScoreResult};
pub use transaction::Transaction;

//! FraudGuard Scoring Service Library
//!
//! Real-time fraud scoring: an HTTP request path and a NATS stream
//! worker share one scoring pipeline with result caching, live metrics
//! and best-effort alert publishing.

pub mod api;
pub mod cache;
pub mod config;
pub mod consumer;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod service;
pub mod types;

pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use engine::ScoreEngine;
pub use error::ScoreError;
pub use metrics::MetricsAggregator;
pub use producer::AlertProducer;
pub use service::ScoringService;
pub use types::{FraudAlert, ScoreResult, Transaction};

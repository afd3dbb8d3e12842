//! Outbound alert publishing over NATS.

use crate::types::FraudAlert;
use anyhow::{Context, Result};
use async_nats::Client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Outbound alert destination.
///
/// The service treats every sink as best-effort: publish failures are
/// logged and counted at the single call site and never reach the
/// scoring caller.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn publish(&self, alert: &FraudAlert) -> Result<()>;
}

/// NATS-backed alert publisher with a bounded publish timeout.
#[derive(Clone)]
pub struct AlertProducer {
    client: Client,
    subject: String,
    timeout: Duration,
}

impl AlertProducer {
    pub fn new(client: Client, subject: &str, timeout: Duration) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            timeout,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[async_trait]
impl AlertSink for AlertProducer {
    async fn publish(&self, alert: &FraudAlert) -> Result<()> {
        let payload = serde_json::to_vec(alert)?;

        tokio::time::timeout(
            self.timeout,
            self.client.publish(self.subject.clone(), payload.into()),
        )
        .await
        .context("alert publish timed out")??;

        debug!(
            alert_id = %alert.alert_id,
            risk_score = alert.risk_score,
            "Published fraud alert"
        );

        Ok(())
    }
}

//! Test Transaction Producer
//!
//! Generates synthetic transactions in the scoring service's wire
//! format and publishes them to NATS for end-to-end pipeline testing.

use rand::Rng;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

/// Synthetic transaction generator.
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    counter: u64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            counter: 0,
        }
    }

    /// Typical low-risk transaction: small amount, predictors near zero.
    fn generate_legitimate(&mut self) -> Value {
        self.counter += 1;
        let mut tx = json!({
            "id": format!("tx_{:012}", self.counter),
            "amount": self.rng.gen_range(5.0..300.0),
            "time": self.rng.gen_range(0.0..172800.0),
        });
        for i in 1..=28 {
            tx[format!("v{}", i)] = json!(self.rng.gen_range(-1.0..1.0));
        }
        tx
    }

    /// Anomalous transaction: large amount, predictors pushed far out
    /// into the tails the model flags.
    fn generate_suspicious(&mut self) -> Value {
        self.counter += 1;
        let mut tx = json!({
            "id": format!("tx_{:012}", self.counter),
            "amount": self.rng.gen_range(2000.0..10000.0),
            "time": self.rng.gen_range(0.0..21600.0),
        });
        for i in 1..=28 {
            tx[format!("v{}", i)] = json!(self.rng.gen_range(-8.0..8.0));
        }
        tx
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    info!("Starting test transaction producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS, running in dry-run mode");
            return run_dry_mode(count, fraud_rate, delay_ms).await;
        }
    };

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();
    let mut legitimate_count = 0;
    let mut suspicious_count = 0;

    for i in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            legitimate_count += 1;
            generator.generate_legitimate()
        };

        let payload = serde_json::to_vec(&transaction)?;
        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} transactions ({} legitimate, {} suspicious)",
                i + 1,
                count,
                legitimate_count,
                suspicious_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed: published {} transactions ({} legitimate, {} suspicious)",
        count, legitimate_count, suspicious_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, fraud_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        if (i + 1) % 10 == 0 || i == 0 {
            info!(
                "Sample transaction {}:\n{}",
                i + 1,
                serde_json::to_string_pretty(&transaction)?
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
